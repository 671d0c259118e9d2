//! Core types for the Bikeshare Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: canonical trips, aggregate results, and the summary report envelope.

use crate::error::TripError;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical user-type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    /// Long-term members (annual, monthly and similar passes)
    Subscriber,
    /// Short-term users (24-hour, 3-day and similar passes)
    Customer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Subscriber => "Subscriber",
            UserType::Customer => "Customer",
        }
    }

    /// Parse an exact canonical label, ignoring surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Subscriber" => Some(UserType::Subscriber),
            "Customer" => Some(UserType::Customer),
            _ => None,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day of the week a trip started on, serialized with its full English name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// All days, Monday first
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }

    /// Zero-based position, Monday = 0
    pub fn index(&self) -> usize {
        match self {
            DayOfWeek::Monday => 0,
            DayOfWeek::Tuesday => 1,
            DayOfWeek::Wednesday => 2,
            DayOfWeek::Thursday => 3,
            DayOfWeek::Friday => 4,
            DayOfWeek::Saturday => 5,
            DayOfWeek::Sunday => 6,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical trip record - source-independent representation of one trip.
///
/// Field names in the serialized form match the canonical interchange header
/// `duration, month, hour, day_of_week, user_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTrip {
    /// Trip duration (minutes, always > 0)
    #[serde(rename = "duration")]
    pub duration_minutes: f64,
    /// Start month (1-12)
    #[serde(rename = "month")]
    pub start_month: u32,
    /// Start hour of day (0-23)
    #[serde(rename = "hour")]
    pub start_hour: u32,
    /// Start day of week
    #[serde(rename = "day_of_week")]
    pub start_weekday: DayOfWeek,
    /// User category
    pub user_type: UserType,
}

impl CanonicalTrip {
    /// Build a canonical trip, rejecting values outside the canonical ranges.
    pub fn new(
        duration_minutes: f64,
        start_month: u32,
        start_hour: u32,
        start_weekday: DayOfWeek,
        user_type: UserType,
    ) -> Result<Self, TripError> {
        let trip = Self {
            duration_minutes,
            start_month,
            start_hour,
            start_weekday,
            user_type,
        };
        trip.validate()?;
        Ok(trip)
    }

    /// Check every field against its canonical range
    pub fn validate(&self) -> Result<(), TripError> {
        if !self.duration_minutes.is_finite() || self.duration_minutes <= 0.0 {
            return Err(TripError::malformed(
                "duration",
                &self.duration_minutes.to_string(),
                "duration must be a positive finite number of minutes",
            ));
        }
        if !(1..=12).contains(&self.start_month) {
            return Err(TripError::malformed(
                "month",
                &self.start_month.to_string(),
                "month must be within 1-12",
            ));
        }
        if self.start_hour > 23 {
            return Err(TripError::malformed(
                "hour",
                &self.start_hour.to_string(),
                "hour must be within 0-23",
            ));
        }
        Ok(())
    }
}

/// Subscriber/Customer tally. `total` always equals `subscribers + customers`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTypeCounts {
    pub subscribers: u64,
    pub customers: u64,
    pub total: u64,
}

impl UserTypeCounts {
    /// Count one trip of the given user type
    pub fn record(&mut self, user_type: UserType) {
        match user_type {
            UserType::Subscriber => self.subscribers += 1,
            UserType::Customer => self.customers += 1,
        }
        self.total += 1;
    }

    /// Share of trips made by subscribers (0-1), `None` when there are no trips
    pub fn subscriber_share(&self) -> Option<f64> {
        share(self.subscribers, self.total)
    }

    /// Share of trips made by customers (0-1), `None` when there are no trips
    pub fn customer_share(&self) -> Option<f64> {
        share(self.customers, self.total)
    }
}

fn share(part: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(part as f64 / total as f64)
    }
}

/// Mean duration and long-trip proportion over a set of trips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationSummary {
    /// Mean duration (minutes), `None` for an empty input
    pub mean_minutes: Option<f64>,
    /// Share of trips strictly longer than the threshold (0-1), `None` for an empty input
    pub proportion_over_threshold: Option<f64>,
    pub threshold_minutes: f64,
    pub over_threshold: u64,
    pub total: u64,
}

/// Mean duration per user type; `None` for an empty subpopulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationByUserType {
    pub subscriber_mean_minutes: Option<f64>,
    pub customer_mean_minutes: Option<f64>,
}

/// Trip counts for one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCounts {
    pub month: u32,
    #[serde(flatten)]
    pub counts: UserTypeCounts,
}

/// Per-month counts; always exactly 12 entries, January first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBreakdown {
    pub months: Vec<MonthCounts>,
}

impl MonthlyBreakdown {
    /// Month with the most trips. Earlier months win ties; `None` when no trips were counted.
    pub fn peak_month(&self) -> Option<u32> {
        let mut peak: Option<&MonthCounts> = None;
        for entry in &self.months {
            if entry.counts.total == 0 {
                continue;
            }
            match peak {
                Some(best) if best.counts.total >= entry.counts.total => {}
                _ => peak = Some(entry),
            }
        }
        peak.map(|entry| entry.month)
    }

    pub fn total(&self) -> u64 {
        self.months.iter().map(|m| m.counts.total).sum()
    }
}

/// Trip counts for one hour of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCounts {
    pub hour: u32,
    #[serde(flatten)]
    pub counts: UserTypeCounts,
}

/// Per-hour counts; always exactly 24 entries, midnight first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyBreakdown {
    pub hours: Vec<HourCounts>,
}

/// Trip counts for one day of the week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayCounts {
    pub day: DayOfWeek,
    #[serde(flatten)]
    pub counts: UserTypeCounts,
}

/// Per-weekday counts; always exactly 7 entries, Monday first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayBreakdown {
    pub days: Vec<WeekdayCounts>,
}

/// One histogram bucket covering `[lower_minutes, upper_minutes)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower_minutes: f64,
    pub upper_minutes: f64,
    pub count: u64,
}

/// Duration distribution for trips shorter than a limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationHistogram {
    /// Restricts the histogram to one user type; `None` covers all trips
    pub user_type: Option<UserType>,
    pub bin_width_minutes: f64,
    pub limit_minutes: f64,
    pub bins: Vec<HistogramBin>,
    /// Trips at or above the limit
    pub excluded: u64,
}

/// Every statistic computed by one aggregation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub counts: UserTypeCounts,
    pub duration: DurationSummary,
    pub duration_by_user_type: DurationByUserType,
    pub monthly: MonthlyBreakdown,
    pub peak_month: Option<u32>,
    pub hourly: HourlyBreakdown,
    pub weekday: WeekdayBreakdown,
    pub histograms: Vec<DurationHistogram>,
}

/// A raw record that could not be normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// 1-based data row number (the header is not counted)
    pub row: u64,
    pub reason: String,
}

/// Outcome of normalizing a raw stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub processed: u64,
    pub normalized: u64,
    pub skipped: u64,
    /// First few skip reasons, for diagnostics
    pub sample_errors: Vec<SkippedRecord>,
}

impl NormalizationStats {
    /// Share of processed rows that were skipped (0-1), `None` when nothing was processed
    pub fn skip_ratio(&self) -> Option<f64> {
        share(self.skipped, self.processed)
    }
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Report provenance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProvenance {
    /// Source system name, or "canonical" for pre-normalized input
    pub source: String,
    pub input: String,
    pub computed_at_utc: String,
}

/// Report data quality metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportQuality {
    pub processed: u64,
    pub normalized: u64,
    pub skipped: u64,
    pub skip_ratio: Option<f64>,
    pub sample_errors: Vec<SkippedRecord>,
}

/// Complete summary report handed to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub quality: ReportQuality,
    pub aggregates: AggregateResult,
}
