//! Trip aggregation
//!
//! Single-pass reductions over canonical trips:
//! - User-type counts and shares
//! - Mean duration and long-trip proportion
//! - Mean duration per user type
//! - Month, hour and weekday breakdowns
//! - Duration histograms
//!
//! Every function owns its accumulators, so repeated calls over the same input
//! give the same result. [`TripAggregator`] computes all statistics together
//! when the input should only be scanned once.

use crate::error::TripError;
use crate::types::{
    AggregateResult, CanonicalTrip, DayOfWeek, DurationByUserType, DurationHistogram,
    DurationSummary, HistogramBin, HourCounts, HourlyBreakdown, MonthCounts, MonthlyBreakdown,
    UserType, UserTypeCounts, WeekdayBreakdown, WeekdayCounts,
};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tracing::warn;

/// Default long-trip threshold (minutes); trips above it incur overage charges
pub const DEFAULT_THRESHOLD_MINUTES: f64 = 30.0;

/// Default histogram bucket width (minutes)
pub const DEFAULT_BIN_MINUTES: f64 = 5.0;

/// Default histogram upper limit (minutes)
pub const DEFAULT_LIMIT_MINUTES: f64 = 75.0;

/// Tunable parameters for a summary run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryOptions {
    pub threshold_minutes: f64,
    pub histogram_bin_minutes: f64,
    pub histogram_limit_minutes: f64,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            threshold_minutes: DEFAULT_THRESHOLD_MINUTES,
            histogram_bin_minutes: DEFAULT_BIN_MINUTES,
            histogram_limit_minutes: DEFAULT_LIMIT_MINUTES,
        }
    }
}

impl SummaryOptions {
    pub fn validate(&self) -> Result<(), TripError> {
        if !self.threshold_minutes.is_finite() || self.threshold_minutes < 0.0 {
            return Err(TripError::InvalidOptions(format!(
                "threshold must be a non-negative number of minutes, got {}",
                self.threshold_minutes
            )));
        }
        validate_histogram(self.histogram_bin_minutes, self.histogram_limit_minutes)
    }
}

fn validate_histogram(bin_width: f64, limit: f64) -> Result<(), TripError> {
    if !bin_width.is_finite() || bin_width <= 0.0 {
        return Err(TripError::InvalidOptions(format!(
            "histogram bin width must be positive, got {bin_width}"
        )));
    }
    if !limit.is_finite() || limit <= 0.0 {
        return Err(TripError::InvalidOptions(format!(
            "histogram limit must be positive, got {limit}"
        )));
    }
    Ok(())
}

/// Count trips per user type
pub fn count_by_user_type<I>(trips: I) -> UserTypeCounts
where
    I: IntoIterator,
    I::Item: Borrow<CanonicalTrip>,
{
    let mut counts = UserTypeCounts::default();
    for trip in trips {
        counts.record(trip.borrow().user_type);
    }
    counts
}

/// Mean duration and share of trips strictly longer than `threshold_minutes`
pub fn duration_summary<I>(trips: I, threshold_minutes: f64) -> DurationSummary
where
    I: IntoIterator,
    I::Item: Borrow<CanonicalTrip>,
{
    let mut acc = DurationAccumulator::new(threshold_minutes);
    for trip in trips {
        acc.push(trip.borrow().duration_minutes);
    }
    acc.finish()
}

/// Mean duration for subscribers and customers separately
pub fn duration_by_user_type<I>(trips: I) -> DurationByUserType
where
    I: IntoIterator,
    I::Item: Borrow<CanonicalTrip>,
{
    let mut acc = UserTypeMeans::default();
    for trip in trips {
        acc.push(trip.borrow());
    }
    acc.finish()
}

/// Subscriber/Customer counts for each of the 12 months
pub fn monthly_breakdown<I>(trips: I) -> MonthlyBreakdown
where
    I: IntoIterator,
    I::Item: Borrow<CanonicalTrip>,
{
    let mut acc = PeriodCounts::<12>::default();
    for trip in trips {
        let trip = trip.borrow();
        acc.push(month_slot(trip), trip.user_type);
    }
    acc.into_monthly()
}

/// Subscriber/Customer counts for each of the 24 hours of the day
pub fn hourly_breakdown<I>(trips: I) -> HourlyBreakdown
where
    I: IntoIterator,
    I::Item: Borrow<CanonicalTrip>,
{
    let mut acc = PeriodCounts::<24>::default();
    for trip in trips {
        let trip = trip.borrow();
        acc.push(Some(trip.start_hour as usize), trip.user_type);
    }
    acc.into_hourly()
}

/// Subscriber/Customer counts for each day of the week
pub fn weekday_breakdown<I>(trips: I) -> WeekdayBreakdown
where
    I: IntoIterator,
    I::Item: Borrow<CanonicalTrip>,
{
    let mut acc = PeriodCounts::<7>::default();
    for trip in trips {
        let trip = trip.borrow();
        acc.push(Some(trip.start_weekday.index()), trip.user_type);
    }
    acc.into_weekday()
}

/// Bucket durations shorter than `limit_minutes` into `bin_width_minutes` wide bins,
/// optionally restricted to one user type
pub fn duration_histogram<I>(
    trips: I,
    user_type: Option<UserType>,
    bin_width_minutes: f64,
    limit_minutes: f64,
) -> Result<DurationHistogram, TripError>
where
    I: IntoIterator,
    I::Item: Borrow<CanonicalTrip>,
{
    let mut acc = HistogramAccumulator::new(user_type, bin_width_minutes, limit_minutes)?;
    for trip in trips {
        acc.push(trip.borrow());
    }
    Ok(acc.finish())
}

/// Combined single-pass aggregator producing an [`AggregateResult`]
#[derive(Debug, Clone)]
pub struct TripAggregator {
    counts: UserTypeCounts,
    duration: DurationAccumulator,
    means: UserTypeMeans,
    monthly: PeriodCounts<12>,
    hourly: PeriodCounts<24>,
    weekday: PeriodCounts<7>,
    histograms: Vec<HistogramAccumulator>,
}

impl TripAggregator {
    pub fn new(options: SummaryOptions) -> Result<Self, TripError> {
        options.validate()?;

        let histograms = [None, Some(UserType::Subscriber), Some(UserType::Customer)]
            .into_iter()
            .map(|user_type| {
                HistogramAccumulator::new(
                    user_type,
                    options.histogram_bin_minutes,
                    options.histogram_limit_minutes,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            counts: UserTypeCounts::default(),
            duration: DurationAccumulator::new(options.threshold_minutes),
            means: UserTypeMeans::default(),
            monthly: PeriodCounts::default(),
            hourly: PeriodCounts::default(),
            weekday: PeriodCounts::default(),
            histograms,
        })
    }

    pub fn push(&mut self, trip: &CanonicalTrip) {
        self.counts.record(trip.user_type);
        self.duration.push(trip.duration_minutes);
        self.means.push(trip);
        self.monthly.push(month_slot(trip), trip.user_type);
        self.hourly.push(Some(trip.start_hour as usize), trip.user_type);
        self.weekday.push(Some(trip.start_weekday.index()), trip.user_type);
        for histogram in &mut self.histograms {
            histogram.push(trip);
        }
    }

    /// Number of trips seen so far
    pub fn len(&self) -> u64 {
        self.counts.total
    }

    pub fn is_empty(&self) -> bool {
        self.counts.total == 0
    }

    pub fn finish(self) -> AggregateResult {
        let monthly = self.monthly.into_monthly();
        let peak_month = monthly.peak_month();

        AggregateResult {
            counts: self.counts,
            duration: self.duration.finish(),
            duration_by_user_type: self.means.finish(),
            monthly,
            peak_month,
            hourly: self.hourly.into_hourly(),
            weekday: self.weekday.into_weekday(),
            histograms: self
                .histograms
                .into_iter()
                .map(HistogramAccumulator::finish)
                .collect(),
        }
    }
}

impl<'a> Extend<&'a CanonicalTrip> for TripAggregator {
    fn extend<I: IntoIterator<Item = &'a CanonicalTrip>>(&mut self, trips: I) {
        for trip in trips {
            self.push(trip);
        }
    }
}

fn month_slot(trip: &CanonicalTrip) -> Option<usize> {
    (trip.start_month as usize).checked_sub(1)
}

fn mean(sum: f64, count: u64) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[derive(Debug, Clone)]
struct DurationAccumulator {
    threshold_minutes: f64,
    total: u64,
    sum: f64,
    over: u64,
}

impl DurationAccumulator {
    fn new(threshold_minutes: f64) -> Self {
        Self {
            threshold_minutes,
            total: 0,
            sum: 0.0,
            over: 0,
        }
    }

    fn push(&mut self, duration_minutes: f64) {
        self.total += 1;
        self.sum += duration_minutes;
        if duration_minutes > self.threshold_minutes {
            self.over += 1;
        }
    }

    fn finish(self) -> DurationSummary {
        // Both statistics divide by the full trip count
        DurationSummary {
            mean_minutes: mean(self.sum, self.total),
            proportion_over_threshold: mean(self.over as f64, self.total),
            threshold_minutes: self.threshold_minutes,
            over_threshold: self.over,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct UserTypeMeans {
    subscriber_sum: f64,
    subscriber_count: u64,
    customer_sum: f64,
    customer_count: u64,
}

impl UserTypeMeans {
    fn push(&mut self, trip: &CanonicalTrip) {
        match trip.user_type {
            UserType::Subscriber => {
                self.subscriber_sum += trip.duration_minutes;
                self.subscriber_count += 1;
            }
            UserType::Customer => {
                self.customer_sum += trip.duration_minutes;
                self.customer_count += 1;
            }
        }
    }

    fn finish(self) -> DurationByUserType {
        DurationByUserType {
            subscriber_mean_minutes: mean(self.subscriber_sum, self.subscriber_count),
            customer_mean_minutes: mean(self.customer_sum, self.customer_count),
        }
    }
}

/// Fixed set of `N` zero-initialised buckets
#[derive(Debug, Clone)]
struct PeriodCounts<const N: usize> {
    slots: [UserTypeCounts; N],
}

impl<const N: usize> Default for PeriodCounts<N> {
    fn default() -> Self {
        Self {
            slots: [UserTypeCounts::default(); N],
        }
    }
}

impl<const N: usize> PeriodCounts<N> {
    fn push(&mut self, slot: Option<usize>, user_type: UserType) {
        match slot.and_then(|i| self.slots.get_mut(i)) {
            Some(counts) => counts.record(user_type),
            None => warn!(slot = ?slot, buckets = N, "trip outside breakdown range ignored"),
        }
    }

    fn into_monthly(self) -> MonthlyBreakdown {
        MonthlyBreakdown {
            months: self
                .slots
                .into_iter()
                .zip(1u32..)
                .map(|(counts, month)| MonthCounts { month, counts })
                .collect(),
        }
    }

    fn into_hourly(self) -> HourlyBreakdown {
        HourlyBreakdown {
            hours: self
                .slots
                .into_iter()
                .zip(0u32..)
                .map(|(counts, hour)| HourCounts { hour, counts })
                .collect(),
        }
    }

    fn into_weekday(self) -> WeekdayBreakdown {
        WeekdayBreakdown {
            days: self
                .slots
                .into_iter()
                .zip(DayOfWeek::ALL)
                .map(|(counts, day)| WeekdayCounts { day, counts })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct HistogramAccumulator {
    user_type: Option<UserType>,
    bin_width: f64,
    limit: f64,
    counts: Vec<u64>,
    excluded: u64,
}

impl HistogramAccumulator {
    fn new(user_type: Option<UserType>, bin_width: f64, limit: f64) -> Result<Self, TripError> {
        validate_histogram(bin_width, limit)?;
        let bins = (limit / bin_width).ceil() as usize;

        Ok(Self {
            user_type,
            bin_width,
            limit,
            counts: vec![0; bins.max(1)],
            excluded: 0,
        })
    }

    fn push(&mut self, trip: &CanonicalTrip) {
        if let Some(wanted) = self.user_type {
            if trip.user_type != wanted {
                return;
            }
        }

        let duration = trip.duration_minutes;
        if duration >= self.limit || duration < 0.0 {
            self.excluded += 1;
            return;
        }

        let last = self.counts.len() - 1;
        let index = ((duration / self.bin_width).floor() as usize).min(last);
        self.counts[index] += 1;
    }

    fn finish(self) -> DurationHistogram {
        let bin_width = self.bin_width;
        let limit = self.limit;

        let bins = self
            .counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower_minutes: i as f64 * bin_width,
                upper_minutes: ((i + 1) as f64 * bin_width).min(limit),
                count,
            })
            .collect();

        DurationHistogram {
            user_type: self.user_type,
            bin_width_minutes: bin_width,
            limit_minutes: limit,
            bins,
            excluded: self.excluded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn trip(duration: f64, month: u32, hour: u32, user_type: UserType) -> CanonicalTrip {
        CanonicalTrip::new(duration, month, hour, DayOfWeek::Wednesday, user_type).unwrap()
    }

    fn sample_trips() -> Vec<CanonicalTrip> {
        vec![
            trip(10.0, 1, 8, UserType::Subscriber),
            trip(20.0, 1, 17, UserType::Subscriber),
            trip(45.0, 7, 14, UserType::Customer),
            trip(5.0, 7, 8, UserType::Subscriber),
            trip(80.0, 12, 23, UserType::Customer),
        ]
    }

    #[test]
    fn test_count_by_user_type() {
        let counts = count_by_user_type(&sample_trips());
        assert_eq!(
            counts,
            UserTypeCounts {
                subscribers: 3,
                customers: 2,
                total: 5,
            }
        );

        let empty = count_by_user_type(Vec::<CanonicalTrip>::new());
        assert_eq!(empty, UserTypeCounts::default());
    }

    #[test]
    fn test_duration_summary() {
        let summary = duration_summary(&sample_trips(), 30.0);

        // (10 + 20 + 45 + 5 + 80) / 5 = 32
        assert!((summary.mean_minutes.unwrap() - 32.0).abs() < 1e-9);
        assert!((summary.proportion_over_threshold.unwrap() - 0.4).abs() < 1e-9);
        assert_eq!(summary.over_threshold, 2);
        assert_eq!(summary.total, 5);
    }

    #[test]
    fn test_duration_summary_all_under_threshold() {
        let trips = vec![
            trip(3.0, 2, 9, UserType::Subscriber),
            trip(9.0, 2, 10, UserType::Customer),
        ];
        let summary = duration_summary(&trips, 30.0);

        assert!((summary.mean_minutes.unwrap() - 6.0).abs() < 1e-9);
        assert_eq!(summary.proportion_over_threshold, Some(0.0));
    }

    #[test]
    fn test_duration_summary_threshold_is_exclusive() {
        let trips = vec![trip(30.0, 2, 9, UserType::Subscriber)];
        let summary = duration_summary(&trips, 30.0);
        assert_eq!(summary.over_threshold, 0);
    }

    #[test]
    fn test_duration_summary_empty() {
        let summary = duration_summary(Vec::<CanonicalTrip>::new(), 30.0);

        assert_eq!(summary.mean_minutes, None);
        assert_eq!(summary.proportion_over_threshold, None);
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn test_duration_by_user_type() {
        let means = duration_by_user_type(&sample_trips());

        assert!((means.subscriber_mean_minutes.unwrap() - 35.0 / 3.0).abs() < 1e-9);
        assert!((means.customer_mean_minutes.unwrap() - 62.5).abs() < 1e-9);

        let only_subscribers = vec![trip(12.0, 4, 7, UserType::Subscriber)];
        let means = duration_by_user_type(&only_subscribers);
        assert_eq!(means.subscriber_mean_minutes, Some(12.0));
        assert_eq!(means.customer_mean_minutes, None);
    }

    #[test]
    fn test_monthly_breakdown_keeps_empty_months() {
        let trips = sample_trips();
        let monthly = monthly_breakdown(&trips);

        assert_eq!(monthly.months.len(), 12);
        assert_eq!(monthly.total(), trips.len() as u64);

        let january = monthly.months[0];
        assert_eq!(january.month, 1);
        assert_eq!(january.counts.subscribers, 2);
        assert_eq!(january.counts.customers, 0);

        let july = monthly.months[6];
        assert_eq!((july.counts.subscribers, july.counts.customers), (1, 1));

        let march = monthly.months[2];
        assert_eq!(march.month, 3);
        assert_eq!(march.counts.total, 0);

        let empty = monthly_breakdown(Vec::<CanonicalTrip>::new());
        assert_eq!(empty.months.len(), 12);
        assert_eq!(empty.total(), 0);
    }

    #[test]
    fn test_hourly_and_weekday_breakdowns() {
        let trips = sample_trips();

        let hourly = hourly_breakdown(&trips);
        assert_eq!(hourly.hours.len(), 24);
        assert_eq!(hourly.hours[8].counts.subscribers, 2);
        assert_eq!(hourly.hours[23].counts.customers, 1);

        let weekday = weekday_breakdown(&trips);
        assert_eq!(weekday.days.len(), 7);
        assert_eq!(weekday.days[2].day, DayOfWeek::Wednesday);
        assert_eq!(weekday.days[2].counts.total, 5);
        assert_eq!(weekday.days[0].counts.total, 0);
    }

    #[test]
    fn test_duration_histogram() {
        let trips = sample_trips();

        let all = duration_histogram(&trips, None, 5.0, 75.0).unwrap();
        assert_eq!(all.bins.len(), 15);
        assert_eq!(all.bins[1].count, 1); // 5.0
        assert_eq!(all.bins[2].count, 1); // 10.0
        assert_eq!(all.bins[4].count, 1); // 20.0
        assert_eq!(all.bins[9].count, 1); // 45.0
        assert_eq!(all.excluded, 1); // 80.0
        assert_eq!(all.bins[14].upper_minutes, 75.0);

        let customers = duration_histogram(&trips, Some(UserType::Customer), 5.0, 75.0).unwrap();
        let counted: u64 = customers.bins.iter().map(|b| b.count).sum();
        assert_eq!(counted, 1);
        assert_eq!(customers.excluded, 1);
    }

    #[test]
    fn test_histogram_partial_last_bin() {
        let trips = vec![trip(11.5, 1, 1, UserType::Customer)];
        let histogram = duration_histogram(&trips, None, 5.0, 12.0).unwrap();

        assert_eq!(histogram.bins.len(), 3);
        assert_eq!(histogram.bins[2].lower_minutes, 10.0);
        assert_eq!(histogram.bins[2].upper_minutes, 12.0);
        assert_eq!(histogram.bins[2].count, 1);
    }

    #[test]
    fn test_histogram_rejects_bad_bins() {
        assert!(duration_histogram(Vec::<CanonicalTrip>::new(), None, 0.0, 75.0).is_err());
        assert!(duration_histogram(Vec::<CanonicalTrip>::new(), None, 5.0, -1.0).is_err());
    }

    #[test]
    fn test_trip_aggregator_matches_individual_reductions() {
        let trips = sample_trips();
        let mut aggregator = TripAggregator::new(SummaryOptions::default()).unwrap();
        aggregator.extend(&trips);
        assert_eq!(aggregator.len(), 5);

        let result = aggregator.finish();

        assert_eq!(result.counts, count_by_user_type(&trips));
        assert_eq!(result.duration, duration_summary(&trips, 30.0));
        assert_eq!(result.duration_by_user_type, duration_by_user_type(&trips));
        assert_eq!(result.monthly, monthly_breakdown(&trips));
        assert_eq!(result.hourly, hourly_breakdown(&trips));
        assert_eq!(result.weekday, weekday_breakdown(&trips));
        assert_eq!(result.peak_month, Some(1));
        assert_eq!(result.histograms.len(), 3);
        assert_eq!(result.histograms[1].user_type, Some(UserType::Subscriber));
    }

    #[test]
    fn test_trip_aggregator_empty() {
        let aggregator = TripAggregator::new(SummaryOptions::default()).unwrap();
        assert!(aggregator.is_empty());

        let result = aggregator.finish();
        assert_eq!(result.counts.total, 0);
        assert_eq!(result.duration.mean_minutes, None);
        assert_eq!(result.duration_by_user_type.customer_mean_minutes, None);
        assert_eq!(result.monthly.months.len(), 12);
        assert_eq!(result.peak_month, None);
    }

    #[test]
    fn test_repeated_calls_are_independent() {
        let trips = sample_trips();
        assert_eq!(monthly_breakdown(&trips), monthly_breakdown(&trips));
        assert_eq!(duration_summary(&trips, 30.0), duration_summary(&trips, 30.0));
    }

    #[test]
    fn test_options_validation() {
        assert!(SummaryOptions::default().validate().is_ok());

        let negative = SummaryOptions {
            threshold_minutes: -1.0,
            ..Default::default()
        };
        assert!(TripAggregator::new(negative).is_err());

        let zero_width = SummaryOptions {
            histogram_bin_minutes: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            zero_width.validate(),
            Err(TripError::InvalidOptions(_))
        ));
    }
}
