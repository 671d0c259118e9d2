//! Trip normalization
//!
//! This module converts raw source rows into canonical trips:
//! - Durations converted to minutes
//! - Start timestamps reduced to month, hour and weekday
//! - User labels mapped onto Subscriber/Customer

use crate::error::TripError;
use crate::raw::RawTripRecord;
use crate::source::{Source, SourceProfile, UserTypeVocabulary};
use crate::types::{CanonicalTrip, DayOfWeek, UserType};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Calendar components of a trip's start time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartTime {
    pub month: u32,
    pub hour: u32,
    pub weekday: DayOfWeek,
}

/// Normalizer for converting raw rows of one source into canonical trips
#[derive(Debug, Clone)]
pub struct Normalizer {
    profile: SourceProfile,
}

impl Normalizer {
    pub fn new(profile: SourceProfile) -> Self {
        Self { profile }
    }

    pub fn for_source(source: Source) -> Self {
        Self::new(source.profile())
    }

    pub fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    /// Normalize one raw row. Either every field converts or the row fails as a whole.
    pub fn normalize(&self, raw: &RawTripRecord) -> Result<CanonicalTrip, TripError> {
        let duration_minutes = self.normalize_duration(raw)?;
        let start = self.normalize_time(raw)?;
        let user_type = self.normalize_user_type(raw)?;

        CanonicalTrip::new(
            duration_minutes,
            start.month,
            start.hour,
            start.weekday,
            user_type,
        )
    }

    /// Trip duration in minutes
    pub fn normalize_duration(&self, raw: &RawTripRecord) -> Result<f64, TripError> {
        let field = self.profile.duration_field.as_str();
        let value = raw.get(field).ok_or_else(|| TripError::missing(field))?;

        let amount: f64 = value
            .trim()
            .parse()
            .map_err(|_| TripError::malformed(field, value, "not a number"))?;

        if !amount.is_finite() || amount <= 0.0 {
            return Err(TripError::malformed(
                field,
                value,
                "duration must be positive",
            ));
        }

        Ok(amount / self.profile.duration_unit.per_minute())
    }

    /// Month, hour and weekday of the trip start
    pub fn normalize_time(&self, raw: &RawTripRecord) -> Result<StartTime, TripError> {
        let field = self.profile.start_field.as_str();
        let value = raw.get(field).ok_or_else(|| TripError::missing(field))?;

        let started = NaiveDateTime::parse_from_str(value.trim(), &self.profile.start_format)
            .map_err(|e| {
                TripError::malformed(
                    field,
                    value,
                    format!("expected format '{}': {e}", self.profile.start_format),
                )
            })?;

        Ok(StartTime {
            month: started.month(),
            hour: started.hour(),
            weekday: DayOfWeek::from(started.weekday()),
        })
    }

    /// Canonical user category
    pub fn normalize_user_type(&self, raw: &RawTripRecord) -> Result<UserType, TripError> {
        let field = self.profile.user_type_field.as_str();
        let value = raw.get(field).ok_or_else(|| TripError::missing(field))?;

        match &self.profile.user_type_vocabulary {
            UserTypeVocabulary::Membership { subscriber_label } => {
                if value.trim() == subscriber_label.as_str() {
                    Ok(UserType::Subscriber)
                } else {
                    Ok(UserType::Customer)
                }
            }
            UserTypeVocabulary::Canonical => UserType::from_label(value).ok_or_else(|| {
                TripError::malformed(field, value, "expected 'Subscriber' or 'Customer'")
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nyc_record() -> RawTripRecord {
        [
            ("tripduration", "838"),
            ("starttime", "1/1/2016 0:00:00"),
            ("stoptime", "1/1/2016 0:14:00"),
            ("usertype", "Customer"),
        ]
        .into_iter()
        .collect()
    }

    fn chicago_record() -> RawTripRecord {
        [
            ("tripduration", "926"),
            ("starttime", "3/31/2016 23:30"),
            ("usertype", "Subscriber"),
        ]
        .into_iter()
        .collect()
    }

    fn washington_record() -> RawTripRecord {
        [
            ("Duration (ms)", "427846"),
            ("Start date", "3/31/2016 22:57"),
            ("Member Type", "Registered"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_nyc_record() {
        let trip = Normalizer::for_source(Source::Nyc)
            .normalize(&nyc_record())
            .unwrap();

        assert!((trip.duration_minutes - 13.9667).abs() < 0.001);
        assert_eq!(trip.start_month, 1);
        assert_eq!(trip.start_hour, 0);
        assert_eq!(trip.start_weekday, DayOfWeek::Friday);
        assert_eq!(trip.user_type, UserType::Customer);
    }

    #[test]
    fn test_chicago_record() {
        let trip = Normalizer::for_source(Source::Chicago)
            .normalize(&chicago_record())
            .unwrap();

        assert!((trip.duration_minutes - 15.4333).abs() < 0.001);
        assert_eq!(trip.start_month, 3);
        assert_eq!(trip.start_hour, 23);
        assert_eq!(trip.start_weekday, DayOfWeek::Thursday);
        assert_eq!(trip.user_type, UserType::Subscriber);
    }

    #[test]
    fn test_washington_record() {
        let trip = Normalizer::for_source(Source::Washington)
            .normalize(&washington_record())
            .unwrap();

        assert!((trip.duration_minutes - 7.1308).abs() < 0.001);
        assert_eq!(trip.start_month, 3);
        assert_eq!(trip.start_hour, 22);
        assert_eq!(trip.start_weekday, DayOfWeek::Thursday);
        assert_eq!(trip.user_type, UserType::Subscriber);
    }

    #[test]
    fn test_duration_units() {
        let seconds: RawTripRecord = [("tripduration", "90")].into_iter().collect();
        let millis: RawTripRecord = [("Duration (ms)", "90000")].into_iter().collect();

        let nyc = Normalizer::for_source(Source::Nyc);
        let washington = Normalizer::for_source(Source::Washington);

        assert_eq!(nyc.normalize_duration(&seconds).unwrap(), 1.5);
        assert_eq!(washington.normalize_duration(&millis).unwrap(), 1.5);
    }

    #[test]
    fn test_malformed_duration() {
        let nyc = Normalizer::for_source(Source::Nyc);

        let missing = RawTripRecord::new();
        assert!(matches!(
            nyc.normalize_duration(&missing),
            Err(TripError::MalformedValue { ref reason, .. }) if reason == "missing"
        ));

        for bad in ["abc", "", "-5", "0", "NaN", "inf"] {
            let record: RawTripRecord = [("tripduration", bad)].into_iter().collect();
            assert!(nyc.normalize_duration(&record).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_timestamp_format_is_source_specific() {
        // NYC timestamps carry seconds; Chicago and Washington do not
        let without_seconds: RawTripRecord =
            [("starttime", "3/31/2016 23:30")].into_iter().collect();
        let with_seconds: RawTripRecord =
            [("starttime", "3/31/2016 23:30:15")].into_iter().collect();

        let nyc = Normalizer::for_source(Source::Nyc);
        let chicago = Normalizer::for_source(Source::Chicago);

        assert!(nyc.normalize_time(&without_seconds).is_err());
        assert!(nyc.normalize_time(&with_seconds).is_ok());
        assert!(chicago.normalize_time(&without_seconds).is_ok());
        assert!(chicago.normalize_time(&with_seconds).is_err());
    }

    #[test]
    fn test_washington_membership_mapping() {
        let washington = Normalizer::for_source(Source::Washington);

        for (label, expected) in [
            ("Registered", UserType::Subscriber),
            ("Casual", UserType::Customer),
            ("Unknown", UserType::Customer),
            ("", UserType::Customer),
        ] {
            let record: RawTripRecord = [("Member Type", label)].into_iter().collect();
            assert_eq!(washington.normalize_user_type(&record).unwrap(), expected);
        }

        assert!(washington
            .normalize_user_type(&RawTripRecord::new())
            .is_err());
    }

    #[test]
    fn test_canonical_vocabulary_is_strict() {
        let nyc = Normalizer::for_source(Source::Nyc);

        let subscriber: RawTripRecord = [("usertype", "Subscriber")].into_iter().collect();
        assert_eq!(
            nyc.normalize_user_type(&subscriber).unwrap(),
            UserType::Subscriber
        );

        let blank: RawTripRecord = [("usertype", "")].into_iter().collect();
        assert!(nyc.normalize_user_type(&blank).is_err());

        let dependent: RawTripRecord = [("usertype", "Dependent")].into_iter().collect();
        assert!(nyc.normalize_user_type(&dependent).is_err());
    }

    #[test]
    fn test_no_partial_records() {
        let mut record = nyc_record();
        record.insert("starttime", "not a date");

        let result = Normalizer::for_source(Source::Nyc).normalize(&record);
        assert!(matches!(
            result,
            Err(TripError::MalformedValue { ref field, .. }) if field == "starttime"
        ));
    }
}
