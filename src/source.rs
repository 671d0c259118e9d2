//! Source systems and their field mappings
//!
//! Each bike-share system publishes trips in its own schema. A [`SourceProfile`]
//! captures everything the normalizer needs to know about one schema, so the
//! three built-in systems are plain data and further systems can be described
//! in a JSON profile without code changes.

use crate::error::TripError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Built-in source systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// New York City (Citi Bike)
    Nyc,
    /// Chicago (Divvy)
    Chicago,
    /// Washington, DC (Capital Bikeshare)
    Washington,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Nyc, Source::Chicago, Source::Washington];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Nyc => "NYC",
            Source::Chicago => "Chicago",
            Source::Washington => "Washington",
        }
    }

    /// Field mapping for this source
    pub fn profile(&self) -> SourceProfile {
        match self {
            Source::Nyc => SourceProfile {
                name: self.as_str().to_string(),
                duration_field: "tripduration".to_string(),
                duration_unit: DurationUnit::Seconds,
                start_field: "starttime".to_string(),
                start_format: "%m/%d/%Y %H:%M:%S".to_string(),
                user_type_field: "usertype".to_string(),
                user_type_vocabulary: UserTypeVocabulary::Canonical,
            },
            Source::Chicago => SourceProfile {
                name: self.as_str().to_string(),
                duration_field: "tripduration".to_string(),
                duration_unit: DurationUnit::Seconds,
                start_field: "starttime".to_string(),
                start_format: "%m/%d/%Y %H:%M".to_string(),
                user_type_field: "usertype".to_string(),
                user_type_vocabulary: UserTypeVocabulary::Canonical,
            },
            Source::Washington => SourceProfile {
                name: self.as_str().to_string(),
                duration_field: "Duration (ms)".to_string(),
                duration_unit: DurationUnit::Milliseconds,
                start_field: "Start date".to_string(),
                start_format: "%m/%d/%Y %H:%M".to_string(),
                user_type_field: "Member Type".to_string(),
                user_type_vocabulary: UserTypeVocabulary::Membership {
                    subscriber_label: "Registered".to_string(),
                },
            },
        }
    }
}

impl FromStr for Source {
    type Err = TripError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "nyc" => Ok(Source::Nyc),
            "chicago" => Ok(Source::Chicago),
            "washington" => Ok(Source::Washington),
            _ => Err(TripError::UnknownSource(tag.to_string())),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of the raw duration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Seconds,
    Milliseconds,
}

impl DurationUnit {
    /// Number of raw units in one minute
    pub fn per_minute(&self) -> f64 {
        match self {
            DurationUnit::Seconds => 60.0,
            DurationUnit::Milliseconds => 60_000.0,
        }
    }
}

/// How a source labels its users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserTypeVocabulary {
    /// Values are already `Subscriber` or `Customer`
    Canonical,
    /// One membership label means Subscriber; every other value means Customer
    Membership { subscriber_label: String },
}

/// Field mapping and formats for one source schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Display name used in logs and reports
    pub name: String,
    pub duration_field: String,
    pub duration_unit: DurationUnit,
    pub start_field: String,
    /// chrono `strftime`-style format of the start timestamp
    pub start_format: String,
    pub user_type_field: String,
    pub user_type_vocabulary: UserTypeVocabulary,
}

impl SourceProfile {
    /// Load a custom profile from JSON
    pub fn from_json(json: &str) -> Result<Self, TripError> {
        let profile: SourceProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Reject profiles with blank field names or formats
    pub fn validate(&self) -> Result<(), TripError> {
        let required = [
            ("name", &self.name),
            ("duration_field", &self.duration_field),
            ("start_field", &self.start_field),
            ("start_format", &self.start_format),
            ("user_type_field", &self.user_type_field),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(TripError::InvalidProfile(format!("'{key}' must not be empty")));
            }
        }
        if let UserTypeVocabulary::Membership { subscriber_label } = &self.user_type_vocabulary {
            if subscriber_label.trim().is_empty() {
                return Err(TripError::InvalidProfile(
                    "'subscriber_label' must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
