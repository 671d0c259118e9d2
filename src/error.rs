//! Error types for Bikeshare Flux

use thiserror::Error;

/// Errors that can occur while normalizing or aggregating trip data
#[derive(Debug, Error)]
pub enum TripError {
    /// A source tag matched none of the known systems. Fatal for the batch.
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// A single raw or canonical record carried a missing or unusable value.
    /// Recoverable: the record is skipped and counted.
    #[error("Malformed value in field '{field}' ({value:?}): {reason}")]
    MalformedValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid source profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid summary options: {0}")]
    InvalidOptions(String),

    #[error("Unexpected header: {0}")]
    InvalidHeader(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TripError {
    /// Build a [`TripError::MalformedValue`] for a field that is absent from a record.
    pub fn missing(field: &str) -> Self {
        TripError::MalformedValue {
            field: field.to_string(),
            value: String::new(),
            reason: "missing".to_string(),
        }
    }

    pub fn malformed(field: &str, value: &str, reason: impl Into<String>) -> Self {
        TripError::MalformedValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Classify a CSV error raised while reading one row. I/O failures stay
    /// fatal; anything else means the row itself is unusable.
    pub fn from_row(err: csv::Error) -> Self {
        if err.is_io_error() {
            return TripError::Csv(err);
        }
        TripError::MalformedValue {
            field: "<row>".to_string(),
            value: String::new(),
            reason: err.to_string(),
        }
    }

    /// Whether this error only affects one record and the batch may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TripError::MalformedValue { .. })
    }
}
