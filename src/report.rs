//! Summary report encoding
//!
//! This module wraps finished aggregates in a report envelope with producer,
//! provenance and data-quality metadata, and encodes it as JSON for the
//! presentation layer.

use crate::error::TripError;
use crate::pipeline::Summary;
use crate::types::{
    ReportProducer, ReportProvenance, ReportQuality, SummaryReport,
};
use crate::{CRATE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Encoder for summary reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Wrap a summary in a report envelope
    pub fn encode(&self, source: &str, input: &str, summary: Summary) -> SummaryReport {
        let stats = summary.stats;

        SummaryReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: CRATE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            provenance: ReportProvenance {
                source: source.to_string(),
                input: input.to_string(),
                computed_at_utc: Utc::now().to_rfc3339(),
            },
            quality: ReportQuality {
                processed: stats.processed,
                normalized: stats.normalized,
                skipped: stats.skipped,
                skip_ratio: stats.skip_ratio(),
                sample_errors: stats.sample_errors,
            },
            aggregates: summary.aggregates,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        source: &str,
        input: &str,
        summary: Summary,
    ) -> Result<String, TripError> {
        let report = self.encode(source, input, summary);
        Ok(serde_json::to_string(&report)?)
    }

    /// Encode to pretty-printed JSON string
    pub fn encode_to_json_pretty(
        &self,
        source: &str,
        input: &str,
        summary: Summary,
    ) -> Result<String, TripError> {
        let report = self.encode(source, input, summary);
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
