//! Bikeshare Flux - Normalization and aggregation engine for bike-share trip data
//!
//! Flux turns per-trip records from several bike-share systems into one
//! canonical trip shape and computes descriptive statistics over it through a
//! deterministic pipeline: raw source row → normalization → canonical trip →
//! single-pass aggregation → summary report.
//!
//! ## Modules
//!
//! - **Normalization**: [`source`] profiles and the [`normalizer`] turn NYC,
//!   Chicago and Washington rows into [`types::CanonicalTrip`]s
//! - **Aggregation**: [`aggregator`] reductions and the combined [`TripAggregator`]
//! - **Interchange**: [`canonical`] CSV persistence and [`report`] JSON output

pub mod aggregator;
pub mod canonical;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod raw;
pub mod report;
pub mod source;
pub mod types;

pub use aggregator::{SummaryOptions, TripAggregator};
pub use error::TripError;
pub use normalizer::Normalizer;
pub use pipeline::{condense, raw_csv_to_report, summarize_canonical, summarize_raw, Summary};
pub use raw::RawTripRecord;
pub use source::{Source, SourceProfile};
pub use types::{CanonicalTrip, DayOfWeek, UserType};

/// Crate version embedded in all reports
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "bikeshare-flux";
