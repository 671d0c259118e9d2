//! Pipeline orchestration
//!
//! This module provides the public API for Bikeshare Flux.
//! It wires raw CSV input through normalization into either the canonical
//! interchange format or the single-pass aggregator.

use crate::aggregator::{SummaryOptions, TripAggregator};
use crate::canonical::{CanonicalReader, CanonicalWriter};
use crate::error::TripError;
use crate::normalizer::Normalizer;
use crate::raw::RawTripRecord;
use crate::report::ReportEncoder;
use crate::source::Source;
use crate::types::{AggregateResult, CanonicalTrip, NormalizationStats, SkippedRecord};
use std::io::{Read, Write};
use tracing::{debug, info, warn};

/// Number of skip reasons kept in [`NormalizationStats::sample_errors`]
pub const MAX_SAMPLE_ERRORS: usize = 5;

/// Aggregates plus the bookkeeping of the rows that produced them
#[derive(Debug, Clone)]
pub struct Summary {
    pub aggregates: AggregateResult,
    pub stats: NormalizationStats,
}

/// Iterator over the canonical trips of a raw source stream.
///
/// Malformed rows are skipped and counted in [`NormalizingReader::stats`];
/// only fatal errors (I/O) are yielded as `Err`.
pub struct NormalizingReader<R: Read> {
    rows: csv::DeserializeRecordsIntoIter<R, RawTripRecord>,
    normalizer: Normalizer,
    stats: NormalizationStats,
}

impl<R: Read> NormalizingReader<R> {
    pub fn new(reader: R, normalizer: Normalizer) -> Result<Self, TripError> {
        let mut inner = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = inner.headers()?;
        let profile = normalizer.profile();
        for field in [
            &profile.duration_field,
            &profile.start_field,
            &profile.user_type_field,
        ] {
            if !headers.iter().any(|h| h == field.as_str()) {
                warn!(
                    source = %profile.name,
                    field = %field,
                    "expected column missing from header; every row will be skipped"
                );
            }
        }

        Ok(Self {
            rows: inner.into_deserialize(),
            normalizer,
            stats: NormalizationStats::default(),
        })
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    pub fn into_stats(self) -> NormalizationStats {
        self.stats
    }
}

impl<R: Read> Iterator for NormalizingReader<R> {
    type Item = Result<CanonicalTrip, TripError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = self.rows.next()?;
            let outcome = row
                .map_err(TripError::from_row)
                .and_then(|raw| self.normalizer.normalize(&raw));

            match outcome {
                Ok(trip) => {
                    self.stats.processed += 1;
                    self.stats.normalized += 1;
                    return Some(Ok(trip));
                }
                Err(err) if err.is_recoverable() => {
                    self.stats.processed += 1;
                    record_skip(&mut self.stats, err);
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn record_skip(stats: &mut NormalizationStats, err: TripError) {
    let row = stats.processed;
    stats.skipped += 1;
    debug!(row, error = %err, "skipping record");
    if stats.sample_errors.len() < MAX_SAMPLE_ERRORS {
        stats.sample_errors.push(SkippedRecord {
            row,
            reason: err.to_string(),
        });
    }
}

fn log_completion(label: &str, stats: &NormalizationStats) {
    if stats.skipped > 0 {
        warn!(
            source = label,
            skipped = stats.skipped,
            processed = stats.processed,
            "records skipped during normalization"
        );
    }
    info!(
        source = label,
        processed = stats.processed,
        normalized = stats.normalized,
        "batch complete"
    );
}

/// Stream a raw source table into canonical trips
pub fn normalize_stream<R: Read>(
    reader: R,
    normalizer: Normalizer,
) -> Result<NormalizingReader<R>, TripError> {
    NormalizingReader::new(reader, normalizer)
}

/// Convert a raw source table into the canonical interchange format
pub fn condense<R: Read, W: Write>(
    reader: R,
    writer: W,
    normalizer: Normalizer,
) -> Result<NormalizationStats, TripError> {
    let label = normalizer.profile().name.clone();
    let mut trips = NormalizingReader::new(reader, normalizer)?;
    let mut out = CanonicalWriter::new(writer)?;

    for trip in trips.by_ref() {
        out.write(&trip?)?;
    }
    out.finish()?;

    let stats = trips.into_stats();
    log_completion(&label, &stats);
    Ok(stats)
}

/// Normalize a raw source table and aggregate it in one pass
pub fn summarize_raw<R: Read>(
    reader: R,
    normalizer: Normalizer,
    options: SummaryOptions,
) -> Result<Summary, TripError> {
    let label = normalizer.profile().name.clone();
    let mut aggregator = TripAggregator::new(options)?;
    let mut trips = NormalizingReader::new(reader, normalizer)?;

    for trip in trips.by_ref() {
        aggregator.push(&trip?);
    }

    let stats = trips.into_stats();
    log_completion(&label, &stats);

    Ok(Summary {
        aggregates: aggregator.finish(),
        stats,
    })
}

/// Aggregate a canonical interchange file, skipping rows that fail validation
pub fn summarize_canonical<R: Read>(
    reader: R,
    options: SummaryOptions,
) -> Result<Summary, TripError> {
    let mut aggregator = TripAggregator::new(options)?;
    let mut stats = NormalizationStats::default();

    for row in CanonicalReader::new(reader)? {
        match row {
            Ok(trip) => {
                stats.processed += 1;
                stats.normalized += 1;
                aggregator.push(&trip);
            }
            Err(err) if err.is_recoverable() => {
                stats.processed += 1;
                record_skip(&mut stats, err);
            }
            Err(err) => return Err(err),
        }
    }

    log_completion("canonical", &stats);

    Ok(Summary {
        aggregates: aggregator.finish(),
        stats,
    })
}

/// Convert a raw CSV table of a built-in source into a JSON summary report.
///
/// # Example
/// ```ignore
/// let report_json = raw_csv_to_report(Source::Washington, &washington_csv, SummaryOptions::default())?;
/// ```
pub fn raw_csv_to_report(
    source: Source,
    raw_csv: &str,
    options: SummaryOptions,
) -> Result<String, TripError> {
    let summary = summarize_raw(raw_csv.as_bytes(), Normalizer::for_source(source), options)?;
    ReportEncoder::new().encode_to_json(source.as_str(), "<memory>", summary)
}
