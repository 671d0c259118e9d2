//! Bikeshare CLI - Command-line interface for Bikeshare Flux
//!
//! Commands:
//! - condense: Normalize a raw source table into the canonical format
//! - summarize: Aggregate raw or canonical trips into a JSON report
//! - validate: Report which raw rows fail normalization
//! - sources: Print the built-in source profiles

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bikeshare_flux::aggregator::{
    DEFAULT_BIN_MINUTES, DEFAULT_LIMIT_MINUTES, DEFAULT_THRESHOLD_MINUTES,
};
use bikeshare_flux::pipeline::{normalize_stream, Summary};
use bikeshare_flux::report::ReportEncoder;
use bikeshare_flux::types::NormalizationStats;
use bikeshare_flux::{
    condense, summarize_canonical, summarize_raw, Normalizer, Source, SourceProfile,
    SummaryOptions, TripError, CRATE_VERSION,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Bikeshare - Normalize and summarize bike-share trip data
#[derive(Parser)]
#[command(name = "bikeshare")]
#[command(author = "Synheart AI Inc")]
#[command(version = CRATE_VERSION)]
#[command(about = "Normalize and summarize bike-share trip data", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a raw source table into the canonical CSV format
    Condense {
        #[command(flatten)]
        source: SourceArgs,

        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Aggregate trips into a JSON summary report
    Summarize {
        #[command(flatten)]
        source: SourceArgs,

        /// Input file path (use - for stdin). Canonical CSV unless a source is given
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Long-trip threshold in minutes
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_MINUTES)]
        threshold: f64,

        /// Histogram bin width in minutes
        #[arg(long, default_value_t = DEFAULT_BIN_MINUTES)]
        bin_width: f64,

        /// Histogram upper limit in minutes
        #[arg(long, default_value_t = DEFAULT_LIMIT_MINUTES)]
        limit: f64,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Check which raw rows fail normalization
    Validate {
        #[command(flatten)]
        source: SourceArgs,

        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the built-in source profiles
    Sources {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Built-in source system (nyc, chicago, washington)
    #[arg(long, conflicts_with = "profile")]
    source: Option<String>,

    /// JSON source profile describing a custom schema
    #[arg(long)]
    profile: Option<PathBuf>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bikeshare_flux={level},bikeshare={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), BikeshareCliError> {
    match cli.command {
        Commands::Condense {
            source,
            input,
            output,
        } => cmd_condense(&source, &input, &output),

        Commands::Summarize {
            source,
            input,
            output,
            threshold,
            bin_width,
            limit,
            output_format,
        } => {
            let options = SummaryOptions {
                threshold_minutes: threshold,
                histogram_bin_minutes: bin_width,
                histogram_limit_minutes: limit,
            };
            cmd_summarize(&source, &input, &output, options, output_format)
        }

        Commands::Validate {
            source,
            input,
            json,
        } => cmd_validate(&source, &input, json),

        Commands::Sources { json } => cmd_sources(json),
    }
}

fn cmd_condense(
    source: &SourceArgs,
    input: &Path,
    output: &Path,
) -> Result<(), BikeshareCliError> {
    let normalizer = resolve_normalizer(source)?.ok_or(BikeshareCliError::MissingSource)?;
    let reader = open_input(input)?;
    let writer = open_output(output)?;

    let stats = condense(reader, writer, normalizer)?;
    info!(
        output = %output.display(),
        written = stats.normalized,
        skipped = stats.skipped,
        "canonical file written"
    );

    Ok(())
}

fn cmd_summarize(
    source: &SourceArgs,
    input: &Path,
    output: &Path,
    options: SummaryOptions,
    output_format: OutputFormat,
) -> Result<(), BikeshareCliError> {
    let reader = open_input(input)?;

    let (label, summary): (String, Summary) = match resolve_normalizer(source)? {
        Some(normalizer) => {
            let label = normalizer.profile().name.clone();
            (label, summarize_raw(reader, normalizer, options)?)
        }
        None => {
            debug!("no source given, reading canonical input");
            (
                "canonical".to_string(),
                summarize_canonical(reader, options)?,
            )
        }
    };

    if summary.aggregates.counts.total == 0 {
        return Err(BikeshareCliError::NoTrips(summary.stats.skipped));
    }

    let encoder = ReportEncoder::new();
    let input_label = input.display().to_string();
    let mut report = match output_format {
        OutputFormat::Json => encoder.encode_to_json(&label, &input_label, summary)?,
        OutputFormat::JsonPretty => {
            encoder.encode_to_json_pretty(&label, &input_label, summary)?
        }
    };
    report.push('\n');

    let mut writer = open_output(output)?;
    writer.write_all(report.as_bytes())?;
    writer.flush()?;

    Ok(())
}

fn cmd_validate(source: &SourceArgs, input: &Path, json: bool) -> Result<(), BikeshareCliError> {
    let normalizer = resolve_normalizer(source)?.ok_or(BikeshareCliError::MissingSource)?;
    let label = normalizer.profile().name.clone();

    let mut trips = normalize_stream(open_input(input)?, normalizer)?;
    for trip in trips.by_ref() {
        trip?;
    }
    let stats = trips.into_stats();

    let report = ValidationReport::new(&label, &stats);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Source:         {}", report.source);
        println!("Total rows:     {}", report.total_rows);
        println!("Valid rows:     {}", report.valid_rows);
        println!("Skipped rows:   {}", report.skipped_rows);

        if !report.errors.is_empty() {
            println!("\nFirst errors:");
            for err in &report.errors {
                println!("  - Row {}: {}", err.row, err.error);
            }
        }
    }

    if report.skipped_rows > 0 {
        Err(BikeshareCliError::ValidationFailed(report.skipped_rows))
    } else {
        Ok(())
    }
}

fn cmd_sources(json: bool) -> Result<(), BikeshareCliError> {
    let profiles: Vec<SourceProfile> = Source::ALL.iter().map(Source::profile).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    println!("Built-in sources");
    println!("================");
    for (source, profile) in Source::ALL.iter().zip(&profiles) {
        println!();
        println!("{} (--source {})", profile.name, source.as_str().to_lowercase());
        println!("  duration:  '{}' ({:?})", profile.duration_field, profile.duration_unit);
        println!("  start:     '{}' ({})", profile.start_field, profile.start_format);
        println!("  user type: '{}' ({:?})", profile.user_type_field, profile.user_type_vocabulary);
    }
    println!();
    println!("Canonical output columns: duration, month, hour, day_of_week, user_type");

    Ok(())
}

// Helper functions

fn resolve_normalizer(args: &SourceArgs) -> Result<Option<Normalizer>, BikeshareCliError> {
    if let Some(path) = &args.profile {
        let profile = SourceProfile::from_json(&fs::read_to_string(path)?)?;
        debug!(profile = %profile.name, "loaded custom source profile");
        return Ok(Some(Normalizer::new(profile)));
    }

    match &args.source {
        Some(tag) => {
            let source: Source = tag.parse()?;
            Ok(Some(Normalizer::for_source(source)))
        }
        None => Ok(None),
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>, BikeshareCliError> {
    if path.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            warn!("reading trips from an interactive terminal; end input with Ctrl-D");
        }
        Ok(Box::new(io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

fn open_output(path: &Path) -> Result<Box<dyn Write>, BikeshareCliError> {
    if path.to_string_lossy() == "-" {
        Ok(Box::new(io::stdout().lock()))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

// Error types

#[derive(Debug)]
enum BikeshareCliError {
    Io(io::Error),
    Trip(TripError),
    Json(serde_json::Error),
    MissingSource,
    NoTrips(u64),
    ValidationFailed(u64),
}

impl From<io::Error> for BikeshareCliError {
    fn from(e: io::Error) -> Self {
        BikeshareCliError::Io(e)
    }
}

impl From<TripError> for BikeshareCliError {
    fn from(e: TripError) -> Self {
        BikeshareCliError::Trip(e)
    }
}

impl From<serde_json::Error> for BikeshareCliError {
    fn from(e: serde_json::Error) -> Self {
        BikeshareCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BikeshareCliError> for CliError {
    fn from(e: BikeshareCliError) -> Self {
        match e {
            BikeshareCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BikeshareCliError::Trip(TripError::UnknownSource(tag)) => CliError {
                code: "UNKNOWN_SOURCE".to_string(),
                message: format!("Unknown source: {}", tag),
                hint: Some("Run 'bikeshare sources' to list known sources".to_string()),
            },
            BikeshareCliError::Trip(e) => CliError {
                code: "TRIP_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the input matches the source's schema".to_string()),
            },
            BikeshareCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BikeshareCliError::MissingSource => CliError {
                code: "MISSING_SOURCE".to_string(),
                message: "A raw input needs --source or --profile".to_string(),
                hint: Some("Run 'bikeshare sources' to list known sources".to_string()),
            },
            BikeshareCliError::NoTrips(skipped) => CliError {
                code: "NO_TRIPS".to_string(),
                message: format!("No trips to aggregate ({} rows skipped)", skipped),
                hint: Some("Run 'bikeshare validate' to see why rows were skipped".to_string()),
            },
            BikeshareCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} rows failed normalization", count),
                hint: Some("Fix the reported rows or accept them being skipped".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    source: String,
    total_rows: u64,
    valid_rows: u64,
    skipped_rows: u64,
    errors: Vec<ValidationErrorDetail>,
}

impl ValidationReport {
    fn new(source: &str, stats: &NormalizationStats) -> Self {
        Self {
            source: source.to_string(),
            total_rows: stats.processed,
            valid_rows: stats.normalized,
            skipped_rows: stats.skipped,
            errors: stats
                .sample_errors
                .iter()
                .map(|s| ValidationErrorDetail {
                    row: s.row,
                    error: s.reason.clone(),
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    row: u64,
    error: String,
}
