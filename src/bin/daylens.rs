//! Daylens CLI - Command-line interface for the Daylens engine
//!
//! Commands:
//! - segment: Process one window of telemetry into activity segments
//! - infer-places: Infer home/work/frequent places from hourly history
//! - intent: Classify a bare app-usage summary
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use daylens::schema::{RawHourlyRow, RawSampleRow, RawSessionRow, RawWorkoutRow, SCHEMA_VERSION};
use daylens::types::{AppUsageSummary, UserPlace};
use daylens::{
    coerce_hourly_rows, coerce_places, coerce_samples, coerce_sessions, coerce_workouts,
    generate_activity_segments, EngineError, EngineOptions, IntentClassifier, PlaceInferencer,
    SegmentWindow, WindowInputs, ENGINE_VERSION,
};

/// Daylens - Deterministic activity inference over personal telemetry
#[derive(Parser)]
#[command(name = "daylens")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Turn personal telemetry into a labeled timeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one window of telemetry into activity segments
    Segment {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Infer home/work/frequent places from hourly location history
    InferPlaces {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// User timezone (IANA format, e.g., "America/New_York")
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Classify a bare app-usage summary
    Intent {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Print schema information
    Schema,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
}

/// One window of telemetry as submitted to `segment`
#[derive(Deserialize)]
struct SegmentRequest {
    user_id: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default)]
    samples: Vec<RawSampleRow>,
    #[serde(default)]
    places: Vec<UserPlace>,
    #[serde(default)]
    sessions: Vec<RawSessionRow>,
    #[serde(default)]
    workouts: Vec<RawWorkoutRow>,
    #[serde(default)]
    sleeping: bool,
}

/// Hourly history as submitted to `infer-places`
#[derive(Deserialize)]
struct InferRequest {
    #[serde(default)]
    rows: Vec<RawHourlyRow>,
}

/// Usage summary as submitted to `intent`
#[derive(Deserialize)]
struct IntentRequest {
    #[serde(default)]
    usage: Vec<AppUsageSummary>,
}

#[derive(Serialize)]
struct SchemaInfo {
    engine_version: &'static str,
    input_schema: &'static str,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid json input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Engine(#[from] EngineError),
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("daylens: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Segment { input, output, format } => cmd_segment(&input, &output, format),
        Commands::InferPlaces { input, output, timezone, format } => {
            cmd_infer_places(&input, &output, &timezone, format)
        }
        Commands::Intent { input, output, format } => cmd_intent(&input, &output, format),
        Commands::Schema => cmd_schema(),
    }
}

fn cmd_segment(input: &Path, output: &Path, format: OutputFormat) -> Result<(), CliError> {
    let request: SegmentRequest = serde_json::from_str(&read_input(input)?)?;

    let window = SegmentWindow {
        user_id: request.user_id,
        start: request.start,
        end: request.end,
        timezone: request.timezone,
    };
    let inputs = WindowInputs {
        samples: coerce_samples(&request.samples),
        places: coerce_places(request.places),
        sessions: coerce_sessions(&request.sessions),
        workouts: coerce_workouts(&request.workouts),
        sleeping: request.sleeping,
    };

    let segments = generate_activity_segments(&window, &inputs, &EngineOptions::default())?;
    write_output(output, &format_records(&segments, &format)?)
}

fn cmd_infer_places(
    input: &Path,
    output: &Path,
    timezone: &str,
    format: OutputFormat,
) -> Result<(), CliError> {
    let request: InferRequest = serde_json::from_str(&read_input(input)?)?;
    let rows = coerce_hourly_rows(&request.rows);

    let places = PlaceInferencer::infer(&rows, timezone, &Default::default())?;
    write_output(output, &format_records(&places, &format)?)
}

fn cmd_intent(input: &Path, output: &Path, format: OutputFormat) -> Result<(), CliError> {
    let request: IntentRequest = serde_json::from_str(&read_input(input)?)?;

    let result = IntentClassifier::classify(&request.usage, &Default::default());
    let rendered = match format {
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&result)?,
        _ => serde_json::to_string(&result)?,
    };
    write_output(output, &rendered)
}

fn cmd_schema() -> Result<(), CliError> {
    let info = SchemaInfo {
        engine_version: ENGINE_VERSION,
        input_schema: SCHEMA_VERSION,
    };
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn read_input(input: &Path) -> Result<String, CliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), CliError> {
    if output.to_string_lossy() == "-" {
        println!("{data}");
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn format_records<T: Serialize>(records: &[T], format: &OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Ndjson => {
            let lines: Result<Vec<String>, serde_json::Error> =
                records.iter().map(serde_json::to_string).collect();
            Ok(lines?.join("\n"))
        }
    }
}
