//! Daylens - Deterministic activity inference over personal telemetry
//!
//! Daylens turns raw personal telemetry (GPS fixes, app sessions, workouts,
//! user-labeled places) into a labeled timeline through a deterministic
//! pipeline: segmentation → merging → commute detection → gap filling →
//! activity classification and confidence scoring.
//!
//! ## Modules
//!
//! - **Timeline Pipeline**: Segment one processing window into enriched
//!   activity segments ([`pipeline`])
//! - **Place Inference**: Infer home/work/frequent places from weeks of
//!   hourly location history ([`inference`])
//! - **Intent Classification**: Label a bare app-usage summary without any
//!   location context ([`intent`])
//!
//! All stages are pure over their inputs; fetching and persistence are the
//! caller's concern, and re-running any stage on the same input yields the
//! same output (deterministic ids included).

pub mod apps;
pub mod classifier;
pub mod commute;
pub mod error;
pub mod gapfill;
pub mod geo;
pub mod inference;
pub mod intent;
pub mod merge;
pub mod pipeline;
pub mod places;
pub mod schema;
pub mod segmentation;
pub mod types;

pub use error::EngineError;
pub use pipeline::{
    generate_activity_segments, pending_lookup_keys, EngineOptions, SegmentWindow, TimelineEngine,
    WindowInputs,
};

// Schema exports
pub use schema::{
    coerce_hourly_rows, coerce_places, coerce_samples, coerce_sessions, coerce_workouts,
    parse_hourly_rows, parse_sample_rows, parse_session_rows, parse_workout_rows, SCHEMA_VERSION,
};

// Stage exports for callers composing their own pipeline
pub use classifier::ActivityClassifier;
pub use commute::CommuteDetector;
pub use gapfill::GapFiller;
pub use inference::{InferenceOptions, PlaceInferencer};
pub use intent::IntentClassifier;
pub use merge::SegmentMerger;
pub use segmentation::Segmenter;

/// Engine version embedded in diagnostics
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for diagnostics
pub const PRODUCER_NAME: &str = "daylens";
