//! Error types for the Daylens engine

use thiserror::Error;

/// Errors that can occur during timeline inference
///
/// Sparse or empty input is never an error anywhere in the engine; the
/// variants here cover boundary parsing problems and caller contract
/// violations only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid window bounds: start {start} is not before end {end}")]
    InvalidWindow { start: String, end: String },
}
