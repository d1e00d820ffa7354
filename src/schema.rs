//! Boundary row schema
//!
//! Every row fetched from a store is modeled with an explicit schema here
//! and validated/coerced exactly once; nothing loosely-shaped flows past
//! this module. Malformed samples (null or non-finite coordinates, inverted
//! intervals) are dropped silently — missing data is never an error.

use crate::error::EngineError;
use crate::types::{
    AppSession, HourlyCellRow, LocationSample, UserPlace, WorkoutInterval,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current boundary schema version
pub const SCHEMA_VERSION: &str = "daylens.rows.v1";

/// Raw GPS fix as delivered by the samples store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSampleRow {
    pub recorded_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Raw app session row from the sessions store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSessionRow {
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Raw workout row from the workouts store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWorkoutRow {
    pub activity_type: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Raw hourly aggregate row from the historical store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHourlyRow {
    pub cell_key: String,
    pub hour_start: DateTime<Utc>,
    #[serde(default)]
    pub sample_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Parse a JSON array of raw sample rows
pub fn parse_sample_rows(json: &str) -> Result<Vec<RawSampleRow>, EngineError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse a JSON array of raw session rows
pub fn parse_session_rows(json: &str) -> Result<Vec<RawSessionRow>, EngineError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse a JSON array of raw workout rows
pub fn parse_workout_rows(json: &str) -> Result<Vec<RawWorkoutRow>, EngineError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse a JSON array of raw hourly aggregate rows
pub fn parse_hourly_rows(json: &str) -> Result<Vec<RawHourlyRow>, EngineError> {
    Ok(serde_json::from_str(json)?)
}

/// Coerce raw sample rows into validated samples, dropping malformed ones
pub fn coerce_samples(rows: &[RawSampleRow]) -> Vec<LocationSample> {
    rows.iter()
        .filter_map(|row| {
            let latitude = finite(row.latitude)?;
            let longitude = finite(row.longitude)?;
            Some(LocationSample {
                recorded_at: row.recorded_at,
                latitude,
                longitude,
            })
        })
        .collect()
}

/// Coerce raw session rows, dropping empty ids and inverted intervals
pub fn coerce_sessions(rows: &[RawSessionRow]) -> Vec<AppSession> {
    rows.iter()
        .filter(|row| !row.app_id.trim().is_empty() && row.end > row.start)
        .map(|row| AppSession {
            app_id: row.app_id.clone(),
            app_name: row.app_name.clone(),
            start: row.start,
            end: row.end,
        })
        .collect()
}

/// Coerce raw workout rows, dropping inverted intervals
pub fn coerce_workouts(rows: &[RawWorkoutRow]) -> Vec<WorkoutInterval> {
    rows.iter()
        .filter(|row| row.end > row.start)
        .map(|row| WorkoutInterval {
            activity_type: row.activity_type.clone(),
            start: row.start,
            end: row.end,
        })
        .collect()
}

/// Coerce raw hourly rows, dropping ones without a usable centroid
pub fn coerce_hourly_rows(rows: &[RawHourlyRow]) -> Vec<HourlyCellRow> {
    rows.iter()
        .filter_map(|row| {
            let latitude = finite(row.latitude)?;
            let longitude = finite(row.longitude)?;
            Some(HourlyCellRow {
                cell_key: row.cell_key.clone(),
                hour_start: row.hour_start,
                sample_count: row.sample_count,
                existing_label: row.existing_label.clone(),
                external_name: row.external_name.clone(),
                latitude,
                longitude,
            })
        })
        .collect()
}

/// Drop places whose coordinates or radius are unusable
pub fn coerce_places(places: Vec<UserPlace>) -> Vec<UserPlace> {
    places
        .into_iter()
        .filter(|p| {
            p.latitude.is_finite() && p.longitude.is_finite() && p.radius_meters.is_finite()
                && p.radius_meters > 0.0
        })
        .collect()
}
