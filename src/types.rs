//! Core types for the Daylens timeline pipeline
//!
//! This module defines the data structures that flow through each stage of
//! the pipeline: validated location samples, user places, location segments,
//! commute detections, app usage, inferred places, and the final enriched
//! activity segments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default matching radius for a user place (meters)
pub const DEFAULT_PLACE_RADIUS_M: f64 = 150.0;

fn default_place_radius() -> f64 {
    DEFAULT_PLACE_RADIUS_M
}

/// A validated GPS fix. Coordinates are always finite; raw rows with null or
/// non-finite coordinates are dropped at the schema boundary and never reach
/// this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub recorded_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Category of a user-defined place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceCategory {
    Home,
    Work,
    Gym,
    Commute,
    Other,
}

impl PlaceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Home => "home",
            PlaceCategory::Work => "work",
            PlaceCategory::Gym => "gym",
            PlaceCategory::Commute => "commute",
            PlaceCategory::Other => "other",
        }
    }
}

/// A user-defined place used as the reference set for matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPlace {
    pub id: String,
    pub label: String,
    pub category: PlaceCategory,
    pub latitude: f64,
    pub longitude: f64,
    /// Matching radius in meters (150 m when unspecified)
    #[serde(default = "default_place_radius")]
    pub radius_meters: f64,
}

/// Kind of a location segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    LocationBlock,
    Commute,
}

/// Metadata attached to a location segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub kind: SegmentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Short-commute annotation folded into the following segment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_annotation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_place_label: Option<String>,
    /// Total path length for commute segments (meters)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    /// True for blocks synthesized by the gap filler
    #[serde(default)]
    pub carried_forward: bool,
    /// Consensus ratio of the group that produced this segment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_ratio: Option<f64>,
}

impl SegmentMeta {
    pub fn location_block() -> Self {
        Self {
            kind: SegmentKind::LocationBlock,
            intent: None,
            travel_annotation: None,
            destination_place_id: None,
            destination_place_label: None,
            distance_m: None,
            carried_forward: false,
            match_ratio: None,
        }
    }

    pub fn commute() -> Self {
        Self {
            kind: SegmentKind::Commute,
            intent: Some("commute".to_string()),
            travel_annotation: None,
            destination_place_id: None,
            destination_place_label: None,
            distance_m: None,
            carried_forward: false,
            match_ratio: None,
        }
    }
}

/// A contiguous block of time dominated by a single matched place (or
/// "unknown"), or a standalone commute.
///
/// `source_id` is deterministic (window start + place key + segment start)
/// so re-running segmentation on the same input is idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSegment {
    pub source_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_label: Option<String>,
    pub centroid_lat: f64,
    pub centroid_lng: f64,
    pub sample_count: usize,
    /// Segment confidence, always in [0, 1]
    pub confidence: f64,
    pub meta: SegmentMeta,
}

impl LocationSegment {
    pub fn is_commute(&self) -> bool {
        self.meta.kind == SegmentKind::Commute
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

/// Transient result of examining one gap for movement.
///
/// Never persisted: a long commute is promoted to a [`LocationSegment`],
/// a short one is folded into the following segment's annotation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommuteDetection {
    pub is_commute: bool,
    pub duration_ms: i64,
    pub is_long_commute: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_annotation: Option<String>,
    /// First place matched anywhere in the gap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_place: Option<String>,
    /// Last place matched anywhere in the gap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_place: Option<String>,
    /// Total path length, not straight-line (meters)
    pub distance_meters: f64,
    #[serde(default)]
    pub samples: Vec<LocationSample>,
}

/// One hourly aggregate row for a spatial cell, fetched from the historical
/// store. Input to the Place Inference Engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyCellRow {
    pub cell_key: String,
    pub hour_start: DateTime<Utc>,
    pub sample_count: u32,
    /// User-assigned label already attached to this cell, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_label: Option<String>,
    /// Best-guess name from an external lookup, if one resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Aggregate statistics for one spatial cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellStats {
    pub total_hours: u32,
    pub overnight_hours: u32,
    pub work_hours: u32,
    pub weekend_hours: u32,
    pub distinct_days: u32,
}

/// Inferred type of a historical place cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredPlaceType {
    Home,
    Work,
    Frequent,
    Unknown,
}

impl InferredPlaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferredPlaceType::Home => "home",
            InferredPlaceType::Work => "work",
            InferredPlaceType::Frequent => "frequent",
            InferredPlaceType::Unknown => "unknown",
        }
    }
}

/// Ephemeral output of the Place Inference Engine.
///
/// A cell is promoted to a [`UserPlace`] only on explicit user confirmation,
/// which is an external concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredPlace {
    pub cell_key: String,
    pub inferred_type: InferredPlaceType,
    pub confidence: f64,
    pub suggested_label: String,
    pub reasoning: String,
    pub latitude: f64,
    pub longitude: f64,
    pub stats: CellStats,
}

/// App category for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppCategory {
    Work,
    Social,
    Entertainment,
    Comms,
    Utility,
    Ignore,
}

impl AppCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppCategory::Work => "work",
            AppCategory::Social => "social",
            AppCategory::Entertainment => "entertainment",
            AppCategory::Comms => "comms",
            AppCategory::Utility => "utility",
            AppCategory::Ignore => "ignore",
        }
    }
}

/// One per-app session interval from the sessions store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSession {
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Per-app usage within a window. Aggregator output and Intent Classifier
/// input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUsageSummary {
    pub app_id: String,
    pub seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<AppCategory>,
}

/// A workout interval from the workouts store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutInterval {
    pub activity_type: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Final activity label for a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLabel {
    Workout,
    Sleep,
    Commute,
    DeepWork,
    CollaborativeWork,
    Meeting,
    DistractedTime,
    Leisure,
    ExtendedSocial,
    SocialBreak,
    PersonalTime,
    AwayFromDesk,
    OfflineActivity,
    MixedActivity,
}

impl ActivityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Workout => "workout",
            ActivityLabel::Sleep => "sleep",
            ActivityLabel::Commute => "commute",
            ActivityLabel::DeepWork => "deep_work",
            ActivityLabel::CollaborativeWork => "collaborative_work",
            ActivityLabel::Meeting => "meeting",
            ActivityLabel::DistractedTime => "distracted_time",
            ActivityLabel::Leisure => "leisure",
            ActivityLabel::ExtendedSocial => "extended_social",
            ActivityLabel::SocialBreak => "social_break",
            ActivityLabel::PersonalTime => "personal_time",
            ActivityLabel::AwayFromDesk => "away_from_desk",
            ActivityLabel::OfflineActivity => "offline_activity",
            ActivityLabel::MixedActivity => "mixed_activity",
        }
    }
}

/// Evidence that produced a segment's label and confidence, kept for audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentEvidence {
    pub sample_count: usize,
    pub match_ratio: f64,
    pub session_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_category: Option<AppCategory>,
    pub dominant_share: f64,
    pub workout: bool,
    pub sleeping: bool,
    #[serde(default)]
    pub carried_forward: bool,
    /// Engine instance that produced this segment
    pub engine_instance: String,
}

/// The final enriched unit of the timeline.
///
/// Created once per processed segment; `id` is deterministic so downstream
/// upserts are idempotent, and `source_ids` trace back to the raw inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySegment {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Hour bucket of the window start, "YYYY-MM-DDTHH" in UTC
    pub hour_bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_category: Option<PlaceCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lng: Option<f64>,
    pub inferred_activity: ActivityLabel,
    pub activity_confidence: f64,
    /// Top apps by overlap seconds, at most 5, `ignore` excluded
    pub top_apps: Vec<AppUsageSummary>,
    pub total_screen_seconds: f64,
    pub evidence: SegmentEvidence,
    pub source_ids: Vec<String>,
}

/// Intent label for a pure app-usage summary (no location context)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    Work,
    Leisure,
    DistractedWork,
    Mixed,
    Offline,
}

impl IntentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Work => "work",
            IntentLabel::Leisure => "leisure",
            IntentLabel::DistractedWork => "distracted_work",
            IntentLabel::Mixed => "mixed",
            IntentLabel::Offline => "offline",
        }
    }
}

/// Result of the standalone Intent Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub label: IntentLabel,
    /// Per-bucket seconds; comms time reports under "work"
    pub breakdown: BTreeMap<String, f64>,
    pub total_seconds: f64,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_place_radius_default() {
        let json = r#"{
            "id": "p1",
            "label": "Home",
            "category": "home",
            "latitude": 51.5,
            "longitude": -0.1
        }"#;
        let place: UserPlace = serde_json::from_str(json).unwrap();
        assert_eq!(place.radius_meters, 150.0);
    }

    #[test]
    fn test_segment_kind_serializes_snake_case() {
        let meta = SegmentMeta::commute();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "commute");
        assert_eq!(json["intent"], "commute");
    }

    #[test]
    fn test_segment_duration() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let seg = LocationSegment {
            source_id: "seg-1".to_string(),
            start,
            end,
            place_id: None,
            place_label: None,
            centroid_lat: 0.0,
            centroid_lng: 0.0,
            sample_count: 0,
            confidence: 0.0,
            meta: SegmentMeta::location_block(),
        };
        assert_eq!(seg.duration_ms(), 3_600_000);
        assert!(!seg.is_commute());
    }

    #[test]
    fn test_activity_label_round_trip() {
        let json = serde_json::to_string(&ActivityLabel::DeepWork).unwrap();
        assert_eq!(json, "\"deep_work\"");
        let back: ActivityLabel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActivityLabel::DeepWork);
    }
}
