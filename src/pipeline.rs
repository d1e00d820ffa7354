//! Pipeline orchestration
//!
//! This module provides the public API for the Daylens engine. For one
//! processing window it runs segmentation, merging, commute detection, and
//! gap filling over the raw samples, then enriches every resulting block
//! with an activity label and confidence. Place inference runs separately
//! over multi-day history and is cached per user until explicitly
//! invalidated.
//!
//! All fetching is the caller's concern: inputs arrive pre-fetched (a
//! concurrent fan-out upstream), and a source that failed to fetch simply
//! arrives empty. The engine itself performs no I/O.

use crate::apps::{total_seconds, UsageAggregator};
use crate::classifier::{
    dominant_category, dominant_share, score_confidence, ActivityClassifier, ClassifierInput,
    ConfidenceInput,
};
use crate::commute::CommuteDetector;
use crate::error::EngineError;
use crate::gapfill::GapFiller;
use crate::geo::rounded_coord_key;
use crate::inference::{InferenceOptions, PlaceInferencer};
use crate::merge::{SegmentMerger, DEFAULT_MERGE_GAP_MS};
use crate::segmentation::Segmenter;
use crate::types::{
    ActivitySegment, AppCategory, AppSession, AppUsageSummary, HourlyCellRow, InferredPlace,
    LocationSample, LocationSegment, PlaceCategory, SegmentEvidence, UserPlace, WorkoutInterval,
};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use log::debug;
use std::collections::HashMap;
use uuid::Uuid;

/// One processing window. `start` must precede `end`; anything else is a
/// caller bug and fails fast.
#[derive(Debug, Clone)]
pub struct SegmentWindow {
    pub user_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA timezone used for local-hour classification
    pub timezone: String,
}

impl SegmentWindow {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.start >= self.end {
            return Err(EngineError::InvalidWindow {
                start: self.start.to_rfc3339(),
                end: self.end.to_rfc3339(),
            });
        }
        Ok(())
    }

    fn tz(&self) -> Result<Tz, EngineError> {
        self.timezone
            .parse()
            .map_err(|_| EngineError::InvalidTimezone(self.timezone.clone()))
    }
}

/// Pre-fetched inputs for one window. A source that failed upstream arrives
/// empty and degrades that source's contribution only.
#[derive(Debug, Clone, Default)]
pub struct WindowInputs {
    pub samples: Vec<LocationSample>,
    pub places: Vec<UserPlace>,
    pub sessions: Vec<AppSession>,
    pub workouts: Vec<WorkoutInterval>,
    /// A sleep signal covers this window
    pub sleeping: bool,
}

/// Engine tuning. Defaults carry the standard thresholds.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum GPS-dropout gap bridged by the merger (milliseconds)
    pub merge_gap_ms: i64,
    /// User app-category overrides, layered over the built-in table
    pub category_overrides: HashMap<String, AppCategory>,
    pub inference: InferenceOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            merge_gap_ms: DEFAULT_MERGE_GAP_MS,
            category_overrides: HashMap::new(),
            inference: InferenceOptions::default(),
        }
    }
}

/// Generate activity segments for one window (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let segments = generate_activity_segments(&window, &inputs, &EngineOptions::default())?;
/// ```
pub fn generate_activity_segments(
    window: &SegmentWindow,
    inputs: &WindowInputs,
    options: &EngineOptions,
) -> Result<Vec<ActivitySegment>, EngineError> {
    TimelineEngine::with_options(options.clone()).process_window(window, inputs)
}

/// Cached place-inference result for one user
#[derive(Debug, Clone)]
struct CachedInference {
    places: Vec<InferredPlace>,
    computed_at: DateTime<Utc>,
}

/// Stateful engine owning options and the place-inference cache.
///
/// The cache has no TTL; it holds until `invalidate_inference` or
/// `clear_inference_cache` is called, or a forced refresh recomputes it.
pub struct TimelineEngine {
    options: EngineOptions,
    instance_id: String,
    inference_cache: HashMap<String, CachedInference>,
}

impl Default for TimelineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineEngine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            options,
            instance_id: Uuid::new_v4().to_string(),
            inference_cache: HashMap::new(),
        }
    }

    /// Fix the instance id recorded in evidence (useful in tests)
    pub fn with_instance_id(mut self, instance_id: String) -> Self {
        self.instance_id = instance_id;
        self
    }

    /// Derive the location-block sequence for a window: segmentation,
    /// merging, commute detection over the gaps, then gap filling.
    ///
    /// Exposed separately because renderers consume these blocks directly.
    pub fn derive_location_segments(
        &self,
        window: &SegmentWindow,
        inputs: &WindowInputs,
    ) -> Result<Vec<LocationSegment>, EngineError> {
        window.validate()?;

        let segments = Segmenter::segment(&inputs.samples, &inputs.places, window.start, window.end);
        debug!(
            "segmented {} samples into {} candidate blocks",
            inputs.samples.len(),
            segments.len()
        );

        let mut merged = SegmentMerger::merge(segments, self.options.merge_gap_ms);

        // Gaps are the spans not covered by a place-matched block; samples
        // with no stable place are commute candidates, not presence
        let matched_spans: Vec<(DateTime<Utc>, DateTime<Utc>)> = merged
            .iter()
            .filter(|s| s.place_id.is_some())
            .map(|s| (s.start, s.end))
            .collect();

        let mut commutes = Vec::new();
        let mut movement_gaps: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
        for (gap_start, gap_end) in window_gaps(window, &matched_spans) {
            let detection =
                CommuteDetector::detect(&inputs.samples, gap_start, gap_end, &inputs.places);
            if !detection.is_commute {
                continue;
            }
            movement_gaps.push((gap_start, gap_end));
            if detection.is_long_commute {
                if let Some(segment) =
                    CommuteDetector::promote(&detection, window.start, &inputs.places)
                {
                    commutes.push(segment);
                }
            } else if let Some(annotation) = &detection.travel_annotation {
                CommuteDetector::attach_annotation(&mut merged, gap_end, annotation);
            }
        }
        debug!("detected {} standalone commutes", commutes.len());

        // An unknown block inside a movement gap is the travel itself, and
        // the detection supersedes it
        merged.retain(|s| {
            s.place_id.is_some()
                || !movement_gaps
                    .iter()
                    .any(|(a, b)| s.start >= *a && s.end <= *b)
        });

        let mut blocks = merged;
        blocks.extend(commutes);
        blocks.sort_by_key(|s| s.start);

        Ok(GapFiller::fill(blocks, &inputs.samples, self.options.merge_gap_ms))
    }

    /// Process one window into enriched activity segments.
    ///
    /// Empty inputs yield an empty result; a window with screen time but no
    /// usable location data yields a single whole-window segment. Ids are
    /// deterministic, so reprocessing a window upserts the same rows.
    pub fn process_window(
        &self,
        window: &SegmentWindow,
        inputs: &WindowInputs,
    ) -> Result<Vec<ActivitySegment>, EngineError> {
        let tz = window.tz()?;
        let blocks = self.derive_location_segments(window, inputs)?;

        if blocks.is_empty() {
            if inputs.sessions.is_empty() && inputs.workouts.is_empty() && !inputs.sleeping {
                return Ok(Vec::new());
            }
            debug!("no location blocks; emitting whole-window segment");
            return Ok(vec![self.enrich_window_only(window, inputs, tz)]);
        }

        Ok(blocks
            .iter()
            .map(|block| self.enrich_block(block, window, inputs, tz))
            .collect())
    }

    fn enrich_block(
        &self,
        block: &LocationSegment,
        window: &SegmentWindow,
        inputs: &WindowInputs,
        tz: Tz,
    ) -> ActivitySegment {
        let usage = UsageAggregator::aggregate(
            &inputs.sessions,
            block.start,
            block.end,
            &self.options.category_overrides,
        );
        let session_count = inputs
            .sessions
            .iter()
            .filter(|s| s.start < block.end && s.end > block.start)
            .count();
        let has_workout = inputs
            .workouts
            .iter()
            .any(|w| w.start < block.end && w.end > block.start);

        let place = block
            .place_id
            .as_deref()
            .and_then(|id| inputs.places.iter().find(|p| p.id == id));
        let place_category = if block.is_commute() {
            Some(PlaceCategory::Commute)
        } else {
            place.map(|p| p.category)
        };

        let local_start = block.start.with_timezone(&tz);
        let label = ActivityClassifier::classify(&ClassifierInput {
            place_category,
            usage: &usage,
            local_hour: local_start.hour(),
            is_weekday: !matches!(local_start.weekday(), Weekday::Sat | Weekday::Sun),
            has_workout,
            is_sleeping: inputs.sleeping,
        });

        let match_ratio = block.meta.match_ratio.unwrap_or(0.0);
        let share = dominant_share(&usage);
        let confidence = score_confidence(&ConfidenceInput {
            sample_count: block.sample_count,
            match_ratio,
            session_count,
            dominant_share: share,
        });

        let screen_seconds = total_seconds(&usage);
        let mut top_apps: Vec<AppUsageSummary> = usage.clone();
        top_apps.truncate(5);

        ActivitySegment {
            id: format!("act-{}", block.source_id),
            user_id: window.user_id.clone(),
            started_at: block.start,
            ended_at: block.end,
            hour_bucket: hour_bucket(window.start),
            place_id: block.place_id.clone(),
            place_label: block.place_label.clone(),
            place_category,
            location_lat: Some(block.centroid_lat),
            location_lng: Some(block.centroid_lng),
            inferred_activity: label,
            activity_confidence: confidence,
            top_apps,
            total_screen_seconds: screen_seconds,
            evidence: SegmentEvidence {
                sample_count: block.sample_count,
                match_ratio,
                session_count,
                dominant_category: dominant_category(&usage),
                dominant_share: share,
                workout: has_workout,
                sleeping: inputs.sleeping,
                carried_forward: block.meta.carried_forward,
                engine_instance: self.instance_id.clone(),
            },
            source_ids: vec![block.source_id.clone()],
        }
    }

    /// Whole-window enrichment for windows with screen time or health
    /// evidence but no usable location data
    fn enrich_window_only(
        &self,
        window: &SegmentWindow,
        inputs: &WindowInputs,
        tz: Tz,
    ) -> ActivitySegment {
        let usage = UsageAggregator::aggregate(
            &inputs.sessions,
            window.start,
            window.end,
            &self.options.category_overrides,
        );
        let session_count = inputs.sessions.len();
        let has_workout = !inputs.workouts.is_empty();

        let local_start = window.start.with_timezone(&tz);
        let label = ActivityClassifier::classify(&ClassifierInput {
            place_category: None,
            usage: &usage,
            local_hour: local_start.hour(),
            is_weekday: !matches!(local_start.weekday(), Weekday::Sat | Weekday::Sun),
            has_workout,
            is_sleeping: inputs.sleeping,
        });

        let share = dominant_share(&usage);
        let confidence = score_confidence(&ConfidenceInput {
            sample_count: 0,
            match_ratio: 0.0,
            session_count,
            dominant_share: share,
        });

        let screen_seconds = total_seconds(&usage);
        let mut top_apps: Vec<AppUsageSummary> = usage.clone();
        top_apps.truncate(5);

        let source_id = format!("seg-{}-window", window.start.timestamp_millis());
        ActivitySegment {
            id: format!("act-{source_id}"),
            user_id: window.user_id.clone(),
            started_at: window.start,
            ended_at: window.end,
            hour_bucket: hour_bucket(window.start),
            place_id: None,
            place_label: None,
            place_category: None,
            location_lat: None,
            location_lng: None,
            inferred_activity: label,
            activity_confidence: confidence,
            top_apps,
            total_screen_seconds: screen_seconds,
            evidence: SegmentEvidence {
                sample_count: 0,
                match_ratio: 0.0,
                session_count,
                dominant_category: dominant_category(&usage),
                dominant_share: share,
                workout: has_workout,
                sleeping: inputs.sleeping,
                carried_forward: false,
                engine_instance: self.instance_id.clone(),
            },
            source_ids: vec![source_id],
        }
    }

    /// Infer places from multi-day history, consulting the per-user cache.
    ///
    /// The computation is expensive relative to per-hour processing, so the
    /// cached result holds until `force_refresh` or explicit invalidation.
    pub fn infer_places(
        &mut self,
        user_id: &str,
        rows: &[HourlyCellRow],
        timezone: &str,
        force_refresh: bool,
    ) -> Result<Vec<InferredPlace>, EngineError> {
        if !force_refresh {
            if let Some(cached) = self.inference_cache.get(user_id) {
                debug!("place inference cache hit for {user_id}");
                return Ok(cached.places.clone());
            }
        }
        let places = PlaceInferencer::infer(rows, timezone, &self.options.inference)?;
        self.inference_cache.insert(
            user_id.to_string(),
            CachedInference {
                places: places.clone(),
                computed_at: Utc::now(),
            },
        );
        Ok(places)
    }

    /// Drop the cached inference for one user
    pub fn invalidate_inference(&mut self, user_id: &str) {
        self.inference_cache.remove(user_id);
    }

    /// Drop every cached inference
    pub fn clear_inference_cache(&mut self) {
        self.inference_cache.clear();
    }

    /// When the cached inference for a user was computed, if any
    pub fn inference_cached_at(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.inference_cache.get(user_id).map(|c| c.computed_at)
    }
}

/// Deduplicated rounded-coordinate keys still needing an external name.
///
/// The external geocoder must be called at most once per key per pass; a
/// failed or empty lookup just leaves the name unresolved.
pub fn pending_lookup_keys(rows: &[HourlyCellRow]) -> Vec<String> {
    let mut keys: Vec<String> = rows
        .iter()
        .filter(|r| r.external_name.is_none() && r.existing_label.is_none())
        .map(|r| rounded_coord_key(r.latitude, r.longitude))
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn hour_bucket(start: DateTime<Utc>) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}",
        start.year(),
        start.month(),
        start.day(),
        start.hour()
    )
}

/// Candidate movement gaps around the covered spans: before the first,
/// between consecutive spans, and after the last, clipped to the window
fn window_gaps(
    window: &SegmentWindow,
    covered: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut gaps = Vec::new();
    if covered.is_empty() {
        gaps.push((window.start, window.end));
        return gaps;
    }
    if covered[0].0 > window.start {
        gaps.push((window.start, covered[0].0));
    }
    for pair in covered.windows(2) {
        if pair[1].0 > pair[0].1 {
            gaps.push((pair[0].1, pair[1].0));
        }
    }
    if let Some(last) = covered.last() {
        if window.end > last.1 {
            gaps.push((last.1, window.end));
        }
    }
    gaps
}
