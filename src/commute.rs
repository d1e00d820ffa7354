//! Commute detection
//!
//! Examines the gaps between (and around) location segments for movement.
//! Movement long enough becomes a standalone commute segment; short
//! movement becomes a travel annotation folded into the following segment.

use crate::geo::{centroid, path_distance};
use crate::places::match_key;
use crate::segmentation::segment_confidence;
use crate::types::{CommuteDetection, LocationSample, LocationSegment, SegmentMeta, UserPlace};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Minimum total path length for a gap to count as movement (meters)
pub const MOVEMENT_DISTANCE_M: f64 = 200.0;

/// Duration at which movement becomes a standalone commute segment
pub const LONG_COMMUTE_MS: i64 = 10 * 60 * 1000;

/// Maximum delay between a gap's end and the following segment's start for
/// a short-commute annotation to attach
pub const ANNOTATION_ATTACH_MS: i64 = 5 * 60 * 1000;

/// Commute detector over raw sample gaps
pub struct CommuteDetector;

impl CommuteDetector {
    /// Examine `[gap_start, gap_end)` of the raw stream for movement.
    ///
    /// A gap is movement when its samples match at least two distinct
    /// places (no-match counts as a distinct key) or the summed path
    /// length reaches 200 m. Anything else is a zero-value result.
    pub fn detect(
        samples: &[LocationSample],
        gap_start: DateTime<Utc>,
        gap_end: DateTime<Utc>,
        places: &[UserPlace],
    ) -> CommuteDetection {
        let mut gap_samples: Vec<LocationSample> = samples
            .iter()
            .filter(|s| s.recorded_at >= gap_start && s.recorded_at < gap_end)
            .copied()
            .collect();
        gap_samples.sort_by_key(|s| s.recorded_at);

        if gap_samples.is_empty() {
            return CommuteDetection::default();
        }

        let keys: Vec<Option<String>> =
            gap_samples.iter().map(|s| match_key(s, places)).collect();
        let distinct: HashSet<&Option<String>> = keys.iter().collect();
        let distance_meters = path_distance(&gap_samples);

        let is_movement = distinct.len() >= 2 || distance_meters >= MOVEMENT_DISTANCE_M;
        if !is_movement {
            return CommuteDetection::default();
        }

        let duration_ms = (gap_samples.last().unwrap().recorded_at
            - gap_samples.first().unwrap().recorded_at)
            .num_milliseconds();
        let is_long_commute = duration_ms >= LONG_COMMUTE_MS;

        // Origin and destination are the first and last matches anywhere in
        // the gap, not the group-dominant places
        let from_place = keys.iter().flatten().next().cloned();
        let to_place = keys.iter().flatten().next_back().cloned();

        let travel_annotation = if is_long_commute {
            None
        } else {
            let minutes = (duration_ms as f64 / 60_000.0).round() as i64;
            let destination = to_place
                .as_deref()
                .and_then(|id| places.iter().find(|p| p.id == id))
                .map(|p| p.label.clone())
                .unwrap_or_else(|| "destination".to_string());
            Some(format!("Traveled {minutes} min to {destination}"))
        };

        CommuteDetection {
            is_commute: true,
            duration_ms,
            is_long_commute,
            travel_annotation,
            from_place,
            to_place,
            distance_meters,
            samples: gap_samples,
        }
    }

    /// Promote a long-commute detection to its own segment.
    ///
    /// Commute segments never carry a place id; the destination lives in
    /// the meta instead.
    pub fn promote(
        detection: &CommuteDetection,
        window_start: DateTime<Utc>,
        places: &[UserPlace],
    ) -> Option<LocationSegment> {
        if !detection.is_long_commute {
            return None;
        }
        let first = detection.samples.first()?;
        let last = detection.samples.last()?;
        let (centroid_lat, centroid_lng) = centroid(&detection.samples)?;

        let mut meta = SegmentMeta::commute();
        meta.destination_place_id = detection.to_place.clone();
        meta.destination_place_label = detection
            .to_place
            .as_deref()
            .and_then(|id| places.iter().find(|p| p.id == id))
            .map(|p| p.label.clone());
        meta.distance_m = Some(detection.distance_meters);

        Some(LocationSegment {
            source_id: format!(
                "seg-{}-commute-{}",
                window_start.timestamp_millis(),
                first.recorded_at.timestamp_millis()
            ),
            start: first.recorded_at,
            end: last.recorded_at,
            place_id: None,
            place_label: None,
            centroid_lat,
            centroid_lng,
            sample_count: detection.samples.len(),
            confidence: segment_confidence(detection.samples.len(), 0.0),
            meta,
        })
    }

    /// Attach a short-commute annotation to the nearest following segment.
    ///
    /// Only segments starting within five minutes of the gap's end qualify;
    /// the closest one wins. When none qualifies the annotation is dropped.
    pub fn attach_annotation(
        segments: &mut [LocationSegment],
        gap_end: DateTime<Utc>,
        annotation: &str,
    ) -> bool {
        let target = segments
            .iter_mut()
            .filter(|s| {
                let delay = (s.start - gap_end).num_milliseconds();
                (0..=ANNOTATION_ATTACH_MS).contains(&delay)
            })
            .min_by_key(|s| (s.start - gap_end).num_milliseconds());
        match target {
            Some(segment) => {
                segment.meta.travel_annotation = Some(annotation.to_string());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::Segmenter;
    use crate::types::PlaceCategory;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn place(id: &str, lat: f64, lng: f64) -> UserPlace {
        UserPlace {
            id: id.to_string(),
            label: id.to_string(),
            category: PlaceCategory::Other,
            latitude: lat,
            longitude: lng,
            radius_meters: 150.0,
        }
    }

    fn sample_at_ms(base: DateTime<Utc>, offset_ms: i64, lat: f64, lng: f64) -> LocationSample {
        LocationSample {
            recorded_at: base + chrono::Duration::milliseconds(offset_ms),
            latitude: lat,
            longitude: lng,
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_no_samples_no_commute() {
        let result = CommuteDetector::detect(
            &[],
            base(),
            base() + chrono::Duration::minutes(10),
            &[],
        );
        assert!(!result.is_commute);
        assert_eq!(result.duration_ms, 0);
    }

    #[test]
    fn test_stationary_gap_is_not_movement() {
        // Same unmatched spot throughout: one distinct key, ~0 m path
        let samples: Vec<_> = (0..5)
            .map(|i| sample_at_ms(base(), i * 60_000, 51.6000, -0.1000))
            .collect();
        let result = CommuteDetector::detect(
            &samples,
            base(),
            base() + chrono::Duration::minutes(10),
            &[place("home", 51.5000, -0.1000)],
        );
        assert!(!result.is_commute);
    }

    #[test]
    fn test_path_distance_triggers_movement() {
        // No place matches anywhere, but the path walks ~450 m
        let samples: Vec<_> = (0..5)
            .map(|i| sample_at_ms(base(), i * 60_000, 51.6000 + i as f64 * 0.001, -0.1000))
            .collect();
        let result = CommuteDetector::detect(
            &samples,
            base(),
            base() + chrono::Duration::minutes(10),
            &[],
        );
        assert!(result.is_commute);
        assert!(result.distance_meters >= 200.0);
    }

    #[test]
    fn test_short_commute_boundary() {
        // Exactly 599,999 ms of movement: annotation only
        let home = place("home", 51.5000, -0.1000);
        let office = place("office", 51.5300, -0.1000);
        let samples = vec![
            sample_at_ms(base(), 0, 51.5001, -0.1000),
            sample_at_ms(base(), 599_999, 51.5299, -0.1000),
        ];
        let result = CommuteDetector::detect(
            &samples,
            base(),
            base() + chrono::Duration::minutes(12),
            &[home, office],
        );
        assert!(result.is_commute);
        assert!(!result.is_long_commute);
        assert_eq!(
            result.travel_annotation.as_deref(),
            Some("Traveled 10 min to office")
        );
    }

    #[test]
    fn test_long_commute_boundary() {
        // Exactly 600,000 ms: standalone segment
        let home = place("home", 51.5000, -0.1000);
        let office = place("office", 51.5300, -0.1000);
        let samples = vec![
            sample_at_ms(base(), 0, 51.5001, -0.1000),
            sample_at_ms(base(), 600_000, 51.5299, -0.1000),
        ];
        let result = CommuteDetector::detect(
            &samples,
            base(),
            base() + chrono::Duration::minutes(12),
            &[home.clone(), office.clone()],
        );
        assert!(result.is_long_commute);
        assert!(result.travel_annotation.is_none());
        assert_eq!(result.from_place.as_deref(), Some("home"));
        assert_eq!(result.to_place.as_deref(), Some("office"));

        let segment =
            CommuteDetector::promote(&result, base(), &[home, office]).unwrap();
        assert_eq!(segment.place_id, None);
        assert_eq!(segment.meta.intent.as_deref(), Some("commute"));
        assert_eq!(segment.meta.destination_place_id.as_deref(), Some("office"));
        assert!(segment.meta.distance_m.unwrap() > 2_000.0);
    }

    #[test]
    fn test_annotation_attaches_to_nearest_following_segment() {
        let places = vec![place("office", 51.5300, -0.1000)];
        let window_start = base() + chrono::Duration::minutes(15);
        let window_end = window_start + chrono::Duration::hours(1);
        let samples: Vec<_> = (0..10)
            .map(|i| {
                sample_at_ms(window_start, (i + 2) * 60_000, 51.5301, -0.1000)
            })
            .collect();
        let mut segments = Segmenter::segment(&samples, &places, window_start, window_end);
        assert_eq!(segments.len(), 1);

        // Gap ends one minute before the segment starts
        let gap_end = window_start + chrono::Duration::minutes(1);
        let attached =
            CommuteDetector::attach_annotation(&mut segments, gap_end, "Traveled 8 min to office");
        assert!(attached);
        assert_eq!(
            segments[0].meta.travel_annotation.as_deref(),
            Some("Traveled 8 min to office")
        );
    }

    #[test]
    fn test_annotation_dropped_when_no_segment_follows() {
        let mut segments: Vec<LocationSegment> = Vec::new();
        let attached =
            CommuteDetector::attach_annotation(&mut segments, base(), "Traveled 3 min to home");
        assert!(!attached);
    }
}
