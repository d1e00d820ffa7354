//! Segment merging
//!
//! Collapses adjacent segments at the same place separated by a small time
//! gap, tolerating GPS dropout. Merging runs before commute insertion and
//! never touches commute segments; it is idempotent.

use crate::segmentation::segment_confidence;
use crate::types::LocationSegment;

/// Default maximum gap bridged by a merge (milliseconds)
pub const DEFAULT_MERGE_GAP_MS: i64 = 5 * 60 * 1000;

/// Segment merger
pub struct SegmentMerger;

impl SegmentMerger {
    /// Merge adjacent same-place segments whose gap is within `max_gap_ms`.
    ///
    /// The merged segment keeps the first segment's id and recomputes
    /// confidence with a match ratio of 1.0, since both sides resolved to
    /// the same place. Output is sorted by start time.
    pub fn merge(segments: Vec<LocationSegment>, max_gap_ms: i64) -> Vec<LocationSegment> {
        let mut ordered = segments;
        ordered.sort_by_key(|s| s.start);

        let mut merged: Vec<LocationSegment> = Vec::with_capacity(ordered.len());
        for segment in ordered {
            let mergeable = match merged.last() {
                Some(last) => {
                    !last.is_commute()
                        && !segment.is_commute()
                        && last.place_id == segment.place_id
                        && (segment.start - last.end).num_milliseconds() <= max_gap_ms
                }
                None => false,
            };
            if !mergeable {
                merged.push(segment);
                continue;
            }

            let last = merged.last_mut().unwrap();
            let total = last.sample_count + segment.sample_count;
            // Sample-count weighted centroid keeps the mean exact
            if total > 0 {
                let w_last = last.sample_count as f64 / total as f64;
                let w_new = segment.sample_count as f64 / total as f64;
                last.centroid_lat = last.centroid_lat * w_last + segment.centroid_lat * w_new;
                last.centroid_lng = last.centroid_lng * w_last + segment.centroid_lng * w_new;
            }
            last.end = last.end.max(segment.end);
            last.sample_count = total;
            last.confidence = segment_confidence(total, 1.0);
            last.meta.match_ratio = Some(1.0);
            if segment.meta.travel_annotation.is_some() && last.meta.travel_annotation.is_none() {
                last.meta.travel_annotation = segment.meta.travel_annotation;
            }
        }

        merged
    }
}
