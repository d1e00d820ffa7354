//! Gap filling
//!
//! Carries the last stable location forward across silent (no-GPS)
//! stationary gaps: when two blocks at the same resolved place flank a gap
//! with no samples in it and no travel on either side, a synthesized block
//! bridges the gap. Movement always terminates carry-forward.

use crate::types::{LocationSample, LocationSegment, SegmentMeta};

/// Gap filler over a finalized, time-ordered block sequence
pub struct GapFiller;

impl GapFiller {
    /// Fill silent same-place gaps longer than `min_gap_ms`.
    ///
    /// Gaps at or below `min_gap_ms` are the merger's job and are left
    /// alone. Synthesized blocks are tagged `carried_forward` so a renderer
    /// can draw them distinctly, and their confidence is discounted below
    /// the flanking block's.
    pub fn fill(
        segments: Vec<LocationSegment>,
        samples: &[LocationSample],
        min_gap_ms: i64,
    ) -> Vec<LocationSegment> {
        let mut ordered = segments;
        ordered.sort_by_key(|s| s.start);

        let mut filled: Vec<LocationSegment> = Vec::with_capacity(ordered.len());
        for (i, segment) in ordered.iter().enumerate() {
            if i > 0 {
                let prev = &ordered[i - 1];
                if let Some(block) = carry_forward(prev, segment, samples, min_gap_ms) {
                    filled.push(block);
                }
            }
            filled.push(segment.clone());
        }
        filled
    }
}

fn carry_forward(
    prev: &LocationSegment,
    next: &LocationSegment,
    samples: &[LocationSample],
    min_gap_ms: i64,
) -> Option<LocationSegment> {
    if prev.is_commute() || next.is_commute() {
        return None;
    }
    if prev.place_id.is_none() || prev.place_id != next.place_id {
        return None;
    }
    let gap_ms = (next.start - prev.end).num_milliseconds();
    if gap_ms <= min_gap_ms {
        return None;
    }
    let silent = !samples
        .iter()
        .any(|s| s.recorded_at >= prev.end && s.recorded_at < next.start);
    if !silent {
        return None;
    }

    let place_key = prev.place_id.as_deref().unwrap_or("unknown");
    let mut meta = SegmentMeta::location_block();
    meta.carried_forward = true;

    Some(LocationSegment {
        source_id: format!(
            "seg-carry-{}-{}",
            place_key,
            prev.end.timestamp_millis()
        ),
        start: prev.end,
        end: next.start,
        place_id: prev.place_id.clone(),
        place_label: prev.place_label.clone(),
        centroid_lat: prev.centroid_lat,
        centroid_lng: prev.centroid_lng,
        sample_count: 0,
        confidence: (prev.confidence * 0.8).clamp(0.0, 1.0),
        meta,
    })
}
