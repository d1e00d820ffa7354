//! Geometry utilities
//!
//! Pure math shared by the segmentation, commute, and inference stages:
//! haversine distance, centroid averaging, and the fixed-precision spatial
//! cell key used to cluster historical observations.

use crate::types::LocationSample;
use geo::{Distance, Haversine, Point};

/// Geohash cell precision used for historical clustering (~150 m cells)
pub const CELL_PRECISION: usize = 7;

/// Decimal places for the deduplicated external-lookup coordinate key
pub const LOOKUP_KEY_DECIMALS: u32 = 3;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Great-circle distance between two coordinates in meters
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let p1 = Point::new(lng1, lat1);
    let p2 = Point::new(lng2, lat2);
    Haversine::distance(p1, p2)
}

/// Total path length over consecutive samples in meters.
///
/// Fewer than two samples is a zero-length path.
pub fn path_distance(samples: &[LocationSample]) -> f64 {
    samples
        .windows(2)
        .map(|w| haversine_distance(w[0].latitude, w[0].longitude, w[1].latitude, w[1].longitude))
        .sum()
}

/// Arithmetic-mean centroid of a set of samples, `None` when empty
pub fn centroid(samples: &[LocationSample]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let lat = samples.iter().map(|s| s.latitude).sum::<f64>() / n;
    let lng = samples.iter().map(|s| s.longitude).sum::<f64>() / n;
    Some((lat, lng))
}

/// Running centroid average, used by the per-cell cluster fold
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningCentroid {
    lat_sum: f64,
    lng_sum: f64,
    count: u32,
}

impl RunningCentroid {
    pub fn push(&mut self, lat: f64, lng: f64) {
        self.lat_sum += lat;
        self.lng_sum += lng;
        self.count += 1;
    }

    pub fn value(&self) -> Option<(f64, f64)> {
        if self.count == 0 {
            None
        } else {
            Some((self.lat_sum / self.count as f64, self.lng_sum / self.count as f64))
        }
    }
}

/// Encode a coordinate into a geohash cell key of the given precision.
///
/// Standard base32 geohash with interleaved longitude/latitude bits;
/// precision 7 gives roughly 150 m cells.
pub fn cell_key(lat: f64, lng: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut bits = 0u8;
    let mut bit_count = 0u8;
    let mut even_bit = true;

    while hash.len() < precision {
        if even_bit {
            let mid = (lng_range.0 + lng_range.1) / 2.0;
            bits <<= 1;
            if lng >= mid {
                bits |= 1;
                lng_range.0 = mid;
            } else {
                lng_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            bits <<= 1;
            if lat >= mid {
                bits |= 1;
                lat_range.0 = mid;
            } else {
                lat_range.1 = mid;
            }
        }
        even_bit = !even_bit;
        bit_count += 1;
        if bit_count == 5 {
            hash.push(BASE32[bits as usize] as char);
            bits = 0;
            bit_count = 0;
        }
    }

    hash
}

/// Rounded coordinate key for deduplicating external name lookups.
///
/// Three decimal places (~110 m) so nearby cells collapse into one lookup.
pub fn rounded_coord_key(lat: f64, lng: f64) -> String {
    let factor = 10f64.powi(LOOKUP_KEY_DECIMALS as i32);
    let rlat = (lat * factor).round() / factor;
    let rlng = (lng * factor).round() / factor;
    format!("{rlat:.3},{rlng:.3}")
}
