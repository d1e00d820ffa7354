//! Place matching
//!
//! Matches a coordinate against the user's place set: the nearest place
//! whose haversine distance is within its radius wins, ties broken by
//! minimum distance.

use crate::geo::haversine_distance;
use crate::types::{LocationSample, UserPlace};

/// A successful match of a sample to a user place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceMatch<'a> {
    pub place: &'a UserPlace,
    pub distance_m: f64,
}

/// Find the nearest place within radius for a coordinate, if any
pub fn match_coordinate<'a>(
    lat: f64,
    lng: f64,
    places: &'a [UserPlace],
) -> Option<PlaceMatch<'a>> {
    let mut best: Option<PlaceMatch<'a>> = None;
    for place in places {
        let distance_m = haversine_distance(lat, lng, place.latitude, place.longitude);
        if distance_m > place.radius_meters {
            continue;
        }
        match &best {
            Some(current) if current.distance_m <= distance_m => {}
            _ => best = Some(PlaceMatch { place, distance_m }),
        }
    }
    best
}

/// Match a sample against the place set
pub fn match_sample<'a>(
    sample: &LocationSample,
    places: &'a [UserPlace],
) -> Option<PlaceMatch<'a>> {
    match_coordinate(sample.latitude, sample.longitude, places)
}

/// The match key for a sample: the matched place id, or `None` for no match.
///
/// Both the grouping pass and the consensus pass use this same function, so
/// any divergence between them is purely the group-level threshold.
pub fn match_key(sample: &LocationSample, places: &[UserPlace]) -> Option<String> {
    match_sample(sample, places).map(|m| m.place.id.clone())
}
