//! Geographic primitives: WGS84 coordinates and great-circle distances.
//!
//! Both distance helpers share [`EARTH_RADIUS_KM`], so a kilometre result and
//! a metre result for the same pair of points never disagree beyond the
//! factor of 1000.

use h3o::LatLng;
use serde::{Deserialize, Serialize};

/// Mean earth radius used by every distance calculation in the workspace.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a coordinate only if both components are finite and in range.
    pub fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        LatLng::new(latitude, longitude)
            .ok()
            .map(|_| Self::new(latitude, longitude))
    }

    /// Build a coordinate from optional wire fields; both must be present and valid.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Self::checked(lat, lng),
            _ => None,
        }
    }
}

/// Haversine distance in kilometres.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Haversine distance in metres.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    distance_km(a, b) * 1000.0
}
