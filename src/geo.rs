//! Great-circle geometry on a spherical Earth.
//!
//! Distances use the haversine formula. Interpolation is linear in lat/lng
//! space, which is a fine approximation at city scale but not near the poles
//! or across very long spans.

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS-84 latitude/longitude pair in degrees.
///
/// Both components are guaranteed finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GeoError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(GeoError::NonFiniteCoordinate { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Builds a coordinate from arithmetic on already-validated coordinates.
    pub(crate) fn derived(lat: f64, lng: f64) -> Self {
        debug_assert!(lat.is_finite() && lng.is_finite());
        Self { lat, lng }
    }
}

/// Haversine distance between two coordinates in meters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from `a` towards `b`, in degrees `[0, 360)`.
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let y = delta_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// True when `point` lies inside or on the circle around `center`.
pub fn contains_point(center: Coordinate, radius_m: f64, point: Coordinate) -> bool {
    distance_meters(center, point) <= radius_m
}

/// `steps + 1` evenly spaced points from `a` to `b`, both ends included.
///
/// Zero steps yields just `a`.
pub fn interpolate(a: Coordinate, b: Coordinate, steps: usize) -> Vec<Coordinate> {
    if steps == 0 {
        return vec![a];
    }

    (0..=steps)
        .map(|i| {
            // Pin the far end so rounding never moves it.
            if i == steps {
                return b;
            }
            let t = i as f64 / steps as f64;
            Coordinate::derived(a.lat + (b.lat - a.lat) * t, a.lng + (b.lng - a.lng) * t)
        })
        .collect()
}
