//! Real Guwahati locations for realistic test fixtures.
//!
//! Landmark coordinates are approximate (to ~50 m) and only used where exact
//! geometry does not matter. The corridor constants are exact.

#![allow(dead_code)]

use safenav::geo::Coordinate;
use safenav::zones::{AssetKind, ResponseAsset, RiskLevel, RiskZone};

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng).unwrap()
    }
}

pub fn coord(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).unwrap()
}

/// Meters to degrees of latitude on the haversine sphere.
pub fn meters_to_lat(meters: f64) -> f64 {
    (meters / 6_371_000.0_f64).to_degrees()
}

/// Meters to degrees of longitude at `lat`.
pub fn meters_to_lng(meters: f64, lat: f64) -> f64 {
    meters_to_lat(meters) / lat.to_radians().cos()
}

// ============================================================================
// Landmarks
// ============================================================================

pub const LANDMARKS: &[Location] = &[
    Location::new("Kamakhya Temple", 26.1664, 91.7055),
    Location::new("Fancy Bazaar", 26.1817, 91.7432),
    Location::new("Paltan Bazaar", 26.1794, 91.7519),
    Location::new("Assam State Museum", 26.1862, 91.7489),
    Location::new("Uzan Bazaar Ghat", 26.1912, 91.7584),
    Location::new("Dispur", 26.1433, 91.7898),
];

// ============================================================================
// Response assets
// ============================================================================

pub const POLICE_STATIONS: &[Location] = &[
    Location::new("Panbazar Police Station", 26.1860, 91.7420),
    Location::new("Paltan Bazaar Police Station", 26.1780, 91.7530),
    Location::new("Dispur Police Station", 26.1390, 91.7920),
];

pub const HOSPITALS: &[Location] = &[
    Location::new("Gauhati Medical College Hospital", 26.1569, 91.7670),
    Location::new("Dispur Hospital", 26.1380, 91.7960),
];

pub fn police_assets() -> Vec<ResponseAsset> {
    POLICE_STATIONS
        .iter()
        .enumerate()
        .map(|(idx, loc)| {
            ResponseAsset::new(format!("ps-{}", idx), loc.name, AssetKind::Police, loc.coordinate(), "100")
        })
        .collect()
}

pub fn hospital_assets() -> Vec<ResponseAsset> {
    HOSPITALS
        .iter()
        .enumerate()
        .map(|(idx, loc)| {
            ResponseAsset::new(format!("h-{}", idx), loc.name, AssetKind::Hospital, loc.coordinate(), "108")
                .with_emergency(true)
        })
        .collect()
}

// ============================================================================
// Northbound corridor (exact geometry)
// ============================================================================
//
// ~1000 m due north. The direct path samples every ~33 m, so a 100 m zone
// centred on the midpoint catches exactly five of its points, while the bowed
// paths pass ~130 m to either side.

pub const CORRIDOR_START: Location = Location::new("Corridor start", 26.1400, 91.7300);
pub const CORRIDOR_END: Location = Location::new("Corridor end", 26.1490, 91.7300);
pub const CORRIDOR_MID: Location = Location::new("Corridor midpoint", 26.1445, 91.7300);

pub fn corridor_hotspot(level: RiskLevel) -> RiskZone {
    RiskZone::new("hotspot", "Corridor hotspot", CORRIDOR_MID.coordinate(), 100.0, level).unwrap()
}

/// A point `meters` due south of the corridor end.
pub fn south_of_end(meters: f64) -> Coordinate {
    coord(CORRIDOR_END.lat - meters_to_lat(meters), CORRIDOR_END.lng)
}

/// A point `meters` due east of the corridor midpoint.
pub fn east_of_mid(meters: f64) -> Coordinate {
    coord(CORRIDOR_MID.lat, CORRIDOR_MID.lng + meters_to_lng(meters, CORRIDOR_MID.lat))
}
