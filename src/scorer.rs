//! Candidate route generation and safety scoring.
//!
//! Routes are geometric approximations: a direct line and two paths bowed to
//! either side of it. Each is sampled point by point against the zone snapshot
//! and scored on risk exposure, offset by nearby response assets.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::{contains_point, interpolate, Coordinate};
use crate::polyline::Polyline;
use crate::zones::{RiskLevel, ZoneSnapshot};

/// Weights and constants for route generation and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base_score: i64,
    /// Points lost per sampled point inside a HIGH zone.
    pub high_risk_penalty: i64,
    pub medium_risk_penalty: i64,
    pub low_risk_penalty: i64,
    /// Points gained per sampled point near an available response asset.
    pub asset_bonus: i64,
    pub asset_proximity_m: f64,
    /// Interpolation steps for the direct route; bowed legs use half each.
    pub interpolation_steps: usize,
    /// Bow offset as a fraction of the larger lat/lng span.
    pub bow_offset_ratio: f64,
    pub walking_speed_mps: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 100,
            high_risk_penalty: 30,
            medium_risk_penalty: 15,
            low_risk_penalty: 5,
            asset_bonus: 10,
            asset_proximity_m: 500.0,
            interpolation_steps: 30,
            bow_offset_ratio: 0.15,
            walking_speed_mps: 1.39,
        }
    }
}

/// How a candidate path was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteShape {
    Direct,
    /// Bowed to the left of the direction of travel.
    BowedLeft,
    BowedRight,
}

/// Per-severity count of sampled points inside zones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskTally {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRoute {
    pub id: String,
    pub shape: RouteShape,
    pub path: Polyline,
    pub distance_m: f64,
    pub duration_s: u64,
    /// 0 to 100, higher is safer.
    pub safety_score: u32,
    pub intersections: RiskTally,
    pub assets_nearby: u32,
    pub is_safest: bool,
    pub is_fastest: bool,
}

/// The three scored candidates for one origin/destination pair.
///
/// Replaced as a whole on recalculation, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteBatch {
    routes: Vec<CandidateRoute>,
}

impl RouteBatch {
    pub fn routes(&self) -> &[CandidateRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn safest(&self) -> Option<&CandidateRoute> {
        self.routes.iter().find(|route| route.is_safest)
    }

    pub fn fastest(&self) -> Option<&CandidateRoute> {
        self.routes.iter().find(|route| route.is_fastest)
    }

    pub fn get(&self, id: &str) -> Option<&CandidateRoute> {
        self.routes.iter().find(|route| route.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteScorer {
    config: ScoringConfig,
}

impl RouteScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Generates and scores the three candidates from `origin` to `destination`.
    ///
    /// Deterministic for a given snapshot and endpoints.
    pub fn score(&self, origin: Coordinate, destination: Coordinate, snapshot: &ZoneSnapshot) -> RouteBatch {
        let candidates = self.candidate_paths(origin, destination);

        let mut routes: Vec<CandidateRoute> = candidates
            .into_par_iter()
            .enumerate()
            .map(|(idx, (shape, path))| self.score_path(idx, shape, path, snapshot))
            .collect();

        mark_best(&mut routes);

        for route in &routes {
            debug!(
                id = %route.id,
                score = route.safety_score,
                distance_m = route.distance_m,
                safest = route.is_safest,
                fastest = route.is_fastest,
                "scored candidate route"
            );
        }

        RouteBatch { routes }
    }

    fn candidate_paths(&self, origin: Coordinate, destination: Coordinate) -> Vec<(RouteShape, Polyline)> {
        let steps = self.config.interpolation_steps.max(2);
        let leg_steps = steps / 2;

        let mid_lat = (origin.lat() + destination.lat()) / 2.0;
        let mid_lng = (origin.lng() + destination.lng()) / 2.0;
        let d_lat = destination.lat() - origin.lat();
        let d_lng = destination.lng() - origin.lng();
        let offset = d_lat.abs().max(d_lng.abs()) * self.config.bow_offset_ratio;

        // Unit normal to the travel vector; left of travel when lat is "up".
        let norm = d_lat.hypot(d_lng);
        let (n_lat, n_lng) = if norm > 0.0 {
            (d_lng / norm, -d_lat / norm)
        } else {
            (0.0, 0.0)
        };

        let left = Coordinate::derived(mid_lat + n_lat * offset, mid_lng + n_lng * offset);
        let right = Coordinate::derived(mid_lat - n_lat * offset, mid_lng - n_lng * offset);

        vec![
            (RouteShape::Direct, Polyline::new(interpolate(origin, destination, steps))),
            (RouteShape::BowedLeft, bowed(origin, left, destination, leg_steps)),
            (RouteShape::BowedRight, bowed(origin, right, destination, leg_steps)),
        ]
    }

    fn score_path(&self, idx: usize, shape: RouteShape, path: Polyline, snapshot: &ZoneSnapshot) -> CandidateRoute {
        let mut intersections = RiskTally::default();
        let mut assets_nearby = 0u32;

        for &point in path.points() {
            for zone in snapshot.active_zones() {
                if zone.contains(point) {
                    match zone.level() {
                        RiskLevel::High => intersections.high += 1,
                        RiskLevel::Medium => intersections.medium += 1,
                        RiskLevel::Low => intersections.low += 1,
                    }
                }
            }

            let near_asset = snapshot
                .assets()
                .iter()
                .filter(|asset| asset.is_available())
                .any(|asset| contains_point(asset.position(), self.config.asset_proximity_m, point));
            if near_asset {
                assets_nearby += 1;
            }
        }

        let distance_m = path.length_meters();
        let duration_s = (distance_m / self.config.walking_speed_mps).round() as u64;

        CandidateRoute {
            id: format!("route-{}", idx),
            shape,
            path,
            distance_m,
            duration_s,
            safety_score: self.safety_score(&intersections, assets_nearby),
            intersections,
            assets_nearby,
            is_safest: false,
            is_fastest: false,
        }
    }

    fn safety_score(&self, intersections: &RiskTally, assets_nearby: u32) -> u32 {
        let config = &self.config;
        // Weights are caller-supplied and may be arbitrarily large.
        let raw = config
            .base_score
            .saturating_sub(i64::from(intersections.high).saturating_mul(config.high_risk_penalty))
            .saturating_sub(i64::from(intersections.medium).saturating_mul(config.medium_risk_penalty))
            .saturating_sub(i64::from(intersections.low).saturating_mul(config.low_risk_penalty))
            .saturating_add(i64::from(assets_nearby).saturating_mul(config.asset_bonus));

        raw.clamp(0, 100) as u32
    }
}

/// Two legs through `waypoint`, with the shared waypoint sampled once.
fn bowed(origin: Coordinate, waypoint: Coordinate, destination: Coordinate, leg_steps: usize) -> Polyline {
    let mut points = interpolate(origin, waypoint, leg_steps);
    points.extend(interpolate(waypoint, destination, leg_steps).into_iter().skip(1));
    Polyline::new(points)
}

/// Flags the highest score as safest and the shortest as fastest; the first
/// route in generation order wins ties.
fn mark_best(routes: &mut [CandidateRoute]) {
    let mut safest: Option<usize> = None;
    let mut fastest: Option<usize> = None;

    for (idx, route) in routes.iter().enumerate() {
        if safest.is_none_or(|best| route.safety_score > routes[best].safety_score) {
            safest = Some(idx);
        }
        if fastest.is_none_or(|best| route.distance_m < routes[best].distance_m) {
            fastest = Some(idx);
        }
    }

    if let Some(idx) = safest {
        routes[idx].is_safest = true;
    }
    if let Some(idx) = fastest {
        routes[idx].is_fastest = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::{AssetKind, ResponseAsset, RiskZone};

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn origin() -> Coordinate {
        coord(26.1445, 91.7362)
    }

    fn destination() -> Coordinate {
        coord(26.1500, 91.7450)
    }

    #[test]
    fn test_three_routes_share_endpoints() {
        let batch = RouteScorer::default().score(origin(), destination(), &ZoneSnapshot::default());
        assert_eq!(batch.len(), 3);
        for route in batch.routes() {
            assert_eq!(route.path.points().first(), Some(&origin()));
            assert_eq!(route.path.points().last(), Some(&destination()));
            assert_eq!(route.path.len(), 31);
        }
    }

    #[test]
    fn test_empty_snapshot_scores_base() {
        let batch = RouteScorer::default().score(origin(), destination(), &ZoneSnapshot::default());
        for route in batch.routes() {
            assert_eq!(route.safety_score, 100);
            assert_eq!(route.intersections, RiskTally::default());
        }
        // All tie on score, so the first generated route is safest.
        assert_eq!(batch.safest().map(|r| r.id.as_str()), Some("route-0"));
        // The straight line is the shortest.
        assert_eq!(batch.fastest().map(|r| r.shape), Some(RouteShape::Direct));
    }

    #[test]
    fn test_bows_are_on_opposite_sides() {
        let scorer = RouteScorer::default();
        let paths = scorer.candidate_paths(origin(), destination());
        let left_mid = paths[1].1.points()[15];
        let right_mid = paths[2].1.points()[15];
        let direct_mid = paths[0].1.points()[15];

        assert!(left_mid.lat() > direct_mid.lat());
        assert!(right_mid.lat() < direct_mid.lat());
        assert!((left_mid.lat() - direct_mid.lat() + right_mid.lat() - direct_mid.lat()).abs() < 1e-12);
    }

    #[test]
    fn test_score_clamps_to_zero() {
        let zone = RiskZone::new("z", "Everywhere", origin(), 50_000.0, RiskLevel::High).unwrap();
        let snapshot = ZoneSnapshot::new(vec![zone], vec![]);
        let batch = RouteScorer::default().score(origin(), destination(), &snapshot);
        for route in batch.routes() {
            assert_eq!(route.safety_score, 0);
            assert_eq!(route.intersections.high, 31);
        }
    }

    #[test]
    fn test_overlapping_zones_count_per_zone() {
        let a = RiskZone::new("a", "A", origin(), 50_000.0, RiskLevel::Low).unwrap();
        let b = RiskZone::new("b", "B", origin(), 50_000.0, RiskLevel::Low).unwrap();
        let snapshot = ZoneSnapshot::new(vec![a, b], vec![]);
        let batch = RouteScorer::default().score(origin(), destination(), &snapshot);
        assert_eq!(batch.routes()[0].intersections.low, 62);
    }

    #[test]
    fn test_inactive_zones_ignored() {
        let zone = RiskZone::new("z", "Closed", origin(), 50_000.0, RiskLevel::High)
            .unwrap()
            .with_active(false);
        let snapshot = ZoneSnapshot::new(vec![zone], vec![]);
        let batch = RouteScorer::default().score(origin(), destination(), &snapshot);
        assert!(batch.routes().iter().all(|r| r.safety_score == 100));
    }

    #[test]
    fn test_asset_bonus_offsets_penalty() {
        let zone = RiskZone::new("z", "Market", origin(), 50_000.0, RiskLevel::Low).unwrap();
        let station = ResponseAsset::new("p", "Station", AssetKind::Police, origin(), "100");
        let config = ScoringConfig {
            asset_bonus: 5,
            asset_proximity_m: 50_000.0,
            ..ScoringConfig::default()
        };
        let snapshot = ZoneSnapshot::new(vec![zone], vec![station]);
        let batch = RouteScorer::new(config).score(origin(), destination(), &snapshot);
        let direct = &batch.routes()[0];
        assert_eq!(direct.assets_nearby, 31);
        assert_eq!(direct.safety_score, 100);
    }

    #[test]
    fn test_unavailable_assets_give_no_bonus() {
        let station = ResponseAsset::new("p", "Closed", AssetKind::Police, origin(), "100").with_available(false);
        let snapshot = ZoneSnapshot::new(vec![], vec![station]);
        let batch = RouteScorer::default().score(origin(), destination(), &snapshot);
        assert_eq!(batch.routes()[0].assets_nearby, 0);
    }

    #[test]
    fn test_duration_uses_walking_speed() {
        let batch = RouteScorer::default().score(origin(), destination(), &ZoneSnapshot::default());
        let direct = &batch.routes()[0];
        let expected = (direct.distance_m / 1.39).round() as u64;
        assert_eq!(direct.duration_s, expected);
    }

    #[test]
    fn test_same_endpoints_do_not_panic() {
        let batch = RouteScorer::default().score(origin(), origin(), &ZoneSnapshot::default());
        assert_eq!(batch.len(), 3);
        assert!(batch.routes().iter().all(|r| r.distance_m == 0.0));
        assert_eq!(batch.fastest().map(|r| r.id.as_str()), Some("route-0"));
    }

    #[test]
    fn test_extreme_weights_saturate() {
        let tally = RiskTally {
            high: 5,
            medium: 5,
            low: 5,
        };

        let harsh = RouteScorer::new(ScoringConfig {
            high_risk_penalty: i64::MAX,
            medium_risk_penalty: i64::MAX,
            ..ScoringConfig::default()
        });
        assert_eq!(harsh.safety_score(&tally, 0), 0);

        let generous = RouteScorer::new(ScoringConfig {
            asset_bonus: i64::MAX,
            ..ScoringConfig::default()
        });
        assert_eq!(generous.safety_score(&tally, 30), 100);

        let config: ScoringConfig = serde_json::from_str(r#"{"high_risk_penalty": 9223372036854775807}"#).unwrap();
        let batch = RouteScorer::new(config).score(origin(), destination(), &ZoneSnapshot::default());
        assert!(batch.routes().iter().all(|r| r.safety_score == 100));
    }
}
