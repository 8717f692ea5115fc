//! Live navigation state machine.
//!
//! ```text
//! IDLE --set_destination--> ROUTING --routes ready--> ACTIVE --within arrival--> ARRIVED
//!   ^                                                                              |
//!   +------------------------ clear_destination / dismiss_arrival ----------------+
//! ```
//!
//! Deviation is a flag on top of `ACTIVE`/`ARRIVED`, not a state of its own.
//! Arrival is sticky: once reached it stays set until dismissed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::NavigationError;
use crate::feed::PositionSample;
use crate::geo::{distance_meters, Coordinate};
use crate::scorer::{CandidateRoute, RouteBatch, RouteScorer};
use crate::zones::ZoneIndex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Off-route distance beyond which the user counts as deviated.
    pub deviation_threshold_m: f64,
    pub arrival_threshold_m: f64,
    pub walking_speed_mps: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            deviation_threshold_m: 60.0,
            arrival_threshold_m: 30.0,
            walking_speed_mps: 1.39,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavState {
    Idle,
    Routing,
    Active,
    Arrived,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destination {
    pub name: String,
    pub coordinate: Coordinate,
}

impl Destination {
    pub fn new(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            name: name.into(),
            coordinate,
        }
    }
}

/// Something the caller may want to render or escalate.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    RoutesReady { safest_id: String },
    Deviated { distance_to_route_m: f64 },
    BackOnRoute,
    Arrived { distance_remaining_m: f64 },
}

/// Point-in-time view of the session. Position-derived fields are `None`
/// while the live position is unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationStatus {
    pub state: NavState,
    pub destination: Option<Destination>,
    pub route_id: Option<String>,
    pub distance_remaining_m: Option<f64>,
    pub eta_minutes: Option<u32>,
    pub distance_to_route_m: Option<f64>,
    pub is_deviation: Option<bool>,
    pub has_arrived: Option<bool>,
}

/// Whole minutes to walk `distance_m`, never below one.
pub fn eta_minutes(distance_m: f64, walking_speed_mps: f64) -> u32 {
    let minutes = (distance_m / walking_speed_mps / 60.0).round();
    minutes.max(1.0) as u32
}

pub struct NavigationSession {
    config: NavigationConfig,
    scorer: RouteScorer,
    zones: ZoneIndex,
    state: NavState,
    destination: Option<Destination>,
    routes: Option<RouteBatch>,
    chosen: Option<String>,
    position: Option<Coordinate>,
    deviation: bool,
    arrived: bool,
}

impl NavigationSession {
    pub fn new(config: NavigationConfig, scorer: RouteScorer, zones: ZoneIndex) -> Self {
        Self {
            config,
            scorer,
            zones,
            state: NavState::Idle,
            destination: None,
            routes: None,
            chosen: None,
            position: None,
            deviation: false,
            arrived: false,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    pub fn routes(&self) -> Option<&RouteBatch> {
        self.routes.as_ref()
    }

    pub fn position(&self) -> Option<Coordinate> {
        self.position
    }

    /// The route being followed; the safest one unless the user chose another.
    pub fn chosen_route(&self) -> Option<&CandidateRoute> {
        let id = self.chosen.as_deref()?;
        self.routes.as_ref()?.get(id)
    }

    /// Starts navigating to `destination`, dropping any previous routes.
    ///
    /// Without a live position the session waits in `ROUTING` and generates
    /// routes on the next sample.
    pub fn set_destination(&mut self, destination: Destination) -> Vec<NavigationEvent> {
        self.discard();
        info!(name = %destination.name, "destination set");
        self.destination = Some(destination);
        self.transition(NavState::Routing);

        let mut events = Vec::new();
        self.route(&mut events);
        self.evaluate(&mut events);
        events
    }

    /// Feeds one live sample through the session.
    pub fn update(&mut self, sample: &PositionSample) -> Vec<NavigationEvent> {
        self.position = Some(sample.coordinate);

        let mut events = Vec::new();
        if self.state == NavState::Routing && self.routes.is_none() {
            self.route(&mut events);
        }
        self.evaluate(&mut events);
        events
    }

    /// The live position went away; derived values become unknown.
    pub fn position_lost(&mut self) {
        if self.position.take().is_some() {
            debug!("navigation position lost");
        }
    }

    /// Clears the deviation flag. The next off-route sample raises it again.
    pub fn acknowledge_deviation(&mut self) {
        self.deviation = false;
    }

    /// Rebuilds the route batch from the live position and latest zones.
    ///
    /// Does nothing when idle, after arrival, or without a live position.
    pub fn recalculate_routes(&mut self) -> Vec<NavigationEvent> {
        let mut events = Vec::new();
        if !matches!(self.state, NavState::Routing | NavState::Active) {
            return events;
        }
        if self.position.is_none() {
            debug!("recalculation deferred, no live position");
            return events;
        }

        self.deviation = false;
        self.route(&mut events);
        self.evaluate(&mut events);
        events
    }

    /// Follows a different route of the current batch.
    pub fn choose_route(&mut self, route_id: &str) -> Result<(), NavigationError> {
        let routes = self.routes.as_ref().ok_or(NavigationError::NoDestination)?;
        if routes.get(route_id).is_none() {
            return Err(NavigationError::UnknownRoute(route_id.to_string()));
        }
        self.chosen = Some(route_id.to_string());
        self.deviation = false;
        Ok(())
    }

    pub fn clear_destination(&mut self) {
        self.discard();
        self.transition(NavState::Idle);
    }

    pub fn dismiss_arrival(&mut self) {
        self.clear_destination();
    }

    pub fn status(&self) -> NavigationStatus {
        let live = self.position.zip(self.destination.as_ref());
        let distance_remaining_m = live.map(|(position, destination)| distance_meters(position, destination.coordinate));
        let route = self.chosen_route();
        let distance_to_route_m = self
            .position
            .zip(route)
            .and_then(|(position, route)| route.path.closest_distance_meters(position));

        NavigationStatus {
            state: self.state,
            destination: self.destination.clone(),
            route_id: route.map(|route| route.id.clone()),
            distance_remaining_m,
            eta_minutes: distance_remaining_m.map(|d| eta_minutes(d, self.config.walking_speed_mps)),
            distance_to_route_m,
            is_deviation: distance_to_route_m.map(|_| self.deviation),
            has_arrived: live.map(|_| self.arrived),
        }
    }

    fn route(&mut self, events: &mut Vec<NavigationEvent>) {
        let (Some(origin), Some(destination)) = (self.position, self.destination.as_ref()) else {
            return;
        };

        let snapshot = self.zones.snapshot();
        let batch = self.scorer.score(origin, destination.coordinate, &snapshot);
        let safest = batch.safest().map(|route| route.id.clone());
        self.routes = Some(batch);
        self.chosen = safest.clone();

        if let Some(safest_id) = safest {
            self.transition(NavState::Active);
            events.push(NavigationEvent::RoutesReady { safest_id });
        }
    }

    fn evaluate(&mut self, events: &mut Vec<NavigationEvent>) {
        if !matches!(self.state, NavState::Active | NavState::Arrived) {
            return;
        }
        let (Some(position), Some(destination)) = (self.position, self.destination.as_ref()) else {
            return;
        };
        let distance_remaining_m = distance_meters(position, destination.coordinate);

        if let Some(distance_to_route_m) = self
            .chosen_route()
            .and_then(|route| route.path.closest_distance_meters(position))
        {
            let off_route = distance_to_route_m > self.config.deviation_threshold_m;
            if off_route && !self.deviation {
                info!(distance_to_route_m, "route deviation");
                events.push(NavigationEvent::Deviated { distance_to_route_m });
            } else if !off_route && self.deviation {
                events.push(NavigationEvent::BackOnRoute);
            }
            self.deviation = off_route;
        }

        if !self.arrived && distance_remaining_m <= self.config.arrival_threshold_m {
            self.arrived = true;
            self.transition(NavState::Arrived);
            events.push(NavigationEvent::Arrived { distance_remaining_m });
        }
    }

    fn discard(&mut self) {
        self.destination = None;
        self.routes = None;
        self.chosen = None;
        self.deviation = false;
        self.arrived = false;
    }

    fn transition(&mut self, to: NavState) {
        if self.state != to {
            info!(from = ?self.state, ?to, "navigation state change");
            self.state = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::ZoneSnapshot;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn session() -> NavigationSession {
        NavigationSession::new(
            NavigationConfig::default(),
            RouteScorer::default(),
            ZoneIndex::new(ZoneSnapshot::default()),
        )
    }

    #[test]
    fn test_eta_minutes() {
        assert_eq!(eta_minutes(1000.0, 1.39), 12);
        assert_eq!(eta_minutes(10.0, 1.39), 1);
        assert_eq!(eta_minutes(0.0, 1.39), 1);
    }

    #[test]
    fn test_starts_idle_with_unknowns() {
        let session = session();
        let status = session.status();
        assert_eq!(status.state, NavState::Idle);
        assert_eq!(status.distance_remaining_m, None);
        assert_eq!(status.has_arrived, None);
        assert_eq!(status.is_deviation, None);
    }

    #[test]
    fn test_destination_without_position_stays_routing() {
        let mut session = session();
        let events = session.set_destination(Destination::new("Museum", coord(26.15, 91.745)));
        assert!(events.is_empty());
        assert_eq!(session.state(), NavState::Routing);
        assert!(session.routes().is_none());

        // Recalculation cannot help without a position either.
        assert!(session.recalculate_routes().is_empty());
        assert_eq!(session.state(), NavState::Routing);
    }

    #[test]
    fn test_choose_unknown_route() {
        let mut session = session();
        assert_eq!(session.choose_route("route-1"), Err(NavigationError::NoDestination));
    }
}
