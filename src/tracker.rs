//! Ties the feed output to zones, nearby help and navigation.
//!
//! A [`Tracker`] is driven with each [`FeedUpdate`] and answers with one
//! [`TrackingUpdate`] describing everything that changed for the user.

use tracing::{info, warn};

use crate::error::{NavigationError, SosError};
use crate::feed::{FeedUpdate, PositionSample};
use crate::format::{format_eta, TravelMode};
use crate::geo::Coordinate;
use crate::navigation::{Destination, NavigationConfig, NavigationEvent, NavigationSession, NavigationStatus};
use crate::scorer::{RouteBatch, RouteScorer};
use crate::traits::{SosReceipt, SosSink};
use crate::zones::{AssetKind, ResponseAsset, RiskZone, ZoneIndex, ZoneTracker, ZoneTransition};

/// A police station or hospital close to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyAsset {
    pub asset: ResponseAsset,
    pub distance_m: f64,
    pub eta_label: String,
}

/// Everything one feed update changed for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingUpdate {
    pub position: Option<PositionSample>,
    /// Zones containing the position under the current view.
    pub zones: Vec<RiskZone>,
    pub transitions: Vec<ZoneTransition>,
    pub nearest_police: Option<NearbyAsset>,
    pub nearest_hospital: Option<NearbyAsset>,
    pub navigation: NavigationStatus,
    pub events: Vec<NavigationEvent>,
}

/// Owns the zone tracker and navigation session for one user.
pub struct Tracker {
    zones: ZoneIndex,
    zone_tracker: ZoneTracker,
    session: NavigationSession,
    position: Option<PositionSample>,
}

impl Tracker {
    /// A tracker with no position and an idle session over `zones`.
    pub fn new(zones: ZoneIndex, scorer: RouteScorer, navigation: NavigationConfig) -> Self {
        let session = NavigationSession::new(navigation, scorer, zones.clone());
        Self {
            zones,
            zone_tracker: ZoneTracker::new(),
            session,
            position: None,
        }
    }

    /// The shared zone index; view changes apply to later updates.
    pub fn zones(&self) -> &ZoneIndex {
        &self.zones
    }

    /// The navigation session driven by this tracker.
    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    /// Last accepted position, cleared when the feed goes unavailable.
    pub fn best_known_position(&self) -> Option<Coordinate> {
        self.position.as_ref().map(|sample| sample.coordinate)
    }

    /// Feeds one update through zones, nearby help and navigation.
    pub fn apply(&mut self, update: &FeedUpdate) -> TrackingUpdate {
        match update {
            FeedUpdate::Position(sample) => {
                self.position = Some(sample.clone());
                let events = self.session.update(sample);
                self.snapshot_for(Some(sample.coordinate), events)
            }
            FeedUpdate::Rejected(_) => {
                // Keep whatever we had; a bad fix says nothing about where we are.
                let position = self.best_known_position();
                self.snapshot_for(position, Vec::new())
            }
            FeedUpdate::Unavailable(_) => {
                self.position = None;
                self.session.position_lost();
                self.zone_tracker.reset();
                self.snapshot_for(None, Vec::new())
            }
        }
    }

    /// See [`NavigationSession::set_destination`].
    pub fn set_destination(&mut self, destination: Destination) -> Vec<NavigationEvent> {
        self.session.set_destination(destination)
    }

    /// See [`NavigationSession::recalculate_routes`].
    pub fn recalculate_routes(&mut self) -> Vec<NavigationEvent> {
        self.session.recalculate_routes()
    }

    /// See [`NavigationSession::choose_route`].
    pub fn choose_route(&mut self, route_id: &str) -> Result<(), NavigationError> {
        self.session.choose_route(route_id)
    }

    /// See [`NavigationSession::acknowledge_deviation`].
    pub fn acknowledge_deviation(&mut self) {
        self.session.acknowledge_deviation();
    }

    /// See [`NavigationSession::clear_destination`].
    pub fn clear_destination(&mut self) {
        self.session.clear_destination();
    }

    /// See [`NavigationSession::dismiss_arrival`].
    pub fn dismiss_arrival(&mut self) {
        self.session.dismiss_arrival();
    }

    /// Routes to draw, or `None` when the routes layer is hidden.
    pub fn visible_routes(&self) -> Option<&RouteBatch> {
        if !self.zones.view().layers.routes {
            return None;
        }
        self.session.routes()
    }

    /// Posts the best-known position to the SOS endpoint.
    pub fn send_sos<S: SosSink + ?Sized>(&self, sink: &S, session_id: &str) -> Result<SosReceipt, SosError> {
        let position = self.best_known_position().ok_or(NavigationError::PositionUnknown)?;
        info!(lat = position.lat(), lng = position.lng(), "sending SOS");
        let receipt = sink.post_sos(session_id, position).inspect_err(|err| {
            warn!(error = %err, "SOS post failed");
        })?;
        Ok(receipt)
    }

    fn snapshot_for(&mut self, position: Option<Coordinate>, events: Vec<NavigationEvent>) -> TrackingUpdate {
        let (zones, transitions, nearest_police, nearest_hospital) = match position {
            Some(point) => {
                let zones = self.zones.zones_containing(point);
                let transitions = self.zone_tracker.update(&zones);
                for transition in &transitions {
                    if let ZoneTransition::Entered { name, level, .. } = transition {
                        info!(zone = %name, %level, "entered risk zone");
                    }
                }
                (
                    zones,
                    transitions,
                    self.nearby(point, AssetKind::Police, TravelMode::Walk),
                    self.nearby(point, AssetKind::Hospital, TravelMode::Drive),
                )
            }
            None => (Vec::new(), Vec::new(), None, None),
        };

        TrackingUpdate {
            position: self.position.clone(),
            zones,
            transitions,
            nearest_police,
            nearest_hospital,
            navigation: self.session.status(),
            events,
        }
    }

    fn nearby(&self, point: Coordinate, kind: AssetKind, mode: TravelMode) -> Option<NearbyAsset> {
        self.zones.nearest(point, kind).map(|nearest| NearbyAsset {
            eta_label: format_eta(nearest.distance_m, mode),
            asset: nearest.asset,
            distance_m: nearest.distance_m,
        })
    }
}
