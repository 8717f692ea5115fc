//! Seams to the collaborators the engine consumes.
//!
//! The engine never talks to the network or the device directly. Concrete
//! adapters (see [`crate::backend`] and [`crate::sources`]) implement these.

use std::sync::mpsc::Receiver;

use crate::error::CollaboratorError;
use crate::feed::{LocationError, LocationEvent, PositionSample};
use crate::geo::Coordinate;
use crate::zones::{ResponseAsset, RiskZone};

/// Provides the currently active risk zones.
pub trait ZoneSource {
    fn fetch_active_zones(&self) -> Result<Vec<RiskZone>, CollaboratorError>;
}

/// Provides police stations and hospitals.
///
/// The two kinds are fetched separately so a failure or an empty answer for
/// one never costs the other.
pub trait AssetSource {
    fn fetch_police_stations(&self) -> Result<Vec<ResponseAsset>, CollaboratorError>;

    fn fetch_hospitals(&self) -> Result<Vec<ResponseAsset>, CollaboratorError>;

    /// Both kinds in one list; fails if either fetch fails.
    fn fetch_response_assets(&self) -> Result<Vec<ResponseAsset>, CollaboratorError> {
        let mut assets = self.fetch_police_stations()?;
        assets.extend(self.fetch_hospitals()?);
        Ok(assets)
    }
}

/// Receives position telemetry. Best effort; callers log and drop failures.
pub trait TelemetrySink {
    fn post_position(&self, session_id: &str, sample: &PositionSample) -> Result<(), CollaboratorError>;
}

/// Whether the SOS endpoint took the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SosReceipt {
    pub accepted: bool,
}

/// Receives SOS escalations.
pub trait SosSink {
    fn post_sos(&self, session_id: &str, position: Coordinate) -> Result<SosReceipt, CollaboratorError>;
}

/// A device (or simulated) location stream.
///
/// `subscribe` opens a fresh stream; events queued on an earlier stream must
/// never appear on a later one. `unsubscribe` releases the underlying watch.
pub trait LocationSource {
    fn subscribe(&mut self) -> Result<Receiver<LocationEvent>, LocationError>;

    fn unsubscribe(&mut self);
}

impl<T: ZoneSource + ?Sized> ZoneSource for std::sync::Arc<T> {
    fn fetch_active_zones(&self) -> Result<Vec<RiskZone>, CollaboratorError> {
        (**self).fetch_active_zones()
    }
}

impl<T: AssetSource + ?Sized> AssetSource for std::sync::Arc<T> {
    fn fetch_police_stations(&self) -> Result<Vec<ResponseAsset>, CollaboratorError> {
        (**self).fetch_police_stations()
    }

    fn fetch_hospitals(&self) -> Result<Vec<ResponseAsset>, CollaboratorError> {
        (**self).fetch_hospitals()
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for std::sync::Arc<T> {
    fn post_position(&self, session_id: &str, sample: &PositionSample) -> Result<(), CollaboratorError> {
        (**self).post_position(session_id, sample)
    }
}
