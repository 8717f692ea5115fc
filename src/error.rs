//! Error types shared across the engine.

use thiserror::Error;

/// Rejected input at a construction boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("coordinate is not finite (lat={lat}, lng={lng})")]
    NonFiniteCoordinate { lat: f64, lng: f64 },

    #[error("zone radius must be a positive finite number of meters, got {0}")]
    InvalidRadius(f64),
}

/// Failure talking to an external collaborator (backend, telemetry, SOS).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),

    #[error("backend rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Caller requests the navigation layer cannot honor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("no destination is set")]
    NoDestination,

    #[error("no live position is available")]
    PositionUnknown,

    #[error("route {0} is not part of the current batch")]
    UnknownRoute(String),
}

/// Why an SOS could not be sent.
#[derive(Debug, Error)]
pub enum SosError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}
