//! safenav core
//!
//! Safety-aware navigation for tourists: risk-zone geometry, route scoring,
//! a live navigation state machine and a location feed with telemetry.

pub mod error;
pub mod geo;
pub mod polyline;
pub mod zones;
pub mod dataset;
pub mod refresh;
pub mod scorer;
pub mod navigation;
pub mod feed;
pub mod sources;
pub mod traits;
pub mod backend;
pub mod tracker;
pub mod format;
