//! Test fixtures for safenav.
//!
//! Provides realistic test data including:
//! - Named Guwahati landmarks, police stations and hospitals
//! - A straight northbound corridor with exact geometry for scoring tests

pub mod guwahati_locations;

pub use guwahati_locations::*;
