//! Polyline representation for route geometries.
//!
//! Routes are kept as decoded coordinate sequences.

use serde::{Deserialize, Serialize};

use crate::geo::{distance_meters, Coordinate};

/// An ordered path of coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

impl Polyline {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Coordinate> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of the great-circle distances between consecutive points.
    pub fn length_meters(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| distance_meters(pair[0], pair[1]))
            .sum()
    }

    /// Distance from `point` to the nearest vertex, or `None` for an empty path.
    ///
    /// Only vertices are considered, not the segments between them.
    pub fn closest_distance_meters(&self, point: Coordinate) -> Option<f64> {
        self.points
            .iter()
            .map(|vertex| distance_meters(point, *vertex))
            .reduce(f64::min)
    }
}
