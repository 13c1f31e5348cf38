//! Route geometry as a decoded coordinate sequence.
//!
//! Wire formats (GeoJSON, encoded polylines) are converted at the provider
//! boundary; the rest of the crate only sees `GeoPoint`s.

use serde::{Deserialize, Serialize};

use crate::model::GeoPoint;

/// A route geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<GeoPoint>,
}

impl Polyline {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    /// Build from GeoJSON `[lng, lat]` coordinate pairs.
    pub fn from_lng_lat(coordinates: &[[f64; 2]]) -> Self {
        Self {
            points: coordinates.iter().map(|[lng, lat]| GeoPoint::new(*lat, *lng)).collect(),
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Great-circle length along the vertices.
    pub fn length_km(&self) -> f64 {
        self.points.windows(2).map(|pair| pair[0].distance_km(&pair[1])).sum()
    }
}
