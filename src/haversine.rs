//! Great-circle distance and a straight-line estimating provider.
//!
//! Ignores the road network, so it is less accurate than OSRM, but it never
//! fails for located stops. Duration and distance are produced together from
//! the same computation.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::matrix::{Matrix, MatrixEntry};
use crate::model::{GeoPoint, Leg, LegMetrics, Provenance, Stop, TransportMode};
use crate::traits::DistanceProvider;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Check-in, security and transfers to and from the airport.
const FLIGHT_OVERHEAD_MINUTES: f64 = 90.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Average speed assumed for a mode, km/h.
pub fn assumed_speed_kmh(mode: TransportMode) -> f64 {
    match mode {
        TransportMode::Walk => 5.0,
        TransportMode::Transit => 20.0,
        TransportMode::Drive | TransportMode::Car => 30.0,
        TransportMode::Ferry => 30.0,
        TransportMode::Bus => 60.0,
        TransportMode::Train => 90.0,
        TransportMode::Flight => 700.0,
    }
}

/// Straight-line estimating provider.
#[derive(Debug, Clone)]
pub struct HaversineProvider {
    /// Mode assumed between stops inside one city.
    pub matrix_mode: TransportMode,
}

impl Default for HaversineProvider {
    fn default() -> Self {
        Self {
            matrix_mode: TransportMode::Transit,
        }
    }
}

impl HaversineProvider {
    pub fn new(matrix_mode: TransportMode) -> Self {
        Self { matrix_mode }
    }

    /// Travel time in minutes for `km` at the mode's assumed speed.
    pub fn minutes_for(km: f64, mode: TransportMode) -> f64 {
        let minutes = km / assumed_speed_kmh(mode) * 60.0;
        if mode == TransportMode::Flight {
            minutes + FLIGHT_OVERHEAD_MINUTES
        } else {
            minutes
        }
    }

    fn entry(&self, from: GeoPoint, to: GeoPoint) -> MatrixEntry {
        let km = haversine_km(from, to);
        let seconds = Self::minutes_for(km, self.matrix_mode) * 60.0;
        MatrixEntry::new(seconds.round() as u32, (km * 1000.0).round() as u32)
    }

    /// Synchronous matrix; the async trait method delegates here.
    pub fn matrix_for(&self, locations: &[GeoPoint]) -> Matrix {
        let n = locations.len();
        let mut matrix = Matrix::new(n);
        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    matrix.set(i, j, self.entry(*from, *to));
                }
            }
        }
        matrix
    }
}

#[async_trait]
impl DistanceProvider for HaversineProvider {
    async fn matrix(&self, stops: &[Stop]) -> Result<Matrix, ProviderError> {
        let locations: Vec<GeoPoint> = stops.iter().map(|stop| stop.location).collect();
        Ok(self.matrix_for(&locations))
    }

    async fn enrich_leg(&self, leg: &Leg) -> Result<LegMetrics, ProviderError> {
        let (Some(from), Some(to)) = (leg.from_location, leg.to_location) else {
            return Err(ProviderError::Unavailable(format!(
                "{} -> {} has no coordinates",
                leg.from, leg.to
            )));
        };
        let km = haversine_km(from, to);
        let minutes = Self::minutes_for(km, leg.mode).round() as u32;
        Ok(LegMetrics::new(minutes, Some(km), Provenance::Estimate))
    }
}
