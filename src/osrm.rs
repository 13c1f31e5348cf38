//! OSRM HTTP adapter: table service for matrices, route service for legs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::matrix::Matrix;
use crate::model::{GeoPoint, Leg, LegMetrics, Provenance, Stop, TransportMode};
use crate::polyline::Polyline;
use crate::traits::DistanceProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmProvider {
    config: OsrmConfig,
    client: reqwest::Client,
}

impl OsrmProvider {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn coordinates(points: &[GeoPoint]) -> String {
        points
            .iter()
            .map(|point| format!("{:.6},{:.6}", point.lng, point.lat))
            .collect::<Vec<_>>()
            .join(";")
    }

    fn table_url(&self, points: &[GeoPoint]) -> String {
        format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url,
            self.config.profile,
            Self::coordinates(points)
        )
    }

    fn route_url(&self, from: GeoPoint, to: GeoPoint) -> String {
        format!(
            "{}/route/v1/{}/{}?overview=full&geometries=geojson",
            self.config.base_url,
            self.config.profile,
            Self::coordinates(&[from, to])
        )
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, url: String) -> Result<T, ProviderError> {
        let response = self.client.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                ProviderError::Timeout(Duration::from_secs(self.config.timeout_secs))
            } else {
                ProviderError::Http(err)
            }
        })?;
        Ok(response.error_for_status()?.json::<T>().await?)
    }

    /// Matrix for raw coordinates.
    pub async fn matrix_for(&self, points: &[GeoPoint]) -> Result<Matrix, ProviderError> {
        if points.len() < 2 {
            return Ok(Matrix::new(points.len()));
        }
        let body: OsrmTableResponse = self.get(self.table_url(points)).await?;
        body.into_matrix(points.len())
    }
}

#[async_trait]
impl DistanceProvider for OsrmProvider {
    async fn matrix(&self, stops: &[Stop]) -> Result<Matrix, ProviderError> {
        let points: Vec<GeoPoint> = stops.iter().map(|stop| stop.location).collect();
        self.matrix_for(&points).await
    }

    async fn enrich_leg(&self, leg: &Leg) -> Result<LegMetrics, ProviderError> {
        if !self.supports(leg.mode) {
            return Err(ProviderError::UnsupportedMode(leg.mode));
        }
        let (Some(from), Some(to)) = (leg.from_location, leg.to_location) else {
            return Err(ProviderError::Unavailable(format!(
                "{} -> {} has no coordinates",
                leg.from, leg.to
            )));
        };
        let body: OsrmRouteResponse = self.get(self.route_url(from, to)).await?;
        body.check()?;
        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no route found".into()))?;
        debug!(
            from = %leg.from,
            to = %leg.to,
            seconds = route.duration,
            meters = route.distance,
            "route resolved"
        );

        let mut metrics = LegMetrics::new(
            (route.duration / 60.0).round() as u32,
            Some(route.distance / 1000.0),
            Provenance::Provider,
        );
        metrics.geometry = route
            .geometry
            .map(|geometry| Polyline::from_lng_lat(&geometry.coordinates))
            .filter(|polyline| !polyline.is_empty());
        Ok(metrics)
    }

    /// Only road legs can be routed.
    fn supports(&self, mode: TransportMode) -> bool {
        mode.is_road()
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

fn to_whole(rows: Vec<Vec<Option<f64>>>) -> Vec<Vec<Option<u32>>> {
    rows.into_iter()
        .map(|row| row.into_iter().map(|value| value.map(|v| v.round() as u32)).collect())
        .collect()
}

impl OsrmTableResponse {
    fn into_matrix(self, size: usize) -> Result<Matrix, ProviderError> {
        if self.code != "Ok" {
            return Err(ProviderError::Unavailable(format!(
                "{}: {}",
                self.code,
                self.message.unwrap_or_default()
            )));
        }
        let (Some(durations), Some(distances)) = (self.durations, self.distances) else {
            return Err(ProviderError::InvalidResponse(
                "table response lacks durations or distances".into(),
            ));
        };
        let matrix = Matrix::from_rows(&to_whole(durations), &to_whole(distances))
            .ok_or_else(|| ProviderError::InvalidResponse("table rows are not square".into()))?;
        if matrix.size() != size {
            return Err(ProviderError::InvalidResponse(format!(
                "table covers {} points, expected {size}",
                matrix.size()
            )));
        }
        Ok(matrix)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

impl OsrmRouteResponse {
    fn check(&self) -> Result<(), ProviderError> {
        if self.code == "Ok" {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!(
                "{}: {}",
                self.code,
                self.message.clone().unwrap_or_default()
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Seconds.
    duration: f64,
    /// Meters.
    distance: f64,
    geometry: Option<OsrmGeometry>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}
