//! Leg enrichment: one provider call per leg, issued concurrently.
//!
//! A failed leg keeps the planner's estimate and is reported as a warning.
//! Only a stage where every attempted leg failed is an error.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, ProviderError};
use crate::model::{LegMetrics, LegStatus, Plan};
use crate::traits::DistanceProvider;

/// A leg whose provider call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentWarning {
    pub leg_index: usize,
    pub from: String,
    pub to: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    /// Legs a provider call was made for.
    pub attempted: usize,
    pub enriched: usize,
    /// Legs whose mode the provider does not serve.
    pub skipped: usize,
    pub warnings: Vec<EnrichmentWarning>,
}

impl EnrichmentReport {
    pub fn failed(&self) -> usize {
        self.warnings.len()
    }
}

/// Concurrency and time limits for one enrichment stage.
#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub concurrency: usize,
    pub call_timeout: Duration,
    /// Extra attempts for a leg whose failure is transient.
    pub retries: u32,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout: Duration::from_secs(15),
            retries: 1,
        }
    }
}

/// Enrich every leg of `plan` and return the replacement plan.
pub async fn enrich_plan<D>(
    plan: Plan,
    provider: &D,
    options: EnrichOptions,
) -> Result<(Plan, EnrichmentReport), OrchestratorError>
where
    D: DistanceProvider + ?Sized,
{
    let mut plan = plan;
    let mut report = EnrichmentReport::default();

    let call_timeout = options.call_timeout;
    let retries = options.retries;
    let results: Vec<(usize, Result<LegMetrics, ProviderError>)> = stream::iter(
        plan.legs
            .iter()
            .enumerate()
            .filter(|(_, leg)| provider.supports(leg.mode)),
    )
    .map(|(index, leg)| async move {
        let mut attempt = 0;
        loop {
            let result = match timeout(call_timeout, provider.enrich_leg(leg)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(call_timeout)),
            };
            match result {
                Err(err) if err.is_retryable() && attempt < retries => {
                    attempt += 1;
                    debug!(from = %leg.from, to = %leg.to, error = %err, attempt, "retrying leg");
                }
                result => break (index, result),
            }
        }
    })
    .buffer_unordered(options.concurrency.max(1))
    .collect()
    .await;

    for leg in plan.legs.iter_mut().filter(|leg| !provider.supports(leg.mode)) {
        debug!(
            from = %leg.from,
            to = %leg.to,
            mode = %leg.mode,
            "mode not served, keeping estimate"
        );
        leg.status = LegStatus::Skipped;
        report.skipped += 1;
    }

    for (index, result) in results {
        let leg = &mut plan.legs[index];
        match result {
            Ok(mut metrics) => {
                if metrics.distance_km.is_none()
                    && let Some(geometry) = &metrics.geometry
                    && geometry.points().len() > 1
                {
                    metrics.distance_km = Some(geometry.length_km());
                }
                if metrics.fare.is_none() {
                    metrics.fare = leg.metrics.as_ref().and_then(|old| old.fare.clone());
                }
                if let (Some(departure), Some(arrival)) = (&metrics.departure, &metrics.arrival) {
                    leg.notes = format!("{departure} → {arrival}");
                }
                leg.apply(metrics);
                report.attempted += 1;
                report.enriched += 1;
            }
            Err(ProviderError::UnsupportedMode(mode)) => {
                debug!(
                    from = %leg.from,
                    to = %leg.to,
                    %mode,
                    "provider declined mode, keeping estimate"
                );
                leg.status = LegStatus::Skipped;
                report.skipped += 1;
            }
            Err(err) => {
                warn!(
                    from = %leg.from,
                    to = %leg.to,
                    error = %err,
                    "leg enrichment failed, keeping estimate"
                );
                leg.status = LegStatus::Failed {
                    reason: err.to_string(),
                };
                report.attempted += 1;
                report.warnings.push(EnrichmentWarning {
                    leg_index: index,
                    from: leg.from.clone(),
                    to: leg.to.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    report.warnings.sort_by_key(|warning| warning.leg_index);

    if report.attempted > 0 && report.enriched == 0 {
        return Err(OrchestratorError::EnrichmentFailed { legs: report.attempted });
    }

    info!(
        enriched = report.enriched,
        skipped = report.skipped,
        failed = report.failed(),
        travel_minutes = plan.total_travel_minutes(),
        "plan enriched"
    );
    Ok((plan, report))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::matrix::Matrix;
    use crate::model::{GeoPoint, Leg, Provenance, Stop, StopGroup, TransportMode};
    use crate::polyline::Polyline;

    struct Scripted {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        flaky_calls: AtomicUsize,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                flaky_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DistanceProvider for Scripted {
        async fn matrix(&self, stops: &[Stop]) -> Result<Matrix, ProviderError> {
            Ok(Matrix::new(stops.len()))
        }

        async fn enrich_leg(&self, leg: &Leg) -> Result<LegMetrics, ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match leg.to.as_str() {
                "Slow" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(LegMetrics::new(1, None, Provenance::Provider))
                }
                "Down" => Err(ProviderError::Unavailable("503".into())),
                "Flaky" if self.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 => {
                    Err(ProviderError::Unavailable("connection reset".into()))
                }
                "Traced" => {
                    let mut metrics = LegMetrics::new(75, None, Provenance::Provider);
                    let points = vec![GeoPoint::new(48.85, 2.35), GeoPoint::new(48.85, 3.35)];
                    metrics.geometry = Some(Polyline::new(points));
                    Ok(metrics)
                }
                "Cursed" => Err(ProviderError::InvalidResponse("garbage".into())),
                _ => Ok(LegMetrics::new(120, Some(150.0), Provenance::Provider)),
            }
        }

        fn supports(&self, mode: TransportMode) -> bool {
            mode != TransportMode::Flight
        }
    }

    fn plan(legs: Vec<Leg>) -> Plan {
        Plan {
            theme: "test".into(),
            summary: String::new(),
            origin: "Home".into(),
            groups: vec![StopGroup::new("A", 2)],
            legs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_tolerated() {
        let legs = vec![
            Leg::new("Home", "A", TransportMode::Train).estimate(200, Some(160.0)),
            Leg::new("A", "Slow", TransportMode::Train).estimate(90, Some(80.0)),
            Leg::new("Slow", "B", TransportMode::Bus),
        ];
        let provider = Scripted::new();
        let (plan, report) = enrich_plan(plan(legs), &provider, EnrichOptions::default())
            .await
            .unwrap();

        assert_eq!(report.enriched, 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].leg_index, 1);
        assert_eq!(plan.legs[1].duration_minutes(), Some(90));
        assert!(matches!(plan.legs[1].status, LegStatus::Failed { .. }));
        assert_eq!(plan.legs[0].status, LegStatus::Enriched);
    }

    #[tokio::test]
    async fn test_unserved_modes_are_skipped() {
        let legs = vec![
            Leg::new("Home", "A", TransportMode::Flight).estimate(180, Some(1200.0)),
            Leg::new("A", "B", TransportMode::Car),
        ];
        let provider = Scripted::new();
        let (plan, report) = enrich_plan(plan(legs), &provider, EnrichOptions::default())
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.attempted, 1);
        assert_eq!(plan.legs[0].status, LegStatus::Skipped);
        assert_eq!(plan.legs[0].duration_minutes(), Some(180));
    }

    #[tokio::test]
    async fn test_all_failed_is_fatal() {
        let legs = vec![
            Leg::new("Home", "Down", TransportMode::Train),
            Leg::new("Down", "Down", TransportMode::Bus),
        ];
        let provider = Scripted::new();
        let err = enrich_plan(plan(legs), &provider, EnrichOptions::default()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::EnrichmentFailed { legs: 2 }));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let legs = (0..8)
            .map(|i| Leg::new(format!("C{i}"), format!("C{}", i + 1), TransportMode::Train))
            .collect();
        let provider = Scripted::new();
        let options = EnrichOptions {
            concurrency: 2,
            ..EnrichOptions::default()
        };
        let (_, report) = enrich_plan(plan(legs), &provider, options).await.unwrap();
        assert_eq!(report.enriched, 8);
        assert!(provider.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let legs = vec![
            Leg::new("Home", "Flaky", TransportMode::Train).estimate(60, None),
            Leg::new("Flaky", "Cursed", TransportMode::Train).estimate(45, None),
        ];
        let provider = Scripted::new();
        let (enriched, report) = enrich_plan(plan(legs), &provider, EnrichOptions::default())
            .await
            .unwrap();

        assert_eq!(provider.flaky_calls.load(Ordering::SeqCst), 2);
        assert_eq!(enriched.legs[0].status, LegStatus::Enriched);
        assert_eq!(enriched.legs[0].duration_minutes(), Some(120));
        // malformed answers are not worth a second call
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].reason.contains("garbage"));

        let provider = Scripted::new();
        let no_retry = EnrichOptions {
            retries: 0,
            ..EnrichOptions::default()
        };
        let legs = vec![
            Leg::new("Home", "Flaky", TransportMode::Train),
            Leg::new("Flaky", "A", TransportMode::Train),
        ];
        let (failed, report) = enrich_plan(plan(legs), &provider, no_retry).await.unwrap();
        assert!(matches!(failed.legs[0].status, LegStatus::Failed { .. }));
        assert_eq!(report.enriched, 1);
    }

    #[tokio::test]
    async fn test_distance_taken_from_geometry_when_missing() {
        let legs = vec![Leg::new("Home", "Traced", TransportMode::Car)];
        let provider = Scripted::new();
        let (plan, _) = enrich_plan(plan(legs), &provider, EnrichOptions::default()).await.unwrap();

        // one degree of longitude at 48.85N is about 73 km
        let km = plan.legs[0].metrics.as_ref().and_then(|metrics| metrics.distance_km).unwrap();
        assert!((km - 73.2).abs() < 1.0, "{km}");
    }

    #[tokio::test]
    async fn test_no_legs_is_ok() {
        let provider = Scripted::new();
        let (_, report) = enrich_plan(plan(Vec::new()), &provider, EnrichOptions::default())
            .await
            .unwrap();
        assert_eq!(report, EnrichmentReport::default());
    }
}
