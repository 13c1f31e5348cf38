//! Day-by-day timetables for a finalized plan.
//!
//! Cities run concurrently (bounded). Inside a city every day gets its own
//! matrix, then days are ordered and scheduled in parallel on rayon. City
//! progress is re-sequenced so observers always see cities in order.

use std::time::Duration;

use chrono::{Days, NaiveDate};
use futures::future::try_join_all;
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{OptimizeError, OrchestratorError, ProviderError};
use crate::matrix::Matrix;
use crate::model::{Plan, PlanRequest, Stop, StopGroup};
use crate::optimizer::{OptimizeOptions, optimize};
use crate::progress::{CityProgressEvent, OrderedCityEmitter, ProgressSink};
use crate::quality::{QualityScore, QualityScorer, ScoringContext};
use crate::schedule::{Schedule, ScheduleBuilder, ScheduleConfig, ScheduleIssue};
use crate::traits::DistanceProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayPlanConfig {
    /// Cities processed at once.
    pub city_concurrency: usize,
    pub call_timeout_secs: u64,
    /// Dining stops placed on a single day at most.
    pub max_meals_per_day: usize,
    pub optimize: OptimizeOptions,
    pub schedule: ScheduleConfig,
}

impl Default for DayPlanConfig {
    fn default() -> Self {
        Self {
            city_concurrency: 2,
            call_timeout_secs: 15,
            max_meals_per_day: 2,
            optimize: OptimizeOptions::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

/// One scheduled day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPlan {
    /// 1-based across the whole trip.
    pub day_number: u32,
    pub city: String,
    pub schedule: Schedule,
    pub issues: Vec<String>,
    pub total_distance_meters: u64,
    pub total_duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityDayPlans {
    pub city: String,
    pub country: String,
    pub start_date: NaiveDate,
    pub days: Vec<DayPlan>,
    /// Dining stops left out once every day had its meals.
    pub dropped_meals: Vec<String>,
    /// Why this city has no days, when generation failed.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPlanResult {
    pub theme: String,
    pub total_days: u32,
    pub cities: Vec<CityDayPlans>,
    pub quality: QualityScore,
}

impl DayPlanResult {
    pub fn schedules(&self) -> impl Iterator<Item = &Schedule> {
        self.cities.iter().flat_map(|city| city.days.iter().map(|day| &day.schedule))
    }
}

#[derive(Debug, thiserror::Error)]
enum CityError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
}

/// A city's stops dealt out over its days.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySplit {
    pub days: Vec<Vec<Stop>>,
    /// Names of dining stops past the per-day cap.
    pub dropped_meals: Vec<String>,
}

/// Spread a city's stops over `days`: sights in contiguous balanced runs,
/// dining stops dealt round-robin up to `max_meals` per day.
pub fn split_across_days(
    stops: &[Stop],
    days: usize,
    max_meals: usize,
    config: &ScheduleConfig,
) -> DaySplit {
    let days = days.max(1);
    let (dining, sights): (Vec<&Stop>, Vec<&Stop>) =
        stops.iter().partition(|stop| config.is_dining(stop));

    let mut buckets: Vec<Vec<Stop>> = (0..days)
        .map(|day| {
            let from = day * sights.len() / days;
            let to = (day + 1) * sights.len() / days;
            sights[from..to].iter().map(|stop| (*stop).clone()).collect()
        })
        .collect();

    let cap = days * max_meals;
    let mut dropped_meals = Vec::new();
    for (i, stop) in dining.into_iter().enumerate() {
        if i < cap {
            buckets[i % days].push(stop.clone());
        } else {
            dropped_meals.push(stop.name.clone());
        }
    }
    DaySplit {
        days: buckets,
        dropped_meals,
    }
}

pub struct DayPlanGenerator<D> {
    provider: D,
    config: DayPlanConfig,
    scorer: QualityScorer,
}

impl<D: DistanceProvider> DayPlanGenerator<D> {
    pub fn new(provider: D) -> Self {
        Self {
            provider,
            config: DayPlanConfig::default(),
            scorer: QualityScorer::standard(),
        }
    }

    pub fn with_config(mut self, config: DayPlanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_scorer(mut self, scorer: QualityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.call_timeout_secs)
    }

    /// Build and score timetables for every city of `plan`.
    ///
    /// A city that fails keeps an `error` and no days; only cancellation
    /// aborts the whole stage.
    pub async fn generate(
        &self,
        plan: &Plan,
        request: &PlanRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DayPlanResult, OrchestratorError> {
        let total_cities = plan.groups.len();
        info!(cities = total_cities, days = plan.total_days(), "generating day plans");

        let mut offsets = Vec::with_capacity(total_cities);
        let mut elapsed = 0;
        for group in &plan.groups {
            offsets.push(elapsed);
            elapsed += group.days;
        }

        let emitter = OrderedCityEmitter::new(sink);
        let builder = ScheduleBuilder::new(self.config.schedule.clone().with_pace(request.pace));
        let emitter = &emitter;
        let builder = &builder;

        let work = stream::iter(plan.groups.iter().zip(offsets).enumerate())
            .map(|(index, (group, offset))| async move {
                let city = self
                    .city(
                        index,
                        total_cities,
                        group,
                        request.start_date,
                        offset,
                        builder,
                        emitter,
                        cancel,
                    )
                    .await;
                emitter.finish(index);
                city
            })
            .buffered(self.config.city_concurrency.max(1))
            .collect::<Vec<_>>();

        let cities = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            cities = work => cities.into_iter().collect::<Result<Vec<_>, _>>()?,
        };

        let schedules: Vec<Schedule> = cities
            .iter()
            .flat_map(|city| city.days.iter().map(|day| day.schedule.clone()))
            .collect();
        let context = ScoringContext {
            theme: plan.theme.clone(),
            day_themes: Vec::new(),
            interests: request.interests.clone(),
        };
        let quality = self.scorer.score(&schedules, &context);

        Ok(DayPlanResult {
            theme: plan.theme.clone(),
            total_days: plan.total_days(),
            cities,
            quality,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn city(
        &self,
        index: usize,
        total_cities: usize,
        group: &StopGroup,
        trip_start: NaiveDate,
        offset: u32,
        builder: &ScheduleBuilder,
        emitter: &OrderedCityEmitter<'_>,
        cancel: &CancellationToken,
    ) -> Result<CityDayPlans, OrchestratorError> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        let start_date = trip_start + Days::new(u64::from(offset));
        emitter.emit(CityProgressEvent::new(
            index,
            total_cities,
            0,
            format!("Starting {} ({} days)", group.name, group.days),
        ));

        let mut city = CityDayPlans {
            city: group.name.clone(),
            country: group.country.clone(),
            start_date,
            days: Vec::new(),
            dropped_meals: Vec::new(),
            error: None,
        };
        let split = split_across_days(
            &group.stops,
            group.days as usize,
            self.config.max_meals_per_day,
            builder.config(),
        );
        if !split.dropped_meals.is_empty() {
            warn!(
                city = %group.name,
                dropped = ?split.dropped_meals,
                cap = self.config.max_meals_per_day,
                "more dining stops than meal slots"
            );
        }
        city.dropped_meals = split.dropped_meals;
        let days = self
            .city_days(
                index,
                total_cities,
                group,
                &split.days,
                start_date,
                offset,
                builder,
                emitter,
            )
            .await;
        match days {
            Ok(days) => {
                info!(city = %group.name, days = days.len(), "city scheduled");
                city.days = days;
                emitter.emit(CityProgressEvent::new(
                    index,
                    total_cities,
                    100,
                    format!("{} ready", group.name),
                ));
            }
            Err(err) => {
                warn!(city = %group.name, error = %err, "day plan generation failed");
                emitter.emit(CityProgressEvent::new(
                    index,
                    total_cities,
                    100,
                    format!("Could not plan {}: {err}", group.name),
                ));
                city.error = Some(err.to_string());
            }
        }
        Ok(city)
    }

    #[allow(clippy::too_many_arguments)]
    async fn city_days(
        &self,
        index: usize,
        total_cities: usize,
        group: &StopGroup,
        buckets: &[Vec<Stop>],
        start_date: NaiveDate,
        offset: u32,
        builder: &ScheduleBuilder,
        emitter: &OrderedCityEmitter<'_>,
    ) -> Result<Vec<DayPlan>, CityError> {

        let limit = self.call_timeout();
        let matrices: Vec<Matrix> = try_join_all(buckets.iter().map(|stops| async move {
            timeout(limit, self.provider.matrix(stops))
                .await
                .map_err(|_| ProviderError::Timeout(limit))?
        }))
        .await?;
        emitter.emit(CityProgressEvent::new(
            index,
            total_cities,
            40,
            format!("Travel times ready for {}", group.name),
        ));

        let options = &self.config.optimize;
        let days = buckets
            .par_iter()
            .zip(matrices.par_iter())
            .enumerate()
            .map(|(day, (stops, matrix))| -> Result<DayPlan, CityError> {
                let date = start_date + Days::new(day as u64);
                let route = optimize(stops, matrix, None, options)?;
                let (schedule, issues) = builder.build(&route.stops, &route.leg_minutes(), date);
                debug!(
                    city = %group.name,
                    %date,
                    stops = stops.len(),
                    issues = issues.len(),
                    "day scheduled"
                );
                Ok(DayPlan {
                    day_number: offset + day as u32 + 1,
                    city: group.name.clone(),
                    schedule,
                    issues: issues.iter().map(ScheduleIssue::to_string).collect(),
                    total_distance_meters: route.total_distance_meters,
                    total_duration_secs: route.total_duration_secs,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(days)
    }
}
