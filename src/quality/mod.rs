//! Multi-metric grading of finished day schedules.
//!
//! Each metric is an independent pure function over the schedules. The scorer
//! only knows names and weights, so a new metric is added by registering it.

mod duration;
mod geography;
mod hours;
mod meals;
mod theme;
mod variety;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ScoringError;
use crate::schedule::Schedule;

pub use duration::DurationAppropriateness;
pub use geography::{GeographicClustering, TravelEfficiency};
pub use hours::OpeningHoursCompliance;
pub use meals::MealTiming;
pub use theme::ThemeAlignment;
pub use variety::Variety;

/// Issues from a metric scoring below this are reported as critical.
const CRITICAL_METRIC_SCORE: f64 = 50.0;
const MAX_CRITICAL_PER_METRIC: usize = 2;
const MAX_REPORTED: usize = 5;

/// What the scorer knows about the trip besides the schedules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringContext {
    /// Theme applied to days without their own.
    pub theme: String,
    /// Per-day themes, indexed like the schedules.
    pub day_themes: Vec<String>,
    pub interests: BTreeSet<String>,
}

impl ScoringContext {
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            ..Default::default()
        }
    }

    pub fn theme_for_day(&self, index: usize) -> &str {
        self.day_themes
            .get(index)
            .filter(|theme| !theme.trim().is_empty())
            .map_or(self.theme.as_str(), String::as_str)
    }
}

/// Raw result of one metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricOutcome {
    pub score: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub details: BTreeMap<String, f64>,
}

impl MetricOutcome {
    pub fn perfect() -> Self {
        Self {
            score: 100.0,
            ..Default::default()
        }
    }

    fn detail(&mut self, key: &str, value: f64) {
        self.details.insert(key.to_string(), value);
    }
}

/// A registered quality dimension.
pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;
    fn weight(&self) -> f64;
    fn evaluate(&self, schedules: &[Schedule], context: &ScoringContext) -> MetricOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(label)
    }
}

/// Score thresholds for letter grades, checked from the top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBands {
    /// `(minimum score, grade)`, highest first.
    pub bands: Vec<(f64, Grade)>,
    /// Grade below every band.
    pub floor: Grade,
}

impl Default for GradeBands {
    fn default() -> Self {
        Self {
            bands: vec![
                (95.0, Grade::APlus),
                (90.0, Grade::A),
                (85.0, Grade::AMinus),
                (80.0, Grade::BPlus),
                (75.0, Grade::B),
                (70.0, Grade::BMinus),
                (65.0, Grade::CPlus),
                (60.0, Grade::C),
                (55.0, Grade::CMinus),
                (50.0, Grade::D),
            ],
            floor: Grade::F,
        }
    }
}

impl GradeBands {
    pub fn grade(&self, score: f64) -> Grade {
        self.bands
            .iter()
            .find(|(minimum, _)| score >= *minimum)
            .map_or(self.floor, |(_, grade)| *grade)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
    pub name: String,
    pub score: f64,
    pub weight: f64,
    pub grade: Grade,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub details: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityScore {
    pub metrics: BTreeMap<String, MetricResult>,
    pub overall: f64,
    pub grade: Grade,
    pub total_issues: usize,
    /// Leading issues of metrics scoring below 50.
    pub critical_issues: Vec<String>,
    /// De-duplicated suggestions, weakest metric first.
    pub recommendations: Vec<String>,
}

impl QualityScore {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|result| result.score)
    }
}

pub struct QualityScorer {
    metrics: Vec<Box<dyn Metric>>,
    bands: GradeBands,
}

impl fmt::Debug for QualityScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityScorer")
            .field("metrics", &self.metrics.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("bands", &self.bands)
            .finish()
    }
}

impl QualityScorer {
    /// Register `metrics`; their weights must sum to 1.0.
    pub fn new(metrics: Vec<Box<dyn Metric>>, bands: GradeBands) -> Result<Self, ScoringError> {
        let mut names = BTreeSet::new();
        for metric in &metrics {
            if !names.insert(metric.name()) {
                return Err(ScoringError::DuplicateMetric(metric.name().to_string()));
            }
        }
        let total: f64 = metrics.iter().map(|metric| metric.weight()).sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(ScoringError::WeightsDoNotSumToOne(total));
        }
        Ok(Self { metrics, bands })
    }

    /// The seven default metrics with their default weights.
    pub fn standard() -> Self {
        Self::with_bands(GradeBands::default())
    }

    pub fn with_bands(bands: GradeBands) -> Self {
        Self {
            metrics: vec![
                Box::new(MealTiming::default()),
                Box::new(GeographicClustering::default()),
                Box::new(TravelEfficiency::default()),
                Box::new(Variety::default()),
                Box::new(OpeningHoursCompliance::default()),
                Box::new(ThemeAlignment::default()),
                Box::new(DurationAppropriateness::default()),
            ],
            bands,
        }
    }

    pub fn metric_names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|metric| metric.name()).collect()
    }

    pub fn score(&self, schedules: &[Schedule], context: &ScoringContext) -> QualityScore {
        let mut results: Vec<MetricResult> = self
            .metrics
            .iter()
            .map(|metric| {
                let outcome = metric.evaluate(schedules, context);
                let score = outcome.score.clamp(0.0, 100.0);
                debug!(metric = metric.name(), score, "metric evaluated");
                MetricResult {
                    name: metric.name().to_string(),
                    score,
                    weight: metric.weight(),
                    grade: self.bands.grade(score),
                    issues: outcome.issues,
                    suggestions: outcome.suggestions,
                    details: outcome.details,
                }
            })
            .collect();

        let overall: f64 = results.iter().map(|result| result.weight * result.score).sum();
        let total_issues = results.iter().map(|result| result.issues.len()).sum();

        // weakest metric first, registration order on ties
        results.sort_by(|a, b| a.score.total_cmp(&b.score));

        let critical_issues: Vec<String> = results
            .iter()
            .filter(|result| result.score < CRITICAL_METRIC_SCORE)
            .flat_map(|result| result.issues.iter().take(MAX_CRITICAL_PER_METRIC).cloned())
            .take(MAX_REPORTED)
            .collect();

        let mut recommendations: Vec<String> = Vec::new();
        for suggestion in results.iter().flat_map(|result| &result.suggestions) {
            if !recommendations.contains(suggestion) {
                recommendations.push(suggestion.clone());
            }
        }
        recommendations.truncate(MAX_REPORTED);

        let grade = self.bands.grade(overall);
        info!(overall, grade = %grade, total_issues, "schedule quality scored");

        QualityScore {
            metrics: results.into_iter().map(|result| (result.name.clone(), result)).collect(),
            overall,
            grade,
            total_issues,
            critical_issues,
            recommendations,
        }
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::standard()
    }
}

/// Average of per-day scores; 100 when there are no days.
fn mean_or_perfect(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        100.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}
