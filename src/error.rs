//! Error taxonomy for the planning core.
//!
//! Per-leg provider failures are absorbed by enrichment and surface as
//! warnings; everything here that reaches `OrchestratorError` ends a run.

use std::time::Duration;

use thiserror::Error;

use crate::model::TransportMode;
use crate::orchestrator::PlanningState;

/// The generative planner produced nothing usable.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("planner output is not valid JSON: {0}")]
    Unparsable(#[from] serde_json::Error),

    #[error("planner output is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("planner allocated {actual} days but the request asks for {expected}")]
    DayTotalMismatch { expected: u32, actual: u32 },

    #[error("city `{city}` is allocated {days} day(s); every city needs at least 2")]
    CityTooShort { city: String, days: u32 },

    #[error("invalid plan: {0}")]
    Invalid(String),

    #[error("planner call failed: {0}")]
    Call(String),

    #[error("planner call timed out after {0:?}")]
    Timeout(Duration),
}

/// A distance/time provider call failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider does not serve {0:?} legs")]
    UnsupportedMode(TransportMode),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a later retry of the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_) => true,
            ProviderError::Unavailable(_) => true,
            ProviderError::Http(_) => true,
            ProviderError::UnsupportedMode(_) => false,
            ProviderError::InvalidResponse(_) => false,
        }
    }
}

/// The reviewer could not produce a review.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("reviewer call failed: {0}")]
    Call(String),

    #[error("reviewer call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed review: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Route optimizer input contract violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptimizeError {
    #[error("matrix has no entry for stop {from} -> stop {to}")]
    MissingMatrixEntry { from: usize, to: usize },

    #[error("matrix covers {matrix} stops but {stops} were given")]
    MatrixSizeMismatch { stops: usize, matrix: usize },

    #[error("fixed start index {index} is out of range for {len} stops")]
    InvalidStart { index: usize, len: usize },
}

/// Quality scorer registration errors.
#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("metric weights sum to {0:.3}, expected 1.0")]
    WeightsDoNotSumToOne(f64),

    #[error("metric `{0}` registered twice")]
    DuplicateMetric(String),
}

/// Fatal outcomes of a planning run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("planning failed twice in a row: {0}")]
    Planning(#[from] PlanningError),

    #[error("review failed: {0}")]
    Review(#[from] ReviewError),

    #[error("enrichment failed: all {legs} leg(s) failed")]
    EnrichmentFailed { legs: usize },

    #[error("run cancelled")]
    Cancelled,

    #[error("route optimization failed: {0}")]
    Optimize(#[from] OptimizeError),

    #[error("distance provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("planning state {0:?} entered without its input")]
    MissingStageInput(PlanningState),
}
