//! Collaborator interfaces consumed by the planning core.
//!
//! The generative planner, the reviewer and the distance provider are all
//! external. They are passed in explicitly; nothing here is looked up from
//! ambient state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::draft::PlanDraft;
use crate::error::{PlanningError, ProviderError, ReviewError};
use crate::matrix::Matrix;
use crate::model::{Leg, LegMetrics, Plan, PlanRequest, Stop, TransportMode};
use crate::review::{ReviewIssue, ReviewResult};

/// What a planner or reviewer sees about the run it is part of.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    pub request: &'a PlanRequest,
    /// Review round the call belongs to, starting at 1.
    pub iteration: u32,
}

/// Produces structural plans (destinations and legs, no times).
#[async_trait]
pub trait GenerativePlanner: Send + Sync {
    async fn propose(&self, context: &PlanningContext<'_>) -> Result<PlanDraft, PlanningError>;

    /// Revise `plan` to address `issues`, editing as little as possible.
    async fn revise(
        &self,
        plan: &Plan,
        issues: &[ReviewIssue],
        context: &PlanningContext<'_>,
    ) -> Result<PlanDraft, PlanningError>;
}

/// Grades a plan along the five review dimensions.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(
        &self,
        plan: &Plan,
        context: &PlanningContext<'_>,
    ) -> Result<ReviewResult, ReviewError>;
}

/// Real-world travel metrics.
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    /// Pairwise matrix for `stops`, indexed by their order. Pairs the provider
    /// could not resolve are left missing.
    async fn matrix(&self, stops: &[Stop]) -> Result<Matrix, ProviderError>;

    /// Metrics for a single intercity leg.
    async fn enrich_leg(&self, leg: &Leg) -> Result<LegMetrics, ProviderError>;

    /// Whether `enrich_leg` can serve this mode at all.
    fn supports(&self, _mode: TransportMode) -> bool {
        true
    }
}

#[async_trait]
impl<T: GenerativePlanner + ?Sized> GenerativePlanner for Arc<T> {
    async fn propose(&self, context: &PlanningContext<'_>) -> Result<PlanDraft, PlanningError> {
        (**self).propose(context).await
    }

    async fn revise(
        &self,
        plan: &Plan,
        issues: &[ReviewIssue],
        context: &PlanningContext<'_>,
    ) -> Result<PlanDraft, PlanningError> {
        (**self).revise(plan, issues, context).await
    }
}

#[async_trait]
impl<T: Reviewer + ?Sized> Reviewer for Arc<T> {
    async fn review(
        &self,
        plan: &Plan,
        context: &PlanningContext<'_>,
    ) -> Result<ReviewResult, ReviewError> {
        (**self).review(plan, context).await
    }
}

#[async_trait]
impl<T: DistanceProvider + ?Sized> DistanceProvider for Arc<T> {
    async fn matrix(&self, stops: &[Stop]) -> Result<Matrix, ProviderError> {
        (**self).matrix(stops).await
    }

    async fn enrich_leg(&self, leg: &Leg) -> Result<LegMetrics, ProviderError> {
        (**self).enrich_leg(leg).await
    }

    fn supports(&self, mode: TransportMode) -> bool {
        (**self).supports(mode)
    }
}
