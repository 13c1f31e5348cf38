//! The propose → enrich → review → revise loop.
//!
//! [`PlanningState::next`] is the whole control policy as a pure function;
//! [`Orchestrator::run`] walks it, doing the I/O each state asks for.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::draft::PlanDraft;
use crate::enrich::{EnrichOptions, EnrichmentReport, enrich_plan};
use crate::error::{OrchestratorError, PlanningError, ReviewError};
use crate::model::{Plan, PlanRequest, StopGroup};
use crate::progress::{Phase, ProgressEvent, ProgressSink, iteration_base};
use crate::review::{ReviewIssue, ReviewResult};
use crate::traits::{DistanceProvider, GenerativePlanner, PlanningContext, Reviewer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Revision rounds allowed after the first review.
    pub max_iterations: u32,
    /// Leg provider calls in flight at once.
    pub enrich_concurrency: usize,
    /// Limit for every individual planner, reviewer and provider call.
    pub call_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            enrich_concurrency: 4,
            call_timeout_secs: 15,
        }
    }
}

impl OrchestratorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningState {
    Proposing,
    Enriching,
    Reviewing,
    Revising,
    Accepted,
    Exhausted,
}

/// What the stage that just ran reports back to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Done,
    Reviewed { acceptable: bool, revisions_left: u32 },
}

impl PlanningState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlanningState::Accepted | PlanningState::Exhausted)
    }

    pub fn next(self, outcome: StageOutcome) -> PlanningState {
        use PlanningState::*;
        match (self, outcome) {
            (Proposing | Revising, _) => Enriching,
            (Enriching, _) => Reviewing,
            (Reviewing, StageOutcome::Reviewed { acceptable: true, .. }) => Accepted,
            (Reviewing, StageOutcome::Reviewed { revisions_left: 0, .. }) => Exhausted,
            (Reviewing, StageOutcome::Reviewed { .. }) => Revising,
            (Reviewing, StageOutcome::Done) => Reviewing,
            (terminal, _) => terminal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Accepted,
    /// Revision budget spent without passing the quality gate.
    Exhausted,
}

/// Result of a run that was not aborted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub plan: Plan,
    pub review: ReviewResult,
    /// Review rounds performed.
    pub iterations_used: u32,
    pub status: RunStatus,
    /// Enrichment of the returned plan.
    pub enrichment: EnrichmentReport,
    /// Groups the planner changed although no issue pointed at them.
    pub edit_warnings: Vec<String>,
}

impl RunOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status == RunStatus::Accepted
    }
}

/// Data handed from one state to the next.
enum Carry {
    Empty,
    Drafted(Plan),
    Enriched(Plan, EnrichmentReport),
    Reviewed(Plan, EnrichmentReport, ReviewResult),
}

pub struct Orchestrator<P, R, D> {
    planner: P,
    reviewer: R,
    provider: D,
    config: OrchestratorConfig,
}

impl<P, R, D> Orchestrator<P, R, D>
where
    P: GenerativePlanner,
    R: Reviewer,
    D: DistanceProvider,
{
    pub fn new(planner: P, reviewer: R, provider: D) -> Self {
        Self {
            planner,
            reviewer,
            provider,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Plan `request` until the quality gate passes or the revision budget
    /// runs out. An exhausted budget is a normal outcome, not an error.
    pub async fn run(
        &self,
        request: &PlanRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, OrchestratorError> {
        let mut iteration = 1;
        let mut revisions = 0;
        let mut edit_warnings = Vec::new();
        let mut state = PlanningState::Proposing;
        let mut carry = Carry::Empty;

        loop {
            if cancel.is_cancelled() {
                info!(?state, "planning run cancelled");
                return Err(OrchestratorError::Cancelled);
            }
            debug!(?state, iteration, "entering state");

            let (next_carry, outcome) = match (state, carry) {
                (PlanningState::Proposing, _) => {
                    sink.emit(ProgressEvent::new(
                        Phase::Propose,
                        "Scouting destinations",
                        5,
                        iteration,
                    ));
                    let context = PlanningContext { request, iteration };
                    let plan = cancellable(
                        cancel,
                        self.plan_with_retry(request, || self.planner.propose(&context)),
                    )
                    .await?;
                    info!(
                        route = %plan.route_string(),
                        days = plan.total_days(),
                        "initial plan proposed"
                    );
                    sink.emit(ProgressEvent::new(
                        Phase::Propose,
                        format!("Proposed {}", plan.route_string()),
                        20,
                        iteration,
                    ));
                    (Carry::Drafted(plan), StageOutcome::Done)
                }

                (PlanningState::Enriching, Carry::Drafted(plan)) => {
                    let (start, end) = if iteration == 1 {
                        (25, 35)
                    } else {
                        let base = iteration_base(iteration - 1);
                        (base + 17, base + 20)
                    };
                    sink.emit(ProgressEvent::new(
                        Phase::Enrich,
                        format!("Checking {} travel legs", plan.legs.len()),
                        start,
                        iteration,
                    ));
                    let options = EnrichOptions {
                        concurrency: self.config.enrich_concurrency,
                        call_timeout: self.config.call_timeout(),
                        ..EnrichOptions::default()
                    };
                    let (plan, report) =
                        cancellable(cancel, enrich_plan(plan, &self.provider, options)).await?;
                    sink.emit(ProgressEvent::new(
                        Phase::Enrich,
                        format!(
                            "Enriched: {:.1}h total travel, {} warning(s)",
                            f64::from(plan.total_travel_minutes()) / 60.0,
                            report.failed()
                        ),
                        end,
                        iteration,
                    ));
                    (Carry::Enriched(plan, report), StageOutcome::Done)
                }

                (PlanningState::Reviewing, Carry::Enriched(plan, report)) => {
                    let base = iteration_base(iteration);
                    sink.emit(ProgressEvent::new(
                        Phase::Review,
                        format!("Reviewing plan (iteration {iteration})"),
                        base + 5,
                        iteration,
                    ));
                    let context = PlanningContext { request, iteration };
                    let review = cancellable(cancel, self.review(&plan, &context)).await?;
                    let acceptable = review.is_acceptable();
                    info!(
                        iteration,
                        score = review.overall_score(),
                        acceptable,
                        issues = review.issues.len(),
                        "plan reviewed"
                    );
                    sink.emit(ProgressEvent::new(
                        Phase::Review,
                        format!(
                            "Review score {:.0}/100: {}",
                            review.overall_score(),
                            if acceptable { "accepted" } else { "needs fixes" }
                        ),
                        base + 10,
                        iteration,
                    ));
                    let outcome = StageOutcome::Reviewed {
                        acceptable,
                        revisions_left: self.config.max_iterations.saturating_sub(revisions),
                    };
                    (Carry::Reviewed(plan, report, review), outcome)
                }

                (PlanningState::Revising, Carry::Reviewed(plan, _, review)) => {
                    let base = iteration_base(iteration);
                    let critical = review.has_critical();
                    sink.emit(ProgressEvent::new(
                        Phase::Revise,
                        format!("Fixing {} issue(s)", review.issues.len()),
                        base + 12,
                        iteration,
                    ));
                    let context = PlanningContext { request, iteration };
                    let issues = unresolved_issues(&review);
                    let revise = || self.planner.revise(&plan, &issues, &context);
                    let revised = cancellable(cancel, self.plan_with_retry(request, revise)).await?;
                    revisions += 1;

                    for name in unrequested_edits(&plan, &revised, &review) {
                        warn!(group = %name, "planner changed a group no issue pointed at");
                        edit_warnings.push(name);
                    }
                    info!(iteration, critical, route = %revised.route_string(), "plan revised");
                    sink.emit(ProgressEvent::new(
                        Phase::Revise,
                        format!("Revised: {}", revised.route_string()),
                        base + 15,
                        iteration,
                    ));
                    iteration += 1;
                    (Carry::Drafted(revised), StageOutcome::Done)
                }

                (
                    PlanningState::Accepted | PlanningState::Exhausted,
                    Carry::Reviewed(plan, enrichment, review),
                ) => {
                    let (status, message) = if state == PlanningState::Accepted {
                        let message =
                            format!("Plan finalized with score {:.0}/100", review.overall_score());
                        (RunStatus::Accepted, message)
                    } else {
                        let message = format!(
                            "Best effort after {iteration} iterations (score {:.0}/100)",
                            review.overall_score()
                        );
                        (RunStatus::Exhausted, message)
                    };
                    sink.emit(ProgressEvent::new(Phase::Complete, message, 100, iteration));
                    info!(?status, iterations = iteration, "planning run finished");
                    return Ok(RunOutcome {
                        plan,
                        review,
                        iterations_used: iteration,
                        status,
                        enrichment,
                        edit_warnings,
                    });
                }

                (state, _) => return Err(OrchestratorError::MissingStageInput(state)),
            };
            carry = next_carry;
            state = state.next(outcome);
        }
    }

    /// One planner call, retried once with the same input when its output is
    /// unusable. A second failure is returned.
    async fn plan_with_retry<F, Fut>(
        &self,
        request: &PlanRequest,
        mut call: F,
    ) -> Result<Plan, PlanningError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PlanDraft, PlanningError>>,
    {
        match self.plan_once(request, call()).await {
            Ok(plan) => Ok(plan),
            Err(err) => {
                warn!(error = %err, "planner output rejected, retrying once");
                self.plan_once(request, call()).await
            }
        }
    }

    async fn plan_once<Fut>(&self, request: &PlanRequest, call: Fut) -> Result<Plan, PlanningError>
    where
        Fut: Future<Output = Result<PlanDraft, PlanningError>>,
    {
        let limit = self.config.call_timeout();
        let draft = timeout(limit, call)
            .await
            .map_err(|_| PlanningError::Timeout(limit))??;
        draft.into_plan(request)
    }

    async fn review(
        &self,
        plan: &Plan,
        context: &PlanningContext<'_>,
    ) -> Result<ReviewResult, ReviewError> {
        let limit = self.config.call_timeout();
        let review = timeout(limit, self.reviewer.review(plan, context))
            .await
            .map_err(|_| ReviewError::Timeout(limit))??;
        Ok(review.with_iteration(context.iteration))
    }
}

/// Race `future` against cancellation.
async fn cancellable<T, E>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, OrchestratorError>
where
    OrchestratorError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
        result = future => result.map_err(OrchestratorError::from),
    }
}

fn same_group(a: &StopGroup, b: &StopGroup) -> bool {
    a.days == b.days
        && a.stops
            .iter()
            .map(|stop| &stop.name)
            .eq(b.stops.iter().map(|stop| &stop.name))
}

/// Names of groups without any issue that the revision changed or dropped.
fn unrequested_edits(before: &Plan, after: &Plan, review: &ReviewResult) -> Vec<String> {
    let affected = review.affected_groups();
    before
        .groups
        .iter()
        .enumerate()
        .filter(|(index, _)| !affected.contains(index))
        .filter(|(_, group)| {
            !after
                .group(&group.name)
                .is_some_and(|revised| same_group(group, revised))
        })
        .map(|(_, group)| group.name.clone())
        .collect()
}

/// Issues to hand the planner: everything from the latest review, worst first.
pub fn unresolved_issues(review: &ReviewResult) -> Vec<ReviewIssue> {
    let mut issues = review.issues.clone();
    issues.sort_by_key(|issue| issue.severity);
    issues
}
