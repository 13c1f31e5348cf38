//! Scripted collaborators.
//!
//! Each mock replays a queue of canned replies; once a single reply is left it
//! is repeated for every further call. Call counters are public so tests can
//! assert how often the orchestrator reached out.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use trip_planner::draft::PlanDraft;
use trip_planner::error::{PlanningError, ProviderError, ReviewError};
use trip_planner::haversine::HaversineProvider;
use trip_planner::matrix::Matrix;
use trip_planner::model::{Leg, LegMetrics, Plan, Stop};
use trip_planner::review::{DimensionScores, ReviewIssue, ReviewResult};
use trip_planner::traits::{DistanceProvider, GenerativePlanner, PlanningContext, Reviewer};

fn next_reply<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// One planner response: a well-formed draft or raw model text.
#[derive(Debug, Clone)]
pub enum Reply {
    Draft(PlanDraft),
    Raw(String),
}

impl Reply {
    pub fn raw(content: impl Into<String>) -> Self {
        Reply::Raw(content.into())
    }

    fn into_draft(self) -> Result<PlanDraft, PlanningError> {
        match self {
            Reply::Draft(draft) => Ok(draft),
            Reply::Raw(content) => PlanDraft::from_json(&content),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    proposals: Mutex<VecDeque<Reply>>,
    revisions: Mutex<VecDeque<Reply>>,
    pub propose_calls: AtomicUsize,
    pub revise_calls: AtomicUsize,
    /// Issues handed to each revise call.
    pub revise_issues: Mutex<Vec<Vec<ReviewIssue>>>,
}

impl ScriptedPlanner {
    pub fn new(proposals: Vec<Reply>) -> Self {
        Self {
            proposals: Mutex::new(proposals.into()),
            ..Self::default()
        }
    }

    pub fn revisions(mut self, revisions: Vec<Reply>) -> Self {
        self.revisions = Mutex::new(revisions.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.propose_calls.load(Ordering::SeqCst) + self.revise_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativePlanner for ScriptedPlanner {
    async fn propose(&self, _context: &PlanningContext<'_>) -> Result<PlanDraft, PlanningError> {
        self.propose_calls.fetch_add(1, Ordering::SeqCst);
        next_reply(&self.proposals)
            .ok_or_else(|| PlanningError::Call("no scripted proposal".into()))?
            .into_draft()
    }

    async fn revise(
        &self,
        _plan: &Plan,
        issues: &[ReviewIssue],
        _context: &PlanningContext<'_>,
    ) -> Result<PlanDraft, PlanningError> {
        self.revise_calls.fetch_add(1, Ordering::SeqCst);
        self.revise_issues.lock().unwrap().push(issues.to_vec());
        next_reply(&self.revisions)
            .ok_or_else(|| PlanningError::Call("no scripted revision".into()))?
            .into_draft()
    }
}

/// A review with the same score on every dimension.
pub fn review(score: f64, issues: Vec<ReviewIssue>) -> ReviewResult {
    ReviewResult::new(DimensionScores::uniform(score), issues)
}

#[derive(Debug, Default)]
pub struct ScriptedReviewer {
    reviews: Mutex<VecDeque<ReviewResult>>,
    pub calls: AtomicUsize,
}

impl ScriptedReviewer {
    pub fn new(reviews: Vec<ReviewResult>) -> Self {
        Self {
            reviews: Mutex::new(reviews.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(result: ReviewResult) -> Self {
        Self::new(vec![result])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn review(
        &self,
        _plan: &Plan,
        _context: &PlanningContext<'_>,
    ) -> Result<ReviewResult, ReviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        next_reply(&self.reviews).ok_or_else(|| ReviewError::Call("no scripted review".into()))
    }
}

/// Straight-line provider with injectable slowness and outages.
#[derive(Debug, Default)]
pub struct FlakyProvider {
    inner: HaversineProvider,
    /// Legs (`from`, `to`) that sleep before answering.
    slow_legs: Vec<(String, String)>,
    delay: Duration,
    /// Legs departing from these cities fail outright.
    down_from: Vec<String>,
    /// Matrices touching stops with this id prefix fail.
    failing_matrix_prefix: Option<String>,
    pub leg_calls: AtomicUsize,
    pub matrix_calls: AtomicUsize,
}

impl FlakyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow_leg(mut self, from: &str, to: &str, delay: Duration) -> Self {
        self.slow_legs.push((from.to_string(), to.to_string()));
        self.delay = delay;
        self
    }

    pub fn down_from(mut self, city: &str) -> Self {
        self.down_from.push(city.to_string());
        self
    }

    /// Fail matrix calls for a city's stops; ids look like `lyon-3`.
    pub fn failing_matrix(mut self, city: &str) -> Self {
        self.failing_matrix_prefix = Some(format!("{}-", city.to_lowercase()));
        self
    }
}

#[async_trait]
impl DistanceProvider for FlakyProvider {
    async fn matrix(&self, stops: &[Stop]) -> Result<Matrix, ProviderError> {
        self.matrix_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(prefix) = &self.failing_matrix_prefix
            && stops.iter().any(|stop| stop.id.starts_with(prefix.as_str()))
        {
            return Err(ProviderError::Unavailable("matrix service down".into()));
        }
        self.inner.matrix(stops).await
    }

    async fn enrich_leg(&self, leg: &Leg) -> Result<LegMetrics, ProviderError> {
        self.leg_calls.fetch_add(1, Ordering::SeqCst);
        if self.down_from.iter().any(|city| city == &leg.from) {
            return Err(ProviderError::Unavailable(format!("no route from {}", leg.from)));
        }
        if self.slow_legs.iter().any(|(from, to)| from == &leg.from && to == &leg.to) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.enrich_leg(leg).await
    }
}
