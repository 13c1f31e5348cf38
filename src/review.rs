//! Review results and the rule-based reviewer.
//!
//! A review always carries all five dimension scores. The overall score and
//! the acceptance decision are derived from them, never stored separately.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReviewError;
use crate::model::{GeoPoint, Plan, PlanRequest, TransportMode};
use crate::traits::{PlanningContext, Reviewer};

/// Overall score a plan needs to pass the quality gate.
pub const ACCEPTANCE_THRESHOLD: f64 = 70.0;

const GATE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl Severity {
    /// Lenient parse for model output; anything unrecognised is minor.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "major" => Severity::Major,
            _ => Severity::Minor,
        }
    }
}

/// The five fixed review dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    TimeFeasibility,
    RouteLogic,
    TransportAppropriateness,
    CityBalance,
    InterestAlignment,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::TimeFeasibility,
        Dimension::RouteLogic,
        Dimension::TransportAppropriateness,
        Dimension::CityBalance,
        Dimension::InterestAlignment,
    ];

    pub fn weight(self) -> f64 {
        match self {
            Dimension::TimeFeasibility => 0.30,
            Dimension::RouteLogic => 0.25,
            Dimension::TransportAppropriateness => 0.20,
            Dimension::CityBalance => 0.15,
            Dimension::InterestAlignment => 0.10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dimension::TimeFeasibility => "time_feasibility",
            Dimension::RouteLogic => "route_logic",
            Dimension::TransportAppropriateness => "transport_appropriateness",
            Dimension::CityBalance => "city_balance",
            Dimension::InterestAlignment => "interest_alignment",
        }
    }
}

/// Per-dimension scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub time_feasibility: f64,
    pub route_logic: f64,
    pub transport_appropriateness: f64,
    pub city_balance: f64,
    pub interest_alignment: f64,
}

impl DimensionScores {
    /// Same score on every dimension.
    pub fn uniform(score: f64) -> Self {
        Self {
            time_feasibility: score,
            route_logic: score,
            transport_appropriateness: score,
            city_balance: score,
            interest_alignment: score,
        }
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::TimeFeasibility => self.time_feasibility,
            Dimension::RouteLogic => self.route_logic,
            Dimension::TransportAppropriateness => self.transport_appropriateness,
            Dimension::CityBalance => self.city_balance,
            Dimension::InterestAlignment => self.interest_alignment,
        }
    }

    /// Every score forced into 0-100. NaN becomes 0.
    pub fn clamped(self) -> Self {
        let clamp = |value: f64| if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) };
        Self {
            time_feasibility: clamp(self.time_feasibility),
            route_logic: clamp(self.route_logic),
            transport_appropriateness: clamp(self.transport_appropriateness),
            city_balance: clamp(self.city_balance),
            interest_alignment: clamp(self.interest_alignment),
        }
    }

    /// Explicit weighted sum, unrounded.
    pub fn weighted_sum(&self) -> f64 {
        Dimension::ALL
            .iter()
            .map(|dimension| dimension.weight() * self.get(*dimension))
            .sum()
    }

    /// Weighted sum rounded to two decimals, for display.
    pub fn weighted_overall(&self) -> f64 {
        (self.weighted_sum() * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub severity: Severity,
    /// Free-form tag such as `timing`, `routing` or `balance`.
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub suggested_fix: String,
    /// Index into `Plan::groups`.
    pub affected_group: Option<usize>,
    /// Index into `Plan::legs`.
    pub affected_leg: Option<usize>,
}

impl ReviewIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            description: description.into(),
            suggested_fix: String::new(),
            affected_group: None,
            affected_leg: None,
        }
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_fix = suggestion.into();
        self
    }

    pub fn group(mut self, index: usize) -> Self {
        self.affected_group = Some(index);
        self
    }

    pub fn leg(mut self, index: usize) -> Self {
        self.affected_leg = Some(index);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub scores: DimensionScores,
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub iteration: u32,
}

impl ReviewResult {
    pub fn new(scores: DimensionScores, issues: Vec<ReviewIssue>) -> Self {
        Self {
            scores: scores.clamped(),
            issues,
            summary: String::new(),
            iteration: 0,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn overall_score(&self) -> f64 {
        self.scores.weighted_overall()
    }

    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|issue| issue.severity == Severity::Critical)
    }

    /// Quality gate: overall ≥ 70 and no critical issue.
    ///
    /// Compares the unrounded sum; the tolerance only absorbs float noise
    /// from the weights themselves.
    pub fn is_acceptable(&self) -> bool {
        let overall = self.scores.weighted_sum();
        overall + GATE_TOLERANCE >= ACCEPTANCE_THRESHOLD && !self.has_critical()
    }

    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &ReviewIssue> {
        self.issues.iter().filter(move |issue| issue.severity == severity)
    }

    /// Group indices named by at least one issue.
    pub fn affected_groups(&self) -> BTreeSet<usize> {
        self.issues.iter().filter_map(|issue| issue.affected_group).collect()
    }
}

/// Rule thresholds for [`DeterministicReviewer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewRules {
    pub max_leg_hours: f64,
    pub long_leg_hours: f64,
    /// Share of waking trip hours that may be spent travelling.
    pub max_travel_share: f64,
    pub waking_hours_per_day: f64,
    pub max_city_days: u32,
    pub max_walk_km: f64,
    pub min_flight_km: f64,
    pub max_road_km: f64,
    /// Moves shorter than this never count as backtracking.
    pub backtrack_min_km: f64,
}

impl Default for ReviewRules {
    fn default() -> Self {
        Self {
            max_leg_hours: 24.0,
            long_leg_hours: 10.0,
            max_travel_share: 0.30,
            waking_hours_per_day: 14.0,
            max_city_days: 7,
            max_walk_km: 5.0,
            min_flight_km: 300.0,
            max_road_km: 900.0,
            backtrack_min_km: 50.0,
        }
    }
}

/// Rule-based reviewer computing every dimension from the plan itself.
#[derive(Debug, Clone, Default)]
pub struct DeterministicReviewer {
    rules: ReviewRules,
}

impl DeterministicReviewer {
    pub fn new(rules: ReviewRules) -> Self {
        Self { rules }
    }

    pub fn evaluate(&self, plan: &Plan, request: &PlanRequest) -> ReviewResult {
        let mut issues = Vec::new();
        let scores = DimensionScores {
            time_feasibility: self.time_feasibility(plan, &mut issues),
            route_logic: self.route_logic(plan, request, &mut issues),
            transport_appropriateness: self.transport(plan, &mut issues),
            city_balance: self.city_balance(plan, request, &mut issues),
            interest_alignment: self.interest_alignment(plan, request, &mut issues),
        };
        let result = ReviewResult::new(scores, issues);
        debug!(
            overall = result.overall_score(),
            issues = result.issues.len(),
            acceptable = result.is_acceptable(),
            "deterministic review"
        );
        let summary = format!(
            "{} with {} issue(s), overall {:.1}",
            plan.route_string(),
            result.issues.len(),
            result.overall_score()
        );
        result.with_summary(summary)
    }

    fn time_feasibility(&self, plan: &Plan, issues: &mut Vec<ReviewIssue>) -> f64 {
        let rules = &self.rules;
        let mut score: f64 = 100.0;

        for (index, leg) in plan.legs.iter().enumerate() {
            let Some(minutes) = leg.duration_minutes() else { continue };
            let hours = f64::from(minutes) / 60.0;
            if hours > rules.max_leg_hours {
                score -= 40.0;
                issues.push(
                    ReviewIssue::new(
                        Severity::Critical,
                        "timing",
                        format!("{} → {} takes {hours:.1}h", leg.from, leg.to),
                    )
                    .fix("split the journey or choose a faster mode")
                    .leg(index),
                );
            } else if hours > rules.long_leg_hours {
                score -= 5.0;
                issues.push(
                    ReviewIssue::new(
                        Severity::Minor,
                        "timing",
                        format!("{} → {} is a long travel day ({hours:.1}h)", leg.from, leg.to),
                    )
                    .fix("consider an overnight option")
                    .leg(index),
                );
            }
        }

        let trip_hours = f64::from(plan.total_days()) * rules.waking_hours_per_day;
        let travel_hours = f64::from(plan.total_travel_minutes()) / 60.0;
        if trip_hours > 0.0 && travel_hours > trip_hours * rules.max_travel_share {
            score -= 25.0;
            issues.push(
                ReviewIssue::new(
                    Severity::Major,
                    "timing",
                    format!("{travel_hours:.1}h of travel in {} days", plan.total_days()),
                )
                .fix("drop a city or use faster connections"),
            );
        }

        score
    }

    fn route_logic(
        &self,
        plan: &Plan,
        request: &PlanRequest,
        issues: &mut Vec<ReviewIssue>,
    ) -> f64 {
        let mut score: f64 = 100.0;

        let mut seen = BTreeSet::new();
        for (index, group) in plan.groups.iter().enumerate() {
            if !seen.insert(group.name.to_lowercase()) {
                score -= 20.0;
                let description = format!("{} is visited twice", group.name);
                issues.push(
                    ReviewIssue::new(Severity::Major, "routing", description)
                        .fix("merge the two stays")
                        .group(index),
                );
            }
        }

        // Backtracking: two long moves that end up close to where they began.
        let points: Vec<(Option<usize>, Option<GeoPoint>)> =
            std::iter::once((None, request.origin_location))
                .chain(plan.groups.iter().enumerate().map(|(i, group)| (Some(i), group.location)))
                .collect();
        for window in points.windows(3) {
            let (Some(a), Some(b), Some(c)) = (window[0].1, window[1].1, window[2].1) else {
                continue;
            };
            let first = a.distance_km(&b);
            let second = b.distance_km(&c);
            if first < self.rules.backtrack_min_km || second < self.rules.backtrack_min_km {
                continue;
            }
            if a.distance_km(&c) / (first + second) < 0.3 {
                score -= 15.0;
                let pivot = &plan.groups[window[1].0.unwrap_or(0)].name;
                let mut issue = ReviewIssue::new(
                    Severity::Major,
                    "routing",
                    format!("route doubles back around {pivot}"),
                )
                .fix("reorder cities to follow one direction");
                if let Some(index) = window[1].0 {
                    issue = issue.group(index);
                }
                issues.push(issue);
            }
        }

        score
    }

    fn transport(&self, plan: &Plan, issues: &mut Vec<ReviewIssue>) -> f64 {
        let rules = &self.rules;
        let mut score: f64 = 100.0;

        for (index, leg) in plan.legs.iter().enumerate() {
            let Some(km) = leg.distance_km().or_else(|| leg.straight_line_km()) else {
                continue;
            };
            let problem = match leg.mode {
                TransportMode::Walk if km > rules.max_walk_km => {
                    Some((Severity::Major, 15.0, "too far to walk"))
                }
                TransportMode::Flight if km < rules.min_flight_km => {
                    Some((Severity::Minor, 10.0, "too short to be worth flying"))
                }
                mode if mode.is_road() && km > rules.max_road_km => {
                    Some((Severity::Major, 15.0, "too far by road for one day"))
                }
                _ => None,
            };
            if let Some((severity, penalty, reason)) = problem {
                score -= penalty;
                issues.push(
                    ReviewIssue::new(
                        severity,
                        "transport",
                        format!(
                            "{} → {} ({km:.0} km by {}): {reason}",
                            leg.from, leg.to, leg.mode
                        ),
                    )
                    .leg(index),
                );
            }
        }

        score
    }

    fn city_balance(
        &self,
        plan: &Plan,
        request: &PlanRequest,
        issues: &mut Vec<ReviewIssue>,
    ) -> f64 {
        let mut score: f64 = 100.0;

        for (index, group) in plan.groups.iter().enumerate() {
            if group.days < 2 {
                score -= 40.0;
                issues.push(
                    ReviewIssue::new(
                        Severity::Critical,
                        "balance",
                        format!("{} has only {} day(s)", group.name, group.days),
                    )
                    .fix("give every city at least 2 days")
                    .group(index),
                );
            } else if group.days > self.rules.max_city_days {
                score -= 5.0;
                issues.push(
                    ReviewIssue::new(
                        Severity::Minor,
                        "balance",
                        format!("{} takes {} days", group.name, group.days),
                    )
                    .group(index),
                );
            }
        }

        if plan.total_days() != request.total_days {
            score -= 40.0;
            issues.push(ReviewIssue::new(
                Severity::Critical,
                "balance",
                format!(
                    "plan covers {} days but the trip is {}",
                    plan.total_days(),
                    request.total_days
                ),
            ));
        }

        score
    }

    fn interest_alignment(
        &self,
        plan: &Plan,
        request: &PlanRequest,
        issues: &mut Vec<ReviewIssue>,
    ) -> f64 {
        let mut score: f64 = if request.interests.is_empty() {
            100.0
        } else {
            let covered = request
                .interests
                .iter()
                .filter(|interest| {
                    plan.groups.iter().flat_map(|group| &group.stops).any(|stop| {
                        stop.category.contains(interest.as_str())
                            || stop.name.to_lowercase().contains(interest.as_str())
                    })
                })
                .count();
            100.0 * covered as f64 / request.interests.len() as f64
        };

        for avoided in &request.avoid {
            if let Some(index) = plan
                .groups
                .iter()
                .position(|group| group.name.eq_ignore_ascii_case(avoided))
            {
                score -= 20.0;
                let description = format!("{avoided} was to be avoided");
                issues.push(
                    ReviewIssue::new(Severity::Major, "interest_alignment", description)
                        .fix(format!("replace {avoided}"))
                        .group(index),
                );
            }
        }

        for required in &request.must_include {
            if plan.group(required).is_none() {
                score -= 20.0;
                let description = format!("{required} is missing");
                issues.push(
                    ReviewIssue::new(Severity::Major, "interest_alignment", description)
                        .fix(format!("add {required}")),
                );
            }
        }

        score
    }
}

#[async_trait]
impl Reviewer for DeterministicReviewer {
    async fn review(
        &self,
        plan: &Plan,
        context: &PlanningContext<'_>,
    ) -> Result<ReviewResult, ReviewError> {
        Ok(self.evaluate(plan, context.request).with_iteration(context.iteration))
    }
}
