//! Full planning runs against scripted collaborators.

mod fixtures;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fixtures::*;
use trip_planner::error::{OrchestratorError, PlanningError};
use trip_planner::haversine::HaversineProvider;
use trip_planner::model::LegStatus;
use trip_planner::orchestrator::{Orchestrator, OrchestratorConfig, RunStatus};
use trip_planner::progress::{NoProgress, Phase, ProgressEvent, ProgressUpdate};
use trip_planner::review::{DeterministicReviewer, ReviewIssue, ReviewRules, Severity};

fn journey_events(sink: &Mutex<Vec<ProgressUpdate>>) -> Vec<ProgressEvent> {
    sink.lock()
        .unwrap()
        .iter()
        .filter_map(|update| match update {
            ProgressUpdate::Journey(event) => Some(event.clone()),
            ProgressUpdate::City(_) => None,
        })
        .collect()
}

/// Proposes the France tour and answers every revision with it again.
fn repeating_planner() -> ScriptedPlanner {
    ScriptedPlanner::new(vec![Reply::Draft(france_tour())])
        .revisions(vec![Reply::Draft(france_tour())])
}

fn routing_issue() -> ReviewIssue {
    ReviewIssue::new(Severity::Major, "routing", "Lyon is visited out of order").group(1)
}

#[tokio::test]
async fn test_good_first_proposal_is_accepted() {
    init_tracing();
    let planner = Arc::new(ScriptedPlanner::new(vec![Reply::Draft(france_tour())]));
    let reviewer = Arc::new(ScriptedReviewer::always(review(85.0, vec![])));
    let orchestrator =
        Orchestrator::new(planner.clone(), reviewer.clone(), HaversineProvider::default());

    let outcome = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Accepted);
    assert!(outcome.is_accepted());
    assert_eq!(outcome.iterations_used, 1);
    assert_eq!(outcome.review.iteration, 1);
    assert_eq!(planner.propose_calls.load(Ordering::SeqCst), 1);
    assert_eq!(planner.revise_calls.load(Ordering::SeqCst), 0);
    assert_eq!(reviewer.calls(), 1);

    assert_eq!(outcome.plan.total_days(), 10);
    assert_eq!(outcome.plan.city_names(), vec!["Paris", "Lyon", "Marseille"]);
    assert_eq!(outcome.plan.route_string(), "Bordeaux → Paris → Lyon → Marseille");
    assert_eq!(outcome.enrichment.enriched, 4);
    assert!(outcome.plan.legs.iter().all(|leg| leg.status == LegStatus::Enriched));
    assert!(outcome.edit_warnings.is_empty());
}

#[tokio::test]
async fn test_rule_based_review_of_real_route() {
    let orchestrator = Orchestrator::new(
        ScriptedPlanner::new(vec![Reply::Draft(france_tour())]),
        DeterministicReviewer::new(ReviewRules::default()),
        HaversineProvider::default(),
    );

    let outcome = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    // Trains between well-spaced cities are fine; no sight mentions the
    // "history" or "food" tags, so only interest alignment suffers.
    assert!(outcome.is_accepted());
    assert_eq!(outcome.review.scores.time_feasibility, 100.0);
    assert_eq!(outcome.review.scores.route_logic, 100.0);
    assert_eq!(outcome.review.scores.interest_alignment, 0.0);
    assert_eq!(outcome.review.overall_score(), 90.0);
    assert!(!outcome.review.summary.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_one_slow_leg_keeps_its_estimate() {
    let provider = FlakyProvider::new().slow_leg("Lyon", "Marseille", Duration::from_secs(60));
    let orchestrator = Orchestrator::new(
        ScriptedPlanner::new(vec![Reply::Draft(riviera_tour())]),
        ScriptedReviewer::always(review(80.0, vec![])),
        provider,
    );

    let outcome = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_accepted());
    assert_eq!(outcome.enrichment.attempted, 5);
    assert_eq!(outcome.enrichment.enriched, 4);
    assert_eq!(outcome.enrichment.failed(), 1);

    let warning = &outcome.enrichment.warnings[0];
    assert_eq!(warning.leg_index, 2);
    assert_eq!((warning.from.as_str(), warning.to.as_str()), ("Lyon", "Marseille"));
    assert!(warning.reason.contains("timed out"));

    let slow = &outcome.plan.legs[2];
    assert!(matches!(slow.status, LegStatus::Failed { .. }));
    // planner said 1.7 hours
    assert_eq!(slow.duration_minutes(), Some(102));
    for (index, leg) in outcome.plan.legs.iter().enumerate() {
        if index != 2 {
            assert_eq!(leg.status, LegStatus::Enriched, "leg {index}");
        }
    }
}

#[tokio::test]
async fn test_every_leg_failing_is_fatal() {
    let provider = FlakyProvider::new()
        .down_from("Bordeaux")
        .down_from("Paris")
        .down_from("Lyon")
        .down_from("Marseille");
    let reviewer = Arc::new(ScriptedReviewer::always(review(90.0, vec![])));
    let orchestrator = Orchestrator::new(
        ScriptedPlanner::new(vec![Reply::Draft(france_tour())]),
        reviewer.clone(),
        provider,
    );

    let err = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::EnrichmentFailed { legs: 4 }));
    assert_eq!(reviewer.calls(), 0);
}

#[tokio::test]
async fn test_never_accepting_reviewer_exhausts_budget() {
    let planner = Arc::new(repeating_planner());
    let reviewer = Arc::new(ScriptedReviewer::always(review(50.0, vec![routing_issue()])));
    let orchestrator =
        Orchestrator::new(planner.clone(), reviewer.clone(), HaversineProvider::default());
    assert_eq!(orchestrator.config().max_iterations, 3);

    let outcome = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Exhausted);
    assert!(!outcome.review.is_acceptable());
    assert_eq!(outcome.iterations_used, 4);
    assert_eq!(outcome.review.iteration, 4);
    assert_eq!(planner.calls(), 4);
    assert_eq!(planner.revise_calls.load(Ordering::SeqCst), 3);
    assert_eq!(reviewer.calls(), 4);
    // identical revisions touch nothing
    assert!(outcome.edit_warnings.is_empty());
}

#[tokio::test]
async fn test_configured_budget_bounds_planner_calls() {
    for max_iterations in [0, 1, 5] {
        let planner = Arc::new(repeating_planner());
        let orchestrator = Orchestrator::new(
            planner.clone(),
            ScriptedReviewer::always(review(40.0, vec![routing_issue()])),
            HaversineProvider::default(),
        )
        .with_config(OrchestratorConfig {
            max_iterations,
            ..OrchestratorConfig::default()
        });

        let outcome = orchestrator
            .run(&france_request(10), &NoProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Exhausted);
        assert_eq!(planner.calls(), max_iterations as usize + 1);
        assert_eq!(outcome.iterations_used, max_iterations + 1);
    }
}

#[tokio::test]
async fn test_revision_addresses_issues_worst_first() {
    let planner = Arc::new(
        ScriptedPlanner::new(vec![Reply::Draft(france_tour())])
            .revisions(vec![Reply::Draft(france_tour_longer_lyon())]),
    );
    let first = review(
        55.0,
        vec![
            ReviewIssue::new(Severity::Minor, "balance", "Marseille could use a beach day")
                .group(2),
            ReviewIssue::new(Severity::Critical, "timing", "Paris has too many sights for its days")
                .fix("Move a day to Lyon")
                .group(0),
        ],
    );
    let reviewer = Arc::new(ScriptedReviewer::new(vec![first, review(82.0, vec![])]));
    let orchestrator =
        Orchestrator::new(planner.clone(), reviewer.clone(), HaversineProvider::default());

    let outcome = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_accepted());
    assert_eq!(outcome.iterations_used, 2);
    assert_eq!(planner.revise_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.plan.group("lyon").map(|group| group.days), Some(4));

    let handed = planner.revise_issues.lock().unwrap();
    let severities: Vec<Severity> = handed[0].iter().map(|issue| issue.severity).collect();
    assert_eq!(severities, vec![Severity::Critical, Severity::Minor]);

    // Lyon changed although only Paris and Marseille were flagged
    assert_eq!(outcome.edit_warnings, vec!["Lyon".to_string()]);
}

#[tokio::test]
async fn test_fenced_planner_output_is_accepted() {
    let content = format!(
        "Here is your itinerary:\n```json\n{}\n```\nEnjoy!",
        serde_json::to_string_pretty(&france_tour()).unwrap()
    );
    let planner = Arc::new(ScriptedPlanner::new(vec![Reply::raw(content)]));
    let orchestrator = Orchestrator::new(
        planner.clone(),
        ScriptedReviewer::always(review(75.0, vec![])),
        HaversineProvider::default(),
    );

    let outcome = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_accepted());
    assert_eq!(planner.propose_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.plan.groups[0].stops.len(), PARIS_PLACES.len());
}

#[tokio::test]
async fn test_unusable_output_is_retried_once() {
    let planner = Arc::new(ScriptedPlanner::new(vec![
        Reply::raw("I'd be happy to plan your trip!"),
        Reply::Draft(france_tour()),
    ]));
    let orchestrator = Orchestrator::new(
        planner.clone(),
        ScriptedReviewer::always(review(75.0, vec![])),
        HaversineProvider::default(),
    );

    let outcome = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_accepted());
    assert_eq!(planner.propose_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_unusable_output_is_fatal() {
    let planner = Arc::new(ScriptedPlanner::new(vec![Reply::raw("not json")]));
    let reviewer = Arc::new(ScriptedReviewer::always(review(75.0, vec![])));
    let orchestrator =
        Orchestrator::new(planner.clone(), reviewer.clone(), HaversineProvider::default());

    let err = orchestrator
        .run(&france_request(10), &NoProgress, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Planning(PlanningError::Unparsable(_))));
    assert_eq!(planner.propose_calls.load(Ordering::SeqCst), 2);
    assert_eq!(reviewer.calls(), 0);
}

#[tokio::test]
async fn test_day_total_must_match_request() {
    let planner = Arc::new(ScriptedPlanner::new(vec![Reply::Draft(france_tour())]));
    let orchestrator = Orchestrator::new(
        planner.clone(),
        ScriptedReviewer::always(review(75.0, vec![])),
        HaversineProvider::default(),
    );

    let err = orchestrator
        .run(&france_request(9), &NoProgress, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Planning(PlanningError::DayTotalMismatch { expected: 9, actual: 10 })
    ));
    assert_eq!(planner.propose_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let planner = Arc::new(ScriptedPlanner::new(vec![Reply::Draft(france_tour())]));
    let orchestrator = Orchestrator::new(
        planner.clone(),
        ScriptedReviewer::always(review(75.0, vec![])),
        HaversineProvider::default(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator.run(&france_request(10), &NoProgress, &cancel).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Cancelled));
    assert_eq!(planner.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_enrichment() {
    let reviewer = Arc::new(ScriptedReviewer::always(review(75.0, vec![])));
    let orchestrator = Orchestrator::new(
        ScriptedPlanner::new(vec![Reply::Draft(france_tour())]),
        reviewer.clone(),
        FlakyProvider::new().slow_leg("Paris", "Lyon", Duration::from_secs(10)),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = orchestrator.run(&france_request(10), &NoProgress, &cancel).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Cancelled));
    assert_eq!(reviewer.calls(), 0);
}

#[tokio::test]
async fn test_progress_for_accepted_run() {
    let orchestrator = Orchestrator::new(
        ScriptedPlanner::new(vec![Reply::Draft(france_tour())]),
        ScriptedReviewer::always(review(85.0, vec![])),
        HaversineProvider::default(),
    );
    let sink: Mutex<Vec<ProgressUpdate>> = Mutex::new(Vec::new());

    orchestrator
        .run(&france_request(10), &sink, &CancellationToken::new())
        .await
        .unwrap();

    let events = journey_events(&sink);
    let steps: Vec<(Phase, u8)> = events
        .iter()
        .map(|event| (event.phase, event.progress_percent))
        .collect();
    assert_eq!(
        steps,
        vec![
            (Phase::Propose, 5),
            (Phase::Propose, 20),
            (Phase::Enrich, 25),
            (Phase::Enrich, 35),
            (Phase::Review, 40),
            (Phase::Review, 45),
            (Phase::Complete, 100),
        ]
    );
}

#[tokio::test]
async fn test_one_revision_walks_every_stage_in_order() {
    let reviewer = ScriptedReviewer::new(vec![
        review(50.0, vec![routing_issue()]),
        review(90.0, Vec::new()),
    ]);
    let orchestrator =
        Orchestrator::new(repeating_planner(), reviewer, HaversineProvider::default());
    let sink: Mutex<Vec<ProgressUpdate>> = Mutex::new(Vec::new());

    let outcome = orchestrator
        .run(&france_request(10), &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Accepted);
    assert_eq!(outcome.iterations_used, 2);
    let mut phases: Vec<Phase> = journey_events(&sink).iter().map(|event| event.phase).collect();
    phases.dedup();
    assert_eq!(
        phases,
        vec![
            Phase::Propose,
            Phase::Enrich,
            Phase::Review,
            Phase::Revise,
            Phase::Enrich,
            Phase::Review,
            Phase::Complete,
        ]
    );
}

#[tokio::test]
async fn test_progress_never_goes_backwards() {
    let orchestrator = Orchestrator::new(
        repeating_planner(),
        ScriptedReviewer::always(review(50.0, vec![routing_issue()])),
        HaversineProvider::default(),
    );
    let sink: Mutex<Vec<ProgressUpdate>> = Mutex::new(Vec::new());

    orchestrator
        .run(&france_request(10), &sink, &CancellationToken::new())
        .await
        .unwrap();

    let events = journey_events(&sink);
    assert!(
        events
            .windows(2)
            .all(|pair| pair[0].progress_percent <= pair[1].progress_percent)
    );
    assert_eq!(events.iter().filter(|event| event.phase == Phase::Review).count(), 8);
    assert_eq!(events.iter().filter(|event| event.phase == Phase::Revise).count(), 6);
    let last = events.last().unwrap();
    assert_eq!((last.phase, last.progress_percent, last.iteration), (Phase::Complete, 100, 4));
}
