//! trip-planner core
//!
//! Iterative itinerary planning around external generative collaborators,
//! plus deterministic route ordering, day scheduling and quality scoring.

pub mod config;
pub mod day_plan;
pub mod draft;
pub mod enrich;
pub mod error;
pub mod haversine;
pub mod matrix;
pub mod model;
pub mod optimizer;
pub mod orchestrator;
pub mod osrm;
pub mod polyline;
pub mod progress;
pub mod quality;
pub mod review;
pub mod schedule;
pub mod traits;

pub use error::{
    OptimizeError, OrchestratorError, PlanningError, ProviderError, ReviewError, ScoringError,
};
pub use model::{GeoPoint, Leg, Pace, Plan, PlanRequest, Stop, StopGroup, TransportMode};
pub use optimizer::{OptimizeOptions, OptimizedRoute, optimize};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunOutcome, RunStatus};
pub use quality::{QualityScore, QualityScorer};
pub use review::{ReviewIssue, ReviewResult, Severity};
pub use schedule::{Schedule, ScheduleBuilder, ScheduleConfig};
pub use traits::{DistanceProvider, GenerativePlanner, PlanningContext, Reviewer};
