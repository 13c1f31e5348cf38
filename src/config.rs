//! Combined settings document.
//!
//! Every section is optional; missing sections and fields fall back to their
//! defaults. Where the document comes from is up to the host application.

use serde::{Deserialize, Serialize};

use crate::day_plan::DayPlanConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::osrm::OsrmConfig;
use crate::quality::GradeBands;
use crate::review::ReviewRules;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub orchestrator: OrchestratorConfig,
    pub day_plan: DayPlanConfig,
    pub osrm: OsrmConfig,
    pub review: ReviewRules,
    pub grades: GradeBands,
}

impl PlannerSettings {
    pub fn from_yaml_str(document: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(document)
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
