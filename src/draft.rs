//! Strict schema for generative planner and reviewer output.
//!
//! Model output is parsed once, here. Anything that does not fit the schema or
//! breaks a plan invariant becomes a `PlanningError`; nothing downstream ever
//! sees loosely-typed JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlanningError, ReviewError};
use crate::model::{GeoPoint, Leg, Plan, PlanRequest, Stop, StopGroup, TransportMode};
use crate::review::{DimensionScores, ReviewIssue, ReviewResult, Severity};

/// Longest single travel leg a plan may carry.
const MAX_LEG_HOURS: f64 = 72.0;

/// Longest visit a single highlight may ask for.
const MAX_HIGHLIGHT_HOURS: f64 = 24.0;

/// Strip markdown fences and surrounding prose from a model response,
/// leaving the outermost JSON object.
pub fn extract_json(content: &str) -> &str {
    let mut body = content.trim();
    if let Some((_, rest)) = body.split_once("```json") {
        body = rest.split("```").next().unwrap_or(rest).trim();
    } else if let Some((_, rest)) = body.split_once("```") {
        let block = rest.split("```").next().unwrap_or(rest).trim();
        // skip a language tag on the fence line
        body = match block.split_once('\n') {
            Some((first, tail)) if !first.trim_start().starts_with('{') => tail.trim(),
            _ => block,
        };
    }
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    }
}

/// A proposed point of interest inside a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub suggested_duration_hours: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityDraft {
    pub name: String,
    #[serde(default)]
    pub country: String,
    pub days: u32,
    #[serde(default)]
    pub highlights: Vec<HighlightDraft>,
    #[serde(default)]
    pub why_visit: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegDraft {
    pub from_city: String,
    pub to_city: String,
    pub mode: TransportMode,
    pub duration_hours: f64,
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub notes: String,
    pub estimated_cost: Option<String>,
}

/// A structural plan exactly as the generative planner returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDraft {
    pub theme: String,
    #[serde(default)]
    pub summary: String,
    pub cities: Vec<CityDraft>,
    #[serde(default)]
    pub travel_legs: Vec<LegDraft>,
}

fn point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
        _ => None,
    }
}

fn slug(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

impl PlanDraft {
    /// Parse raw model output, tolerating markdown fences.
    pub fn from_json(content: &str) -> Result<Self, PlanningError> {
        Ok(serde_json::from_str(extract_json(content))?)
    }

    /// Validate against `request` and build a `Plan`.
    ///
    /// Highlights without coordinates fall back to their city's location and
    /// are dropped when neither is known.
    pub fn into_plan(self, request: &PlanRequest) -> Result<Plan, PlanningError> {
        if self.cities.is_empty() {
            return Err(PlanningError::MissingField("cities"));
        }
        if self.theme.trim().is_empty() {
            return Err(PlanningError::MissingField("theme"));
        }

        let mut locations: BTreeMap<String, GeoPoint> = BTreeMap::new();
        if let Some(origin) = request.origin_location {
            locations.insert(request.origin.to_lowercase(), origin);
        }

        let mut groups = Vec::with_capacity(self.cities.len());
        for city in self.cities {
            if city.name.trim().is_empty() {
                return Err(PlanningError::MissingField("cities[].name"));
            }
            if city.days < 2 {
                return Err(PlanningError::CityTooShort {
                    city: city.name,
                    days: city.days,
                });
            }
            let city_location = point(city.latitude, city.longitude);
            if let Some(location) = city_location {
                locations.insert(city.name.to_lowercase(), location);
            }

            let mut group = StopGroup::new(city.name.clone(), city.days);
            group.country = city.country;
            group.why_visit = city.why_visit;
            group.location = city_location;
            for (index, highlight) in city.highlights.into_iter().enumerate() {
                let location = point(highlight.latitude, highlight.longitude).or(city_location);
                let Some(location) = location else {
                    debug!(
                        city = %city.name,
                        highlight = %highlight.name,
                        "dropping unlocated highlight"
                    );
                    continue;
                };
                let id = format!("{}-{index}", slug(&city.name));
                let mut stop = Stop::new(id, highlight.category, location).name(highlight.name);
                if let Some(hours) = highlight.suggested_duration_hours
                    && hours > 0.0
                {
                    if hours > MAX_HIGHLIGHT_HOURS {
                        return Err(PlanningError::Invalid(format!(
                            "highlight {} in {} lasts {hours} hours",
                            stop.name, city.name
                        )));
                    }
                    stop = stop.suggested_duration((hours * 60.0).round() as u32);
                }
                group = group.stop(stop);
            }
            groups.push(group);
        }

        let actual: u32 = groups.iter().map(|group| group.days).sum();
        if actual != request.total_days {
            return Err(PlanningError::DayTotalMismatch {
                expected: request.total_days,
                actual,
            });
        }

        let known = |name: &str| {
            name.eq_ignore_ascii_case(&request.origin)
                || groups.iter().any(|group| group.name.eq_ignore_ascii_case(name))
        };
        let mut legs = Vec::with_capacity(self.travel_legs.len());
        for draft in self.travel_legs {
            for endpoint in [&draft.from_city, &draft.to_city] {
                if !known(endpoint) {
                    return Err(PlanningError::Invalid(format!(
                        "leg endpoint `{endpoint}` is not on the route"
                    )));
                }
            }
            if !(0.0..=MAX_LEG_HOURS).contains(&draft.duration_hours) {
                return Err(PlanningError::Invalid(format!(
                    "leg {} -> {} has duration {}",
                    draft.from_city, draft.to_city, draft.duration_hours
                )));
            }
            let mut leg = Leg::new(draft.from_city, draft.to_city, draft.mode)
                .estimate((draft.duration_hours * 60.0).round() as u32, draft.distance_km);
            leg.from_location = locations.get(&leg.from.to_lowercase()).copied();
            leg.to_location = locations.get(&leg.to.to_lowercase()).copied();
            leg.notes = draft.notes;
            if let Some(metrics) = leg.metrics.as_mut() {
                metrics.fare = draft.estimated_cost;
            }
            legs.push(leg);
        }

        let returns = legs.iter().any(|leg| leg.to.eq_ignore_ascii_case(&request.origin));
        if request.return_to_origin && !returns {
            return Err(PlanningError::Invalid(format!("no leg returns to {}", request.origin)));
        }

        Ok(Plan {
            theme: self.theme,
            summary: self.summary,
            origin: request.origin.clone(),
            groups,
            legs,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDraft {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub category: String,
    pub description: String,
    #[serde(default, alias = "suggestion")]
    pub suggested_fix: String,
    pub affected_city: Option<usize>,
    pub affected_leg: Option<usize>,
}

/// Review exactly as a generative reviewer returned it.
///
/// Any `score` or `is_acceptable` the model adds is ignored; both are
/// recomputed from the dimension scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub scores: DimensionScores,
    #[serde(default)]
    pub issues: Vec<IssueDraft>,
    #[serde(default)]
    pub summary: String,
}

impl ReviewDraft {
    pub fn from_json(content: &str) -> Result<Self, ReviewError> {
        Ok(serde_json::from_str(extract_json(content))?)
    }

    pub fn into_result(self, iteration: u32) -> ReviewResult {
        let issues = self
            .issues
            .into_iter()
            .map(|issue| ReviewIssue {
                severity: Severity::parse_lenient(&issue.severity),
                category: if issue.category.is_empty() {
                    "general".to_string()
                } else {
                    issue.category
                },
                description: issue.description,
                suggested_fix: issue.suggested_fix,
                affected_group: issue.affected_city,
                affected_leg: issue.affected_leg,
            })
            .collect();
        ReviewResult::new(self.scores, issues)
            .with_summary(self.summary)
            .with_iteration(iteration)
    }
}
