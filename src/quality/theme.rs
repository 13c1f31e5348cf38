use std::collections::BTreeSet;

use super::{Metric, MetricOutcome, ScoringContext, mean_or_perfect};
use crate::schedule::Schedule;

/// Theme words and the stop categories (or name fragments) they call for.
const THEME_KEYWORDS: [(&str, &[&str]); 17] = [
    (
        "heritage",
        &[
            "museum", "palace", "fort", "historical", "heritage", "monument", "landmark",
            "attraction",
        ],
    ),
    (
        "old city",
        &[
            "heritage", "bazaar", "market", "historical", "landmark", "gate", "mosque", "temple",
            "attraction",
        ],
    ),
    ("riverfront", &["river", "lake", "park", "garden", "waterfront", "bridge", "nature"]),
    ("ashram", &["ashram", "memorial", "museum", "culture"]),
    ("science", &["museum", "science", "planetarium", "exhibition", "culture"]),
    ("temple", &["temple", "mandir", "religious", "shrine", "worship", "attraction"]),
    ("spiritual", &["temple", "mosque", "church", "religious", "spiritual", "shrine"]),
    ("museum", &["museum", "gallery", "exhibition", "culture"]),
    ("nature", &["park", "garden", "lake", "nature", "zoo", "forest"]),
    ("food", &["restaurant", "dining", "cafe", "food", "market"]),
    ("culture", &["museum", "culture", "heritage", "art", "gallery", "theater"]),
    (
        "architecture",
        &["palace", "fort", "monument", "museum", "landmark", "historical", "attraction"],
    ),
    ("park", &["park", "garden", "nature", "zoo"]),
    ("family", &["park", "zoo", "amusement", "museum", "entertainment"]),
    ("market", &["market", "bazaar", "shopping"]),
    ("fort", &["fort", "palace", "historical", "attraction", "landmark"]),
    ("gate", &["gate", "historical", "landmark", "attraction"]),
];

const DINING: [&str; 4] = ["dining", "restaurant", "cafe", "food"];

/// Score given to a theme that names nothing recognisable.
const GENERIC_THEME_SCORE: f64 = 70.0;

fn expected_categories(theme: &str) -> BTreeSet<&'static str> {
    let theme = theme.to_lowercase();
    THEME_KEYWORDS
        .iter()
        .filter(|(keyword, _)| theme.contains(keyword))
        .flat_map(|(_, categories)| categories.iter().copied())
        .collect()
}

/// Activities of a day match that day's theme.
#[derive(Debug, Clone)]
pub struct ThemeAlignment {
    pub weight: f64,
    /// Alignment percentage below which a day is reported.
    pub min_alignment: f64,
}

impl Default for ThemeAlignment {
    fn default() -> Self {
        Self {
            weight: 0.10,
            min_alignment: 50.0,
        }
    }
}

impl ThemeAlignment {
    fn score_day(
        &self,
        day: usize,
        theme: &str,
        schedule: &Schedule,
        outcome: &mut MetricOutcome,
    ) -> f64 {
        if theme.trim().is_empty() || schedule.is_empty() {
            return 100.0;
        }

        let expected = expected_categories(theme);
        if expected.is_empty() {
            outcome.issues.push(format!("Day {day}: theme '{theme}' is too generic"));
            outcome.suggestions.push(format!(
                "Day {day}: use a specific theme such as 'Heritage Walk' or 'Temple Trail'"
            ));
            return GENERIC_THEME_SCORE;
        }

        let sights: Vec<_> = schedule
            .activities
            .iter()
            .filter(|activity| !DINING.contains(&activity.stop.category.as_str()))
            .collect();
        if sights.is_empty() {
            return 100.0;
        }

        let matching = sights
            .iter()
            .filter(|activity| {
                let name = activity.stop.name.to_lowercase();
                expected.contains(activity.stop.category.as_str())
                    || expected.iter().any(|keyword| name.contains(keyword))
            })
            .count();
        let alignment = 100.0 * matching as f64 / sights.len() as f64;
        if alignment < self.min_alignment {
            outcome.issues.push(format!(
                "Day {day}: only {matching}/{} activities match theme '{theme}'",
                sights.len()
            ));
            outcome.suggestions.push(format!(
                "Day {day}: add activities related to the theme or adjust the theme"
            ));
        }
        alignment
    }
}

impl Metric for ThemeAlignment {
    fn name(&self) -> &'static str {
        "theme_alignment"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, schedules: &[Schedule], context: &ScoringContext) -> MetricOutcome {
        let mut outcome = MetricOutcome::default();
        let day_scores: Vec<f64> = schedules
            .iter()
            .enumerate()
            .map(|(index, schedule)| {
                let theme = context.theme_for_day(index);
                self.score_day(index + 1, theme, schedule, &mut outcome)
            })
            .collect();
        outcome.score = mean_or_perfect(&day_scores);
        outcome.detail("days", schedules.len() as f64);
        outcome
    }
}
