use std::collections::{BTreeMap, BTreeSet};

use super::{Metric, MetricOutcome, ScoringContext, mean_or_perfect};
use crate::schedule::Schedule;

/// Broad activity groups; a category outside every group counts on its own.
const CATEGORY_GROUPS: [(&str, &[&str]); 7] = [
    ("cultural", &["museum", "culture", "art_gallery", "heritage", "historical_landmark"]),
    ("religious", &["temple", "church", "mosque", "place_of_worship", "shrine"]),
    ("nature", &["park", "garden", "nature", "lake", "beach", "viewpoint"]),
    ("entertainment", &["entertainment", "amusement_park", "zoo", "aquarium", "theme_park"]),
    ("shopping", &["shopping", "market", "mall", "bazaar"]),
    ("dining", &["dining", "restaurant", "cafe", "food", "bar"]),
    ("landmark", &["tourist_attraction", "attraction", "landmark", "monument", "fort", "palace"]),
];

/// Groups every trip should touch at least once.
const ESSENTIAL_GROUPS: [&str; 2] = ["dining", "landmark"];

fn group_of(category: &str) -> &str {
    CATEGORY_GROUPS
        .iter()
        .find(|(_, members)| members.contains(&category))
        .map_or(category, |(group, _)| group)
}

/// Days mix kinds of activity and the trip covers the essentials.
#[derive(Debug, Clone)]
pub struct Variety {
    pub weight: f64,
    /// Same-category repeats per day before a penalty applies.
    pub max_repeats: usize,
    /// Share of all activities a single category may take.
    pub max_category_share: f64,
}

impl Default for Variety {
    fn default() -> Self {
        Self {
            weight: 0.15,
            max_repeats: 3,
            max_category_share: 0.40,
        }
    }
}

impl Metric for Variety {
    fn name(&self) -> &'static str {
        "variety"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, schedules: &[Schedule], _context: &ScoringContext) -> MetricOutcome {
        let mut outcome = MetricOutcome::default();
        let mut day_scores = Vec::with_capacity(schedules.len());
        let mut trip_categories: BTreeMap<&str, usize> = BTreeMap::new();
        let mut trip_groups: BTreeSet<&str> = BTreeSet::new();
        let mut total = 0;

        for (index, schedule) in schedules.iter().enumerate() {
            let day = index + 1;
            let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
            let mut groups: BTreeSet<&str> = BTreeSet::new();
            for activity in &schedule.activities {
                let category = activity.stop.category.as_str();
                *categories.entry(category).or_default() += 1;
                *trip_categories.entry(category).or_default() += 1;
                groups.insert(group_of(category));
                trip_groups.insert(group_of(category));
            }
            total += schedule.activities.len();

            let mut score: f64 = 100.0;
            let non_dining: Vec<(&str, usize)> = categories
                .iter()
                .filter(|(category, _)| group_of(category) != "dining")
                .map(|(category, count)| (*category, *count))
                .collect();
            let non_dining_total: usize = non_dining.iter().map(|(_, count)| count).sum();
            if non_dining_total >= self.max_repeats {
                for (category, count) in &non_dining {
                    if *count >= self.max_repeats {
                        score -= 15.0;
                        outcome.issues.push(format!("Day {day}: {count} '{category}' activities"));
                        outcome.suggestions.push(format!(
                            "Day {day}: swap one '{category}' stop for something different"
                        ));
                    }
                }
            }

            if groups.len() >= 3 {
                score = (score + 5.0).min(100.0);
            } else if groups.len() == 1 && schedule.activities.len() > 2 {
                score -= 10.0;
                outcome.issues.push(format!("Day {day}: every activity is the same kind"));
            }
            day_scores.push(score.max(0.0));
        }

        let mut score = mean_or_perfect(&day_scores);

        for (category, count) in &trip_categories {
            let share = *count as f64 / total as f64;
            if share > self.max_category_share && *count > 3 {
                outcome.issues.push(format!(
                    "'{category}' makes up {:.0}% of the trip",
                    share * 100.0
                ));
            }
        }
        for essential in ESSENTIAL_GROUPS {
            if !trip_groups.contains(essential) {
                score -= 10.0;
                outcome.issues.push(format!("no {essential} activities in the trip"));
                outcome.suggestions.push(format!("add at least one {essential} stop"));
            }
        }
        score += (trip_groups.len() as f64 * 2.0).min(10.0);

        outcome.score = score.clamp(0.0, 100.0);
        outcome.detail("category_groups", trip_groups.len() as f64);
        outcome.detail("distinct_categories", trip_categories.len() as f64);
        outcome
    }
}
