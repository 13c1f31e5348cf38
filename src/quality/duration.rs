use super::{Metric, MetricOutcome, ScoringContext};
use crate::schedule::{Schedule, ScheduledActivity};

/// Recommended `(min, max)` minutes by category, checked in order when
/// falling back to name fragments.
const RECOMMENDED: [(&str, (u32, u32)); 19] = [
    ("museum", (90, 180)),
    ("culture", (60, 150)),
    ("art_gallery", (60, 120)),
    ("temple", (30, 90)),
    ("religious", (30, 60)),
    ("attraction", (45, 120)),
    ("park", (45, 90)),
    ("garden", (30, 60)),
    ("nature", (45, 90)),
    ("zoo", (120, 240)),
    ("monument", (30, 60)),
    ("landmark", (30, 60)),
    ("tourist_attraction", (45, 90)),
    ("dining", (45, 90)),
    ("restaurant", (45, 90)),
    ("cafe", (30, 60)),
    ("fort", (90, 180)),
    ("palace", (60, 150)),
    ("default", (45, 90)),
];

const DEFAULT_RANGE: (u32, u32) = (45, 90);

/// Well-known sights whose visit length differs from their category.
const FAMOUS_PLACES: [(&str, (u32, u32)); 11] = [
    ("salar jung museum", (150, 240)),
    ("golconda fort", (120, 180)),
    ("chowmahalla palace", (90, 150)),
    ("science city", (120, 180)),
    ("taj mahal", (120, 180)),
    ("qutub minar", (60, 90)),
    ("red fort", (90, 150)),
    ("sabarmati ashram", (60, 90)),
    ("calico museum", (90, 150)),
    ("ajanta caves", (180, 300)),
    ("ellora caves", (180, 300)),
];

pub(crate) fn recommended_range(name: &str, category: &str) -> (u32, u32) {
    let name = name.to_lowercase();
    let category = category.to_lowercase();
    FAMOUS_PLACES
        .iter()
        .find(|(place, _)| name.contains(place))
        .or_else(|| RECOMMENDED.iter().find(|(key, _)| *key == category))
        .or_else(|| RECOMMENDED.iter().find(|(key, _)| name.contains(key)))
        .map_or(DEFAULT_RANGE, |(_, range)| *range)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fit {
    Appropriate,
    TooShort,
    TooLong,
}

/// Time spent at each stop suits what the stop is.
#[derive(Debug, Clone)]
pub struct DurationAppropriateness {
    pub weight: f64,
    /// Anything longer is unrealistic regardless of category.
    pub absolute_max_minutes: u32,
    /// Anything shorter is rushed regardless of category.
    pub absolute_min_minutes: u32,
}

impl Default for DurationAppropriateness {
    fn default() -> Self {
        Self {
            weight: 0.10,
            absolute_max_minutes: 480,
            absolute_min_minutes: 15,
        }
    }
}

impl DurationAppropriateness {
    fn fit(&self, minutes: u32, (min, max): (u32, u32)) -> Fit {
        if minutes > self.absolute_max_minutes {
            Fit::TooLong
        } else if minutes < self.absolute_min_minutes || minutes < min {
            Fit::TooShort
        } else if f64::from(minutes) > f64::from(max) * 1.5 {
            Fit::TooLong
        } else {
            Fit::Appropriate
        }
    }

    fn near_miss(minutes: u32, (min, max): (u32, u32)) -> bool {
        let minutes = f64::from(minutes);
        if minutes < f64::from(min) {
            minutes >= f64::from(min) * 0.8
        } else if minutes > f64::from(max) {
            minutes <= f64::from(max) * 1.2
        } else {
            false
        }
    }
}

impl Metric for DurationAppropriateness {
    fn name(&self) -> &'static str {
        "duration_appropriateness"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, schedules: &[Schedule], _context: &ScoringContext) -> MetricOutcome {
        let mut outcome = MetricOutcome::default();
        let activities: Vec<(usize, &ScheduledActivity)> = schedules
            .iter()
            .enumerate()
            .flat_map(|(index, schedule)| {
                schedule.activities.iter().map(move |activity| (index + 1, activity))
            })
            .collect();
        if activities.is_empty() {
            return MetricOutcome::perfect();
        }

        let mut appropriate = 0;
        let mut too_short = 0;
        let mut too_long = 0;
        let mut bonus = 0.0;

        for (day, activity) in &activities {
            let name = &activity.stop.name;
            let minutes = activity.duration_minutes;
            let range @ (min, max) = recommended_range(name, &activity.stop.category);
            match self.fit(minutes, range) {
                Fit::Appropriate => appropriate += 1,
                Fit::TooShort => {
                    too_short += 1;
                    outcome.issues.push(format!(
                        "Day {day}: '{name}' has {minutes} min (recommended {min}-{max} min)"
                    ));
                    outcome
                        .suggestions
                        .push(format!("Day {day}: allow at least {min} min for '{name}'"));
                }
                Fit::TooLong => {
                    too_long += 1;
                    outcome.issues.push(format!(
                        "Day {day}: '{name}' has {minutes} min (recommended {min}-{max} min)"
                    ));
                    outcome.suggestions.push(format!("Day {day}: reduce time at '{name}'"));
                }
            }
            if Self::near_miss(minutes, range) {
                bonus += 5.0;
            }
        }

        let total = activities.len() as f64;
        outcome.score = (100.0 * f64::from(appropriate) / total + bonus).min(100.0);
        let average = activities
            .iter()
            .map(|(_, a)| f64::from(a.duration_minutes))
            .sum::<f64>()
            / total;
        outcome.detail("activities", total);
        outcome.detail("too_short", f64::from(too_short));
        outcome.detail("too_long", f64::from(too_long));
        outcome.detail("average_minutes", (average * 10.0).round() / 10.0);
        outcome
    }
}
