use super::{Metric, MetricOutcome, ScoringContext};
use crate::schedule::Schedule;

/// Activities happen while their stop is open. Unknown hours count as open.
#[derive(Debug, Clone)]
pub struct OpeningHoursCompliance {
    pub weight: f64,
}

impl Default for OpeningHoursCompliance {
    fn default() -> Self {
        Self { weight: 0.15 }
    }
}

impl Metric for OpeningHoursCompliance {
    fn name(&self) -> &'static str {
        "opening_hours"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, schedules: &[Schedule], _context: &ScoringContext) -> MetricOutcome {
        let mut outcome = MetricOutcome::default();
        let mut total = 0;
        let mut valid = 0;
        let mut unknown = 0;

        for (index, schedule) in schedules.iter().enumerate() {
            for activity in &schedule.activities {
                total += 1;
                let hours = &activity.stop.opening_hours;
                if !hours.is_known() {
                    unknown += 1;
                    valid += 1;
                } else if hours.covers(schedule.date, activity.start, activity.end) {
                    valid += 1;
                } else {
                    outcome.issues.push(format!(
                        "Day {}: '{}' is closed during {}-{}",
                        index + 1,
                        activity.stop.name,
                        activity.start.format("%H:%M"),
                        activity.end.format("%H:%M"),
                    ));
                    outcome.suggestions.push(format!(
                        "Day {}: move '{}' into its opening hours",
                        index + 1,
                        activity.stop.name
                    ));
                }
            }
        }

        outcome.score = if total == 0 {
            100.0
        } else {
            100.0 * f64::from(valid) / f64::from(total)
        };
        outcome.detail("activities", f64::from(total));
        outcome.detail("unknown_hours", f64::from(unknown));
        outcome
    }
}
