use chrono::NaiveTime;

use super::{Metric, MetricOutcome, ScoringContext};
use crate::schedule::{Schedule, ScheduledActivity, TimeWindow};

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

const DINING: [&str; 4] = ["dining", "restaurant", "cafe", "food"];

/// Name fragments that betray a non-restaurant filed under dining.
const NOT_A_RESTAURANT: [&str; 12] = [
    "temple",
    "mandir",
    "masjid",
    "mosque",
    "church",
    "iskcon",
    "museum",
    "palace",
    "fort",
    "memorial",
    "gurudwara",
    "shrine",
];

/// Lunch and dinner present, well timed and sensibly placed in the day.
#[derive(Debug, Clone)]
pub struct MealTiming {
    pub weight: f64,
    pub lunch_ideal: TimeWindow,
    pub lunch_acceptable: TimeWindow,
    pub dinner_ideal: TimeWindow,
    pub dinner_acceptable: TimeWindow,
}

impl Default for MealTiming {
    fn default() -> Self {
        Self {
            weight: 0.20,
            lunch_ideal: TimeWindow::new(hm(12, 0), hm(14, 30)),
            lunch_acceptable: TimeWindow::new(hm(11, 0), hm(15, 30)),
            dinner_ideal: TimeWindow::new(hm(18, 30), hm(21, 0)),
            dinner_acceptable: TimeWindow::new(hm(17, 30), hm(22, 0)),
        }
    }
}

#[derive(Default)]
struct Tally {
    checks: u32,
    passed: u32,
    ideal: u32,
}

impl Tally {
    fn check(&mut self, ok: bool) -> bool {
        self.checks += 1;
        if ok {
            self.passed += 1;
        }
        ok
    }
}

fn is_dining(activity: &ScheduledActivity) -> bool {
    DINING.contains(&activity.stop.category.as_str())
}

impl Metric for MealTiming {
    fn name(&self) -> &'static str {
        "meal_timing"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, schedules: &[Schedule], _context: &ScoringContext) -> MetricOutcome {
        let mut outcome = MetricOutcome::default();
        if schedules.is_empty() {
            outcome.issues.push("no days to evaluate".into());
            return outcome;
        }

        let mut tally = Tally::default();
        let mut lunches = 0;
        let mut dinners = 0;

        for (index, schedule) in schedules.iter().enumerate() {
            let day = index + 1;
            let activities = &schedule.activities;
            let dining: Vec<usize> =
                (0..activities.len()).filter(|&i| is_dining(&activities[i])).collect();
            let find = |window: &TimeWindow| {
                dining
                    .iter()
                    .copied()
                    .find(|&i| window.contains(activities[i].start.time()))
            };

            let lunch = find(&self.lunch_acceptable);
            if tally.check(lunch.is_some()) {
                lunches += 1;
            } else {
                outcome.issues.push(format!("Day {day}: no lunch between 11:00 and 15:30"));
                outcome.suggestions.push(format!("Day {day}: add a lunch stop around 12:00-14:00"));
            }
            let dinner = find(&self.dinner_acceptable);
            if tally.check(dinner.is_some()) {
                dinners += 1;
            } else {
                outcome.issues.push(format!("Day {day}: no dinner between 17:30 and 22:00"));
                outcome
                    .suggestions
                    .push(format!("Day {day}: add a dinner stop around 19:00-20:30"));
            }

            if let Some(i) = lunch
                && self.lunch_ideal.contains(activities[i].start.time())
            {
                tally.ideal += 1;
            }
            if let Some(i) = dinner
                && self.dinner_ideal.contains(activities[i].start.time())
            {
                tally.ideal += 1;
            }

            if activities.len() >= 3 {
                if let Some(i) = lunch
                    && !tally.check(i >= 1 && i + 2 <= activities.len())
                {
                    let position = format!("{} of {}", i + 1, activities.len());
                    outcome.issues.push(format!("Day {day}: lunch is activity {position}"));
                }
                if let Some(i) = dinner
                    && !tally.check(i + 2 >= activities.len())
                {
                    let position = format!("{} of {}", i + 1, activities.len());
                    outcome.issues.push(format!("Day {day}: dinner is activity {position}"));
                }
            }

            for &i in &dining {
                let name = activities[i].stop.name.to_lowercase();
                if !tally.check(!NOT_A_RESTAURANT.iter().any(|keyword| name.contains(keyword))) {
                    outcome.issues.push(format!(
                        "Day {day}: '{}' does not look like a place to eat",
                        activities[i].stop.name
                    ));
                    outcome
                        .suggestions
                        .push(format!("Day {day}: replace it with an actual restaurant"));
                }
            }
        }

        outcome.score = if tally.checks == 0 {
            0.0
        } else {
            100.0 * f64::from(tally.passed) / f64::from(tally.checks)
        };
        outcome.detail("days", schedules.len() as f64);
        outcome.detail("lunches", f64::from(lunches));
        outcome.detail("dinners", f64::from(dinners));
        outcome.detail("meals_at_ideal_time", f64::from(tally.ideal));
        outcome
    }
}
