use super::{Metric, MetricOutcome, ScoringContext, mean_or_perfect};
use crate::model::GeoPoint;
use crate::schedule::Schedule;

/// Moves shorter than this are never counted as backtracking.
const BACKTRACK_MIN_KM: f64 = 1.5;
/// Net displacement over distance travelled below which two moves backtrack.
const BACKTRACK_RATIO: f64 = 0.3;

/// Consecutive pairs of moves that return close to where they started.
pub(crate) fn count_backtracks(points: &[GeoPoint]) -> usize {
    points
        .windows(3)
        .filter(|w| {
            let first = w[0].distance_km(&w[1]);
            let second = w[1].distance_km(&w[2]);
            if first < BACKTRACK_MIN_KM || second < BACKTRACK_MIN_KM {
                return false;
            }
            w[0].distance_km(&w[2]) / (first + second) < BACKTRACK_RATIO
        })
        .count()
}

/// Activities within a day stay close together.
#[derive(Debug, Clone)]
pub struct GeographicClustering {
    pub weight: f64,
    pub max_gap_km: f64,
    pub ideal_gap_km: f64,
    pub max_daily_km: f64,
    pub ideal_daily_km: f64,
}

impl Default for GeographicClustering {
    fn default() -> Self {
        Self {
            weight: 0.15,
            max_gap_km: 5.0,
            ideal_gap_km: 2.0,
            max_daily_km: 30.0,
            ideal_daily_km: 15.0,
        }
    }
}

impl Metric for GeographicClustering {
    fn name(&self) -> &'static str {
        "geographic_clustering"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, schedules: &[Schedule], _context: &ScoringContext) -> MetricOutcome {
        let mut outcome = MetricOutcome::default();
        let mut day_scores = Vec::with_capacity(schedules.len());
        let mut total_km = 0.0;
        let mut max_gap: f64 = 0.0;
        let mut backtracks = 0;

        for (index, schedule) in schedules.iter().enumerate() {
            let day = index + 1;
            let activities = &schedule.activities;
            if activities.len() < 2 {
                day_scores.push(100.0);
                continue;
            }

            let points: Vec<GeoPoint> =
                activities.iter().map(|activity| activity.stop.location).collect();
            let mut penalty = 0.0;
            let mut day_km = 0.0;
            for (i, pair) in points.windows(2).enumerate() {
                let gap = pair[0].distance_km(&pair[1]);
                day_km += gap;
                max_gap = max_gap.max(gap);
                if gap > self.max_gap_km {
                    penalty += 15.0;
                    outcome.issues.push(format!(
                        "Day {day}: {gap:.1} km between '{}' and '{}'",
                        activities[i].stop.name,
                        activities[i + 1].stop.name
                    ));
                    outcome
                        .suggestions
                        .push(format!("Day {day}: reorder activities or pick closer alternatives"));
                } else if gap > self.ideal_gap_km {
                    penalty += (gap - self.ideal_gap_km) * 3.0;
                }
            }

            if day_km > self.max_daily_km {
                penalty += 20.0;
            } else if day_km > self.ideal_daily_km {
                penalty += (day_km - self.ideal_daily_km) * 1.5;
            }

            let day_backtracks = count_backtracks(&points);
            if day_backtracks > 0 {
                penalty += 10.0 * day_backtracks as f64;
                outcome
                    .issues
                    .push(format!("Day {day}: {day_backtracks} backtracking move(s)"));
            }

            total_km += day_km;
            backtracks += day_backtracks;
            day_scores.push((100.0 - penalty).max(0.0));
        }

        outcome.score = mean_or_perfect(&day_scores);
        outcome.detail("total_distance_km", total_km);
        outcome.detail("max_gap_km", max_gap);
        outcome.detail("backtracks", backtracks as f64);
        outcome
    }
}

/// Travel time between activities stays manageable.
#[derive(Debug, Clone)]
pub struct TravelEfficiency {
    pub weight: f64,
    pub max_hop_minutes: u32,
    pub ideal_hop_minutes: u32,
    pub max_daily_minutes: u32,
    pub ideal_daily_minutes: u32,
}

impl Default for TravelEfficiency {
    fn default() -> Self {
        Self {
            weight: 0.15,
            max_hop_minutes: 45,
            ideal_hop_minutes: 20,
            max_daily_minutes: 120,
            ideal_daily_minutes: 60,
        }
    }
}

impl Metric for TravelEfficiency {
    fn name(&self) -> &'static str {
        "travel_efficiency"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn evaluate(&self, schedules: &[Schedule], _context: &ScoringContext) -> MetricOutcome {
        let mut outcome = MetricOutcome::default();
        let mut day_scores = Vec::with_capacity(schedules.len());
        let mut total_minutes = 0;
        let mut longest = 0;

        for (index, schedule) in schedules.iter().enumerate() {
            let day = index + 1;
            let activities = &schedule.activities;
            let mut penalty = 0.0;
            let mut day_minutes = 0;

            for (i, activity) in activities.iter().enumerate() {
                let Some(minutes) = activity.travel_to_next_minutes else { continue };
                day_minutes += minutes;
                longest = longest.max(minutes);
                if minutes > self.max_hop_minutes {
                    penalty += 20.0;
                    let next = activities.get(i + 1).map_or("", |next| next.stop.name.as_str());
                    outcome.issues.push(format!(
                        "Day {day}: {minutes} min from '{}' to '{next}'",
                        activity.stop.name
                    ));
                    outcome
                        .suggestions
                        .push(format!("Day {day}: reorder activities or use faster transport"));
                } else if minutes > self.ideal_hop_minutes {
                    penalty += f64::from(minutes - self.ideal_hop_minutes) * 0.5;
                }
            }

            if day_minutes > self.max_daily_minutes {
                penalty += 25.0;
            } else if day_minutes > self.ideal_daily_minutes {
                penalty += f64::from(day_minutes - self.ideal_daily_minutes) * 0.3;
            }

            total_minutes += day_minutes;
            day_scores.push((100.0 - penalty).max(0.0));
        }

        outcome.score = mean_or_perfect(&day_scores);
        outcome.detail("total_travel_minutes", f64::from(total_minutes));
        outcome.detail("longest_hop_minutes", f64::from(longest));
        outcome
    }
}
