//! Time-slot assignment for one ordered day of stops.
//!
//! The builder is a pure time assignment over the order it is given: it never
//! adds, drops or reorders stops. Problems are reported by a separate,
//! non-mutating validation pass.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Pace, Stop};

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// A daily time-of-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Default service minutes per category.
pub fn default_base_durations() -> BTreeMap<String, u32> {
    [
        ("museum", 90),
        ("art_gallery", 60),
        ("church", 30),
        ("hindu_temple", 45),
        ("mosque", 45),
        ("place_of_worship", 30),
        ("historical_landmark", 45),
        ("monument", 30),
        ("palace", 60),
        ("castle", 60),
        ("fort", 60),
        ("park", 60),
        ("garden", 45),
        ("zoo", 120),
        ("aquarium", 90),
        ("national_park", 120),
        ("beach", 90),
        ("amusement_park", 180),
        ("tourist_attraction", 45),
        ("stadium", 30),
        ("movie_theater", 150),
        ("performing_arts_theater", 120),
        ("restaurant", 75),
        ("cafe", 45),
        ("bar", 60),
        ("bakery", 20),
        ("coffee_shop", 30),
        ("shopping_mall", 90),
        ("market", 60),
        ("clothing_store", 45),
    ]
    .into_iter()
    .map(|(category, minutes)| (category.to_string(), minutes))
    .collect()
}

/// Categories that count as a meal.
pub fn default_dining_categories() -> BTreeSet<String> {
    ["restaurant", "cafe", "bakery", "bar", "food"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub lunch_window: TimeWindow,
    pub dinner_window: TimeWindow,
    /// Slack added after every travel leg.
    pub buffer_minutes: u32,
    pub pace: Pace,
    pub base_durations: BTreeMap<String, u32>,
    /// Used for categories missing from `base_durations`.
    pub default_duration_minutes: u32,
    /// Service durations are rounded to a multiple of this.
    pub rounding_minutes: u32,
    /// Delay dining stops to the lunch/dinner windows.
    pub align_meals: bool,
    /// Report days without any dining stop.
    pub require_dining: bool,
    pub dining_categories: BTreeSet<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_start: hm(9, 0),
            day_end: hm(21, 0),
            lunch_window: TimeWindow::new(hm(12, 0), hm(14, 0)),
            dinner_window: TimeWindow::new(hm(18, 30), hm(21, 0)),
            buffer_minutes: 15,
            pace: Pace::Moderate,
            base_durations: default_base_durations(),
            default_duration_minutes: 45,
            rounding_minutes: 15,
            align_meals: true,
            require_dining: true,
            dining_categories: default_dining_categories(),
        }
    }
}

impl ScheduleConfig {
    pub fn with_pace(mut self, pace: Pace) -> Self {
        self.pace = pace;
        self
    }

    pub fn is_dining(&self, stop: &Stop) -> bool {
        self.dining_categories.contains(&stop.category)
    }
}

/// One stop with its absolute time slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledActivity {
    pub stop: Stop,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: u32,
    /// Travel time of the leg to the following activity, if any.
    pub travel_to_next_minutes: Option<u32>,
}

/// A single date's timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: NaiveDate,
    pub activities: Vec<ScheduledActivity>,
}

impl Schedule {
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn total_travel_minutes(&self) -> u32 {
        self.activities.iter().filter_map(|activity| activity.travel_to_next_minutes).sum()
    }

    /// `end[i] <= start[i + 1]` for every consecutive pair.
    pub fn is_monotonic(&self) -> bool {
        self.activities.windows(2).all(|pair| pair[0].end <= pair[1].start)
    }
}

/// A non-fatal problem found in a built schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleIssue {
    Overlap { previous: String, next: String },
    OutsideOpeningHours { stop: String },
    PastDayEnd { stop: String, end: NaiveDateTime },
    MissingDining,
}

impl fmt::Display for ScheduleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleIssue::Overlap { previous, next } => {
                write!(f, "{previous} ends after {next} starts")
            }
            ScheduleIssue::OutsideOpeningHours { stop } => {
                write!(f, "{stop} is scheduled outside its opening hours")
            }
            ScheduleIssue::PastDayEnd { stop, end } => {
                write!(f, "{stop} ends at {} after the end of the day", end.format("%H:%M"))
            }
            ScheduleIssue::MissingDining => f.write_str("no meal stop scheduled"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleBuilder {
    config: ScheduleConfig,
}

impl ScheduleBuilder {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Service minutes for `stop`: its own suggestion or the category base,
    /// scaled by pace and rounded.
    pub fn service_minutes(&self, stop: &Stop) -> u32 {
        let base = stop.suggested_duration_minutes.unwrap_or_else(|| {
            self.config
                .base_durations
                .get(&stop.category)
                .copied()
                .unwrap_or(self.config.default_duration_minutes)
        });
        let adjusted = (f64::from(base) * self.config.pace.duration_multiplier()) as u32;
        let step = self.config.rounding_minutes.max(1);
        let rounded = adjusted.saturating_add(step / 2) / step * step;
        rounded.max(step)
    }

    /// Assign start/end times to `stops` in order.
    ///
    /// `leg_minutes[i]` is the travel time from stop `i` to stop `i + 1`; a
    /// missing value counts as zero.
    pub fn build(
        &self,
        stops: &[Stop],
        leg_minutes: &[u32],
        date: NaiveDate,
    ) -> (Schedule, Vec<ScheduleIssue>) {
        let config = &self.config;
        let mut clock = date.and_time(config.day_start);
        let mut activities = Vec::with_capacity(stops.len());
        let mut meals = 0;
        let mut had_dinner = false;

        for (i, stop) in stops.iter().enumerate() {
            let minutes = self.service_minutes(stop);
            let duration = Duration::minutes(i64::from(minutes));

            if config.align_meals && config.is_dining(stop) {
                meals += 1;
                let window = if meals == 1 && clock.time() < config.dinner_window.start {
                    Some(config.lunch_window)
                } else if !had_dinner {
                    had_dinner = true;
                    Some(config.dinner_window)
                } else {
                    None
                };
                if let Some(window) = window
                    && clock.time() < window.start
                {
                    debug!(
                        stop = %stop.name,
                        from = %clock.time(),
                        to = %window.start,
                        "waiting for meal window"
                    );
                    clock = date.and_time(window.start);
                }
            }

            let start = fit_opening_hours(stop, clock, duration, date);
            if start != clock {
                debug!(
                    stop = %stop.name,
                    from = %clock.time(),
                    to = %start.time(),
                    "delayed to opening hours"
                );
            }
            let end = start + duration;
            let travel = if i + 1 < stops.len() {
                Some(leg_minutes.get(i).copied().unwrap_or(0))
            } else {
                None
            };

            activities.push(ScheduledActivity {
                stop: stop.clone(),
                start,
                end,
                duration_minutes: minutes,
                travel_to_next_minutes: travel,
            });

            clock = end + Duration::minutes(i64::from(travel.unwrap_or(0) + config.buffer_minutes));
        }

        let schedule = Schedule { date, activities };
        let issues = self.validate(&schedule);
        (schedule, issues)
    }

    /// Check a schedule without modifying it.
    pub fn validate(&self, schedule: &Schedule) -> Vec<ScheduleIssue> {
        let config = &self.config;
        let mut issues = Vec::new();

        for pair in schedule.activities.windows(2) {
            if pair[0].end > pair[1].start {
                issues.push(ScheduleIssue::Overlap {
                    previous: pair[0].stop.name.clone(),
                    next: pair[1].stop.name.clone(),
                });
            }
        }

        let day_end = schedule.date.and_time(config.day_end);
        for activity in &schedule.activities {
            if !activity
                .stop
                .opening_hours
                .covers(schedule.date, activity.start, activity.end)
            {
                issues.push(ScheduleIssue::OutsideOpeningHours {
                    stop: activity.stop.name.clone(),
                });
            }
        }
        if let Some(last) = schedule.activities.last()
            && last.end > day_end
        {
            issues.push(ScheduleIssue::PastDayEnd {
                stop: last.stop.name.clone(),
                end: last.end,
            });
        }

        if config.require_dining
            && !schedule.is_empty()
            && !schedule.activities.iter().any(|activity| config.is_dining(&activity.stop))
        {
            issues.push(ScheduleIssue::MissingDining);
        }

        issues
    }
}

/// Earliest start at or after `earliest` where the whole visit fits inside
/// one opening interval on `date`.
///
/// With no fitting interval the stop is delayed to its next opening later
/// that day, or left at `earliest` when there is none.
fn fit_opening_hours(
    stop: &Stop,
    earliest: NaiveDateTime,
    duration: Duration,
    date: NaiveDate,
) -> NaiveDateTime {
    let Some(windows) = stop.opening_hours.intervals_on(date) else {
        return earliest;
    };

    for &(open, close) in &windows {
        let start = earliest.max(open);
        if start + duration <= close {
            return start;
        }
    }

    windows
        .iter()
        .map(|(open, _)| *open)
        .find(|open| *open > earliest)
        .unwrap_or(earliest)
}
