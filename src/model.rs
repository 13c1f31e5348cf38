//! Domain model: requests, stops, legs and plans.
//!
//! A `Plan` never stores aggregate totals; they are derived from its legs and
//! groups every time they are asked for.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::haversine::haversine_km;
use crate::polyline::Polyline;

/// Daily activity pace requested by the traveller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Relaxed,
    #[default]
    Moderate,
    Packed,
}

impl Pace {
    /// Multiplier applied to base service durations.
    pub fn duration_multiplier(self) -> f64 {
        match self {
            Pace::Relaxed => 1.3,
            Pace::Moderate => 1.0,
            Pace::Packed => 0.8,
        }
    }
}

/// A caller's trip request. Never mutated once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub origin: String,
    pub origin_location: Option<GeoPoint>,
    pub region: Option<String>,
    pub destinations: Vec<String>,
    pub total_days: u32,
    pub start_date: NaiveDate,
    pub interests: BTreeSet<String>,
    pub pace: Pace,
    pub return_to_origin: bool,
    pub must_include: Vec<String>,
    pub avoid: Vec<String>,
}

impl PlanRequest {
    pub fn new(origin: impl Into<String>, total_days: u32, start_date: NaiveDate) -> Self {
        Self {
            origin: origin.into(),
            origin_location: None,
            region: None,
            destinations: Vec::new(),
            total_days,
            start_date,
            interests: BTreeSet::new(),
            pace: Pace::Moderate,
            return_to_origin: false,
            must_include: Vec::new(),
            avoid: Vec::new(),
        }
    }

    pub fn origin_location(mut self, location: GeoPoint) -> Self {
        self.origin_location = Some(location);
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn destination(mut self, name: impl Into<String>) -> Self {
        self.destinations.push(name.into());
        self
    }

    pub fn interest(mut self, tag: impl Into<String>) -> Self {
        self.interests.insert(tag.into().to_lowercase());
        self
    }

    pub fn pace(mut self, pace: Pace) -> Self {
        self.pace = pace;
        self
    }

    pub fn return_to_origin(mut self, value: bool) -> Self {
        self.return_to_origin = value;
        self
    }

    pub fn must_include(mut self, name: impl Into<String>) -> Self {
        self.must_include.push(name.into());
        self
    }

    pub fn avoid(mut self, name: impl Into<String>) -> Self {
        self.avoid.push(name.into());
        self
    }
}

/// WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in kilometers.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(*self, *other)
    }
}

/// One opening window. `weekday: None` applies to every day.
///
/// A `close` at or before `open` means the venue closes after midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningInterval {
    pub weekday: Option<Weekday>,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Opening hours of a stop. Empty means unknown, which is treated as always open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub intervals: Vec<OpeningInterval>,
}

impl OpeningHours {
    pub fn always() -> Self {
        Self::default()
    }

    /// Same hours every day.
    pub fn daily(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            intervals: vec![OpeningInterval { weekday: None, open, close }],
        }
    }

    pub fn with_interval(
        mut self,
        weekday: Option<Weekday>,
        open: NaiveTime,
        close: NaiveTime,
    ) -> Self {
        self.intervals.push(OpeningInterval { weekday, open, close });
        self
    }

    pub fn is_known(&self) -> bool {
        !self.intervals.is_empty()
    }

    /// Absolute open intervals on `date`, sorted by opening instant.
    ///
    /// Returns `None` when hours are unknown (always open), and an empty vector
    /// when the stop is closed all day.
    pub fn intervals_on(&self, date: NaiveDate) -> Option<Vec<(NaiveDateTime, NaiveDateTime)>> {
        if !self.is_known() {
            return None;
        }
        let weekday = date.weekday();
        let mut windows: Vec<(NaiveDateTime, NaiveDateTime)> = self
            .intervals
            .iter()
            .filter(|interval| interval.weekday.is_none_or(|day| day == weekday))
            .map(|interval| {
                let start = date.and_time(interval.open);
                let end = if interval.close > interval.open {
                    date.and_time(interval.close)
                } else {
                    (date + Duration::days(1)).and_time(interval.close)
                };
                (start, end)
            })
            .collect();
        windows.sort();
        Some(windows)
    }

    /// Whether `[start, end)` lies fully inside one open interval on `date`.
    pub fn covers(&self, date: NaiveDate, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        match self.intervals_on(date) {
            None => true,
            Some(windows) => windows.iter().any(|(open, close)| *open <= start && end <= *close),
        }
    }

    /// Earliest opening time on any day.
    pub fn earliest_opening(&self) -> Option<NaiveTime> {
        self.intervals.iter().map(|interval| interval.open).min()
    }
}

/// Who supplied a stop or a leg's numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Planner,
    /// Figures confirmed by a routing or transit service.
    Provider,
    /// Computed locally from straight-line distance.
    Estimate,
}

/// A single place to visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub category: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub opening_hours: OpeningHours,
    pub suggested_duration_minutes: Option<u32>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Stop {
    pub fn new(id: impl Into<String>, category: impl Into<String>, location: GeoPoint) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category: category.into().to_lowercase(),
            location,
            opening_hours: OpeningHours::always(),
            suggested_duration_minutes: None,
            provenance: Provenance::Planner,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn hours(mut self, hours: OpeningHours) -> Self {
        self.opening_hours = hours;
        self
    }

    pub fn suggested_duration(mut self, minutes: u32) -> Self {
        self.suggested_duration_minutes = Some(minutes);
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.provenance = Provenance::Provider;
        self
    }
}

/// Stops belonging to one scheduling unit: a city over its allocated days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopGroup {
    pub name: String,
    pub country: String,
    pub days: u32,
    pub location: Option<GeoPoint>,
    pub stops: Vec<Stop>,
    pub why_visit: String,
}

impl StopGroup {
    pub fn new(name: impl Into<String>, days: u32) -> Self {
        Self {
            name: name.into(),
            country: String::new(),
            days,
            location: None,
            stops: Vec::new(),
            why_visit: String::new(),
        }
    }

    pub fn location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn stop(mut self, stop: Stop) -> Self {
        self.stops.push(stop);
        self
    }
}

/// How a leg is travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Flight,
    Train,
    Bus,
    Car,
    Ferry,
    Walk,
    Drive,
    Transit,
}

impl TransportMode {
    /// Modes that follow the road network.
    pub fn is_road(self) -> bool {
        matches!(self, TransportMode::Car | TransportMode::Drive | TransportMode::Bus)
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportMode::Flight => "flight",
            TransportMode::Train => "train",
            TransportMode::Bus => "bus",
            TransportMode::Car => "car",
            TransportMode::Ferry => "ferry",
            TransportMode::Walk => "walk",
            TransportMode::Drive => "drive",
            TransportMode::Transit => "transit",
        };
        f.write_str(name)
    }
}

/// Duration and distance of a leg, always produced together by one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegMetrics {
    pub duration_minutes: u32,
    pub distance_km: Option<f64>,
    pub fare: Option<String>,
    #[serde(default)]
    pub transfers: u32,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub geometry: Option<Polyline>,
    pub source: Provenance,
}

impl LegMetrics {
    pub fn new(duration_minutes: u32, distance_km: Option<f64>, source: Provenance) -> Self {
        Self {
            duration_minutes,
            distance_km,
            fare: None,
            transfers: 0,
            departure: None,
            arrival: None,
            geometry: None,
            source,
        }
    }
}

/// Where a leg stands in the enrichment lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LegStatus {
    #[default]
    Proposed,
    Enriched,
    /// The provider does not serve this mode; planner numbers kept.
    Skipped,
    /// The provider call failed; planner numbers kept.
    Failed { reason: String },
}

/// A directed travel connection between two cities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub from: String,
    pub to: String,
    pub from_location: Option<GeoPoint>,
    pub to_location: Option<GeoPoint>,
    pub mode: TransportMode,
    pub metrics: Option<LegMetrics>,
    pub notes: String,
    #[serde(default)]
    pub status: LegStatus,
}

impl Leg {
    pub fn new(from: impl Into<String>, to: impl Into<String>, mode: TransportMode) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            from_location: None,
            to_location: None,
            mode,
            metrics: None,
            notes: String::new(),
            status: LegStatus::Proposed,
        }
    }

    pub fn estimate(mut self, duration_minutes: u32, distance_km: Option<f64>) -> Self {
        self.metrics = Some(LegMetrics::new(duration_minutes, distance_km, Provenance::Planner));
        self
    }

    pub fn duration_minutes(&self) -> Option<u32> {
        self.metrics.as_ref().map(|metrics| metrics.duration_minutes)
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.metrics.as_ref().and_then(|metrics| metrics.distance_km)
    }

    /// Straight-line distance between the endpoints, when both are located.
    pub fn straight_line_km(&self) -> Option<f64> {
        match (self.from_location, self.to_location) {
            (Some(from), Some(to)) => Some(from.distance_km(&to)),
            _ => None,
        }
    }

    /// Overwrite numbers with provider-confirmed metrics.
    pub fn apply(&mut self, metrics: LegMetrics) {
        self.metrics = Some(metrics);
        self.status = LegStatus::Enriched;
    }
}

/// The structural proposal: ordered city groups plus the legs connecting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub theme: String,
    pub summary: String,
    pub origin: String,
    pub groups: Vec<StopGroup>,
    pub legs: Vec<Leg>,
}

impl Plan {
    /// Sum of per-group day allocations.
    pub fn total_days(&self) -> u32 {
        self.groups.iter().map(|group| group.days).sum()
    }

    /// Total known travel time across all legs.
    pub fn total_travel_minutes(&self) -> u32 {
        self.legs
            .iter()
            .filter_map(Leg::duration_minutes)
            .fold(0, u32::saturating_add)
    }

    /// Total known travel distance across all legs.
    pub fn total_distance_km(&self) -> f64 {
        self.legs.iter().filter_map(Leg::distance_km).sum()
    }

    pub fn city_names(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.name.as_str()).collect()
    }

    /// Route as `Origin → A → B`.
    pub fn route_string(&self) -> String {
        std::iter::once(self.origin.as_str())
            .chain(self.groups.iter().map(|group| group.name.as_str()))
            .collect::<Vec<_>>()
            .join(" → ")
    }

    pub fn group(&self, name: &str) -> Option<&StopGroup> {
        self.groups.iter().find(|group| group.name.eq_ignore_ascii_case(name))
    }
}
