//! Builders for requests and planner drafts.

use chrono::NaiveDate;

use trip_planner::draft::{CityDraft, LegDraft, PlanDraft};
use trip_planner::model::{Pace, PlanRequest, TransportMode};

use super::france_places::{BORDEAUX, City, LYON, MARSEILLE, NICE, PARIS};

/// A Monday in spring.
pub fn trip_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
}

/// Round trip from Bordeaux.
pub fn france_request(total_days: u32) -> PlanRequest {
    PlanRequest::new(BORDEAUX.name, total_days, trip_start())
        .origin_location(BORDEAUX.point())
        .region("France")
        .interest("history")
        .interest("food")
        .pace(Pace::Moderate)
        .return_to_origin(true)
}

/// Assembles a `PlanDraft` the way a planner would return it.
#[derive(Debug, Clone)]
pub struct DraftBuilder {
    draft: PlanDraft,
}

impl DraftBuilder {
    pub fn new(theme: &str) -> Self {
        Self {
            draft: PlanDraft {
                theme: theme.to_string(),
                summary: String::new(),
                cities: Vec::new(),
                travel_legs: Vec::new(),
            },
        }
    }

    pub fn city(mut self, city: &City, days: u32) -> Self {
        self.draft.cities.push(CityDraft {
            name: city.name.to_string(),
            country: city.country.to_string(),
            days,
            highlights: city.places.iter().map(|place| place.highlight()).collect(),
            why_visit: String::new(),
            latitude: Some(city.lat),
            longitude: Some(city.lng),
        });
        self
    }

    pub fn leg(mut self, from: &City, to: &City, mode: TransportMode, hours: f64, km: f64) -> Self {
        self.draft.travel_legs.push(LegDraft {
            from_city: from.name.to_string(),
            to_city: to.name.to_string(),
            mode,
            duration_hours: hours,
            distance_km: Some(km),
            notes: String::new(),
            estimated_cost: None,
        });
        self
    }

    pub fn build(self) -> PlanDraft {
        self.draft
    }
}

/// Ten days: Paris 4, Lyon 3, Marseille 3, back to Bordeaux. Four legs.
pub fn france_tour() -> PlanDraft {
    DraftBuilder::new("History and food of France")
        .city(&PARIS, 4)
        .city(&LYON, 3)
        .city(&MARSEILLE, 3)
        .leg(&BORDEAUX, &PARIS, TransportMode::Train, 2.1, 500.0)
        .leg(&PARIS, &LYON, TransportMode::Train, 2.0, 390.0)
        .leg(&LYON, &MARSEILLE, TransportMode::Train, 1.7, 280.0)
        .leg(&MARSEILLE, &BORDEAUX, TransportMode::Train, 6.0, 510.0)
        .build()
}

/// The same tour with one day moved from Paris to Lyon.
pub fn france_tour_longer_lyon() -> PlanDraft {
    DraftBuilder::new("History and food of France")
        .city(&PARIS, 3)
        .city(&LYON, 4)
        .city(&MARSEILLE, 3)
        .leg(&BORDEAUX, &PARIS, TransportMode::Train, 2.1, 500.0)
        .leg(&PARIS, &LYON, TransportMode::Train, 2.0, 390.0)
        .leg(&LYON, &MARSEILLE, TransportMode::Train, 1.7, 280.0)
        .leg(&MARSEILLE, &BORDEAUX, TransportMode::Train, 6.0, 510.0)
        .build()
}

/// Ten days down to the Riviera: Paris 3, Lyon 2, Marseille 3, Nice 2. Five legs.
pub fn riviera_tour() -> PlanDraft {
    DraftBuilder::new("Paris to the Riviera")
        .city(&PARIS, 3)
        .city(&LYON, 2)
        .city(&MARSEILLE, 3)
        .city(&NICE, 2)
        .leg(&BORDEAUX, &PARIS, TransportMode::Train, 2.1, 500.0)
        .leg(&PARIS, &LYON, TransportMode::Train, 2.0, 390.0)
        .leg(&LYON, &MARSEILLE, TransportMode::Train, 1.7, 280.0)
        .leg(&MARSEILLE, &NICE, TransportMode::Car, 2.3, 200.0)
        .leg(&NICE, &BORDEAUX, TransportMode::Flight, 1.3, 640.0)
        .build()
}
