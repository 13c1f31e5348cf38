//! Real French cities and points of interest.
//!
//! Coordinates sourced from OpenStreetMap. The Paris sights all fall inside
//! the Île-de-France extract used by the OSRM integration test.

use trip_planner::model::{GeoPoint, Stop};
use trip_planner::draft::HighlightDraft;

/// A named sight with coordinates and a category.
#[derive(Debug, Clone)]
pub struct Place {
    pub name: &'static str,
    pub category: &'static str,
    pub lat: f64,
    pub lng: f64,
    /// Suggested visit length in hours.
    pub hours: f64,
}

impl Place {
    pub const fn new(
        name: &'static str,
        category: &'static str,
        lat: f64,
        lng: f64,
        hours: f64,
    ) -> Self {
        Self {
            name,
            category,
            lat,
            lng,
            hours,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    pub fn stop(&self, id: &str) -> Stop {
        Stop::new(id, self.category, self.point())
            .name(self.name)
            .suggested_duration((self.hours * 60.0).round() as u32)
    }

    pub fn highlight(&self) -> HighlightDraft {
        HighlightDraft {
            name: self.name.to_string(),
            description: String::new(),
            category: self.category.to_string(),
            suggested_duration_hours: Some(self.hours),
            latitude: Some(self.lat),
            longitude: Some(self.lng),
        }
    }
}

/// A destination city and the sights a planner would suggest there.
#[derive(Debug, Clone)]
pub struct City {
    pub name: &'static str,
    pub country: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub places: &'static [Place],
}

impl City {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

pub const BORDEAUX: City = City {
    name: "Bordeaux",
    country: "France",
    lat: 44.8378,
    lng: -0.5792,
    places: &[],
};

// ============================================================================
// Paris
// ============================================================================

pub const PARIS_PLACES: &[Place] = &[
    Place::new("Louvre Museum", "museum", 48.8606, 2.3376, 3.0),
    Place::new("Musée d'Orsay", "museum", 48.8600, 2.3266, 2.5),
    Place::new("Notre-Dame de Paris", "church", 48.8530, 2.3499, 1.0),
    Place::new("Sainte-Chapelle", "church", 48.8554, 2.3450, 1.0),
    Place::new("Jardin du Luxembourg", "park", 48.8462, 2.3372, 1.0),
    Place::new("Panthéon", "landmark", 48.8462, 2.3464, 1.0),
    Place::new("Le Procope", "restaurant", 48.8530, 2.3388, 1.5),
    Place::new("Eiffel Tower", "landmark", 48.8584, 2.2945, 2.0),
    Place::new("Arc de Triomphe", "landmark", 48.8738, 2.2950, 1.0),
    Place::new("Marché des Enfants Rouges", "market", 48.8627, 2.3618, 1.0),
    Place::new("Chez Janou", "restaurant", 48.8577, 2.3666, 1.5),
    Place::new("Sacré-Cœur", "church", 48.8867, 2.3431, 1.0),
];

pub const PARIS: City = City {
    name: "Paris",
    country: "France",
    lat: 48.8566,
    lng: 2.3522,
    places: PARIS_PLACES,
};

// ============================================================================
// Lyon
// ============================================================================

pub const LYON_PLACES: &[Place] = &[
    Place::new("Basilique Notre-Dame de Fourvière", "church", 45.7623, 4.8226, 1.0),
    Place::new("Cathédrale Saint-Jean", "church", 45.7606, 4.8272, 0.75),
    Place::new("Musée des Confluences", "museum", 45.7326, 4.8180, 2.0),
    Place::new("Parc de la Tête d'Or", "park", 45.7772, 4.8554, 1.5),
    Place::new("Les Halles Paul Bocuse", "market", 45.7632, 4.8506, 1.0),
    Place::new("Place Bellecour", "landmark", 45.7578, 4.8320, 0.5),
    Place::new("Daniel et Denise", "restaurant", 45.7609, 4.8269, 1.5),
];

pub const LYON: City = City {
    name: "Lyon",
    country: "France",
    lat: 45.7640,
    lng: 4.8357,
    places: LYON_PLACES,
};

// ============================================================================
// Marseille
// ============================================================================

pub const MARSEILLE_PLACES: &[Place] = &[
    Place::new("Notre-Dame de la Garde", "church", 43.2841, 5.3713, 1.0),
    Place::new("Vieux-Port", "landmark", 43.2951, 5.3740, 1.0),
    Place::new("MuCEM", "museum", 43.2966, 5.3608, 2.0),
    Place::new("Le Panier", "neighborhood", 43.2990, 5.3680, 1.5),
    Place::new("Palais Longchamp", "park", 43.3045, 5.3945, 1.0),
    Place::new("Chez Fonfon", "restaurant", 43.2802, 5.3505, 1.5),
];

pub const MARSEILLE: City = City {
    name: "Marseille",
    country: "France",
    lat: 43.2965,
    lng: 5.3698,
    places: MARSEILLE_PLACES,
};

// ============================================================================
// Nice
// ============================================================================

pub const NICE_PLACES: &[Place] = &[
    Place::new("Promenade des Anglais", "landmark", 43.6950, 7.2650, 1.0),
    Place::new("Colline du Château", "viewpoint", 43.6951, 7.2803, 1.0),
    Place::new("Musée Matisse", "museum", 43.7196, 7.2760, 1.5),
    Place::new("Cours Saleya", "market", 43.6955, 7.2751, 1.0),
    Place::new("Chez Pipo", "restaurant", 43.7010, 7.2870, 1.0),
];

pub const NICE: City = City {
    name: "Nice",
    country: "France",
    lat: 43.7102,
    lng: 7.2620,
    places: NICE_PLACES,
};
