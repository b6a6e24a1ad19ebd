//! Locations, region labels and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for all distance computations.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, accuracy: f32) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy >= 0.0
    }
}

/// Region identity. Two aggregates belong to the same region iff their labels
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionLabel {
    pub country: String,
    pub city: String,
}

impl RegionLabel {
    pub fn new(country: &str, city: &str) -> Self {
        Self {
            country: country.to_string(),
            city: city.to_string(),
        }
    }
}

impl std::fmt::Display for RegionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.country, self.city)
    }
}

/// A configured region: a labelled circle on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRegion {
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

impl NamedRegion {
    pub fn label(&self) -> RegionLabel {
        RegionLabel::new(&self.country, &self.city)
    }

    pub fn contains(&self, location: &Location) -> bool {
        haversine_distance_m(
            self.latitude,
            self.longitude,
            location.latitude,
            location.longitude,
        ) <= self.radius_m
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}
