use serde::{Deserialize, Serialize};

/// A geographic coordinate the user picked, optionally labeled with the
/// place name it came from. Replaced wholesale on change, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RoutePoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            name: None,
        }
    }

    pub fn named(lat: f64, lng: f64, name: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            name: Some(name.into()),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Coordinate equality, ignoring the label.
    pub fn coords_eq(&self, other: &RoutePoint) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }

    /// Coordinate pair in the order the routing service expects.
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

impl From<&RoutePoint> for geo_types::Point {
    fn from(point: &RoutePoint) -> Self {
        geo_types::Point::new(point.lng, point.lat)
    }
}
