use serde::{Deserialize, Serialize};

use super::ids::LocationId;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LocationWire")]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category: Option<String>,
}

/// Places payloads often repeat coordinates under several names at once, so
/// each spelling is its own field and the long form wins.
#[derive(Deserialize)]
struct LocationWire {
    id: LocationId,
    name: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    category: Option<String>,
}

impl From<LocationWire> for Location {
    fn from(wire: LocationWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            address: wire.address.or(wire.formatted_address),
            latitude: wire.latitude.or(wire.lat),
            longitude: wire.longitude.or(wire.lng).or(wire.lon),
            category: wire.category,
        }
    }
}

impl Location {
    pub fn coordinates(&self) -> Option<LatLon> {
        LatLon::new(self.latitude?, self.longitude?).ok()
    }
}

/// A WGS84 coordinate that has passed range and NaN checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    lat: f64,
    lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Result<Self, AppError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(AppError::invalid_request("Coordinates must be finite numbers"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::invalid_request(format!(
                "Latitude must be between -90 and 90, got {lat}"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::invalid_request(format!(
                "Longitude must be between -180 and 180, got {lon}"
            )));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}
