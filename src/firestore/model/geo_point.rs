use serde::{Deserialize, Serialize};

use crate::firestore::error::{invalid_argument, FirestoreResult};

/// Geographic point, serialized as the wire `LatLng` object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> FirestoreResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(invalid_argument("Latitude must be between -90 and 90 degrees."));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(invalid_argument("Longitude must be between -180 and 180 degrees."));
        }
        Ok(Self { latitude, longitude })
    }

    /// Builds a point without range checks. Used when decoding server data.
    pub(crate) fn unchecked(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}
