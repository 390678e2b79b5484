use serde::Serialize;

use super::domain::GeoPoint;
use crate::config::CheckinConfig;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance on a spherical Earth (haversine).
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

pub fn is_within(
    point: GeoPoint,
    reference: GeoPoint,
    radius_meters: f64,
    tolerance_meters: f64,
) -> bool {
    distance_meters(point, reference) <= radius_meters + tolerance_meters
}

/// Circular fence around a reference point. Callers validate coordinate ranges first.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceValidator {
    reference: GeoPoint,
    radius_meters: f64,
    tolerance_meters: f64,
}

impl GeofenceValidator {
    pub fn new(reference: GeoPoint, radius_meters: f64, tolerance_meters: f64) -> Self {
        Self {
            reference,
            radius_meters,
            tolerance_meters,
        }
    }

    pub fn reference(&self) -> GeoPoint {
        self.reference
    }

    pub fn allowed_meters(&self) -> f64 {
        self.radius_meters + self.tolerance_meters
    }

    pub fn evaluate(&self, point: GeoPoint) -> GeofenceCheck {
        let distance = distance_meters(point, self.reference);
        GeofenceCheck {
            office: self.reference,
            received: point,
            distance_meters: distance,
            allowed_meters: self.allowed_meters(),
            radius_meters: self.radius_meters,
            tolerance_meters: self.tolerance_meters,
            inside: distance <= self.allowed_meters(),
        }
    }
}

impl From<&CheckinConfig> for GeofenceValidator {
    fn from(config: &CheckinConfig) -> Self {
        Self::new(config.office, config.radius_meters, config.tolerance_meters)
    }
}

/// Outcome of a fence check, kept whole so rejections can report their diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceCheck {
    pub office: GeoPoint,
    pub received: GeoPoint,
    pub distance_meters: f64,
    pub allowed_meters: f64,
    pub radius_meters: f64,
    pub tolerance_meters: f64,
    #[serde(skip)]
    pub inside: bool,
}
