// src/utils/geo.rs
//! Great-circle distance and straight-line ETA.
//!
//! Everything here is pure: the same inputs always give bit-identical output.

use crate::models::driver::DriverLocation;
use crate::models::tracking::EtaResult;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed driving speed when the reading carries none.
pub const AVERAGE_SPEED_KMH: f64 = 35.0;

/// Below this distance a zero-minute ETA is reported as zero.
pub const ARRIVED_RADIUS_KM: f64 = 0.1;

/// Haversine distance between two points given in degrees.
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // rounding can push near-antipodal points just past 1
    let a = a.min(1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// ETA from the driver's reading to the pickup point.
///
/// Uses the reading's speed when it is positive, otherwise
/// [`AVERAGE_SPEED_KMH`]. Any non-trivial distance rounds up to at least one
/// minute.
pub fn estimate_eta(location: &DriverLocation, pickup_lat: f64, pickup_lng: f64) -> EtaResult {
    let distance_km = haversine_distance_km(location.latitude, location.longitude, pickup_lat, pickup_lng);

    let speed_kmh = match location.speed_kmh {
        Some(speed) if speed > 0.0 => speed,
        _ => AVERAGE_SPEED_KMH,
    };

    let mut estimated_minutes = (distance_km / speed_kmh * 60.0).ceil().max(0.0) as u32;
    if estimated_minutes < 1 && distance_km > ARRIVED_RADIUS_KM {
        estimated_minutes = 1;
    }

    EtaResult {
        estimated_minutes,
        distance_km,
        is_estimate: location.speed_kmh.is_none(),
    }
}
