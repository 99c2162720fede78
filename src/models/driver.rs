// src/models/driver.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{TrackingError, TrackingResult};
use crate::utils::json::{null_as_default, parse_utc_timestamp};

/// Readings older than this many seconds are stale.
pub const STALE_THRESHOLD_SECS: u32 = 120;

/// A point-in-time GPS reading for the driver assigned to a ride.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DriverLocation {
    pub ride_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Age of the reading in seconds as of `observed_at`.
    pub age_seconds: u32,
    pub heading: Option<f64>,      // Direction in degrees (0-360)
    pub speed_kmh: Option<f64>,    // Speed in km/h
    pub accuracy: Option<f64>,     // Accuracy in meters
    pub driver_uid: Option<String>,
    pub driver_name: Option<String>,
    /// Wall-clock instant at which `age_seconds` was last computed.
    pub observed_at: DateTime<Utc>,
}

impl DriverLocation {
    /// A reading taken at `timestamp`. Its age is zero as of the timestamp
    /// itself and grows from there on every [`refresh_age`](Self::refresh_age).
    pub fn new(ride_id: impl Into<String>, latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            ride_id: ride_id.into(),
            latitude,
            longitude,
            timestamp,
            age_seconds: 0,
            heading: None,
            speed_kmh: None,
            accuracy: None,
            driver_uid: None,
            driver_name: None,
            observed_at: timestamp,
        }
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = normalize_speed(Some(speed_kmh));
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = normalize_heading(Some(heading));
        self
    }

    pub fn with_driver(mut self, uid: impl Into<String>, name: impl Into<String>) -> Self {
        self.driver_uid = Some(uid.into());
        self.driver_name = Some(name.into());
        self
    }

    /// Pins the age to a server-reported value observed at `observed_at`.
    pub fn with_reported_age(mut self, age_seconds: u32, observed_at: DateTime<Utc>) -> Self {
        self.age_seconds = age_seconds;
        self.observed_at = observed_at;
        self
    }

    pub fn is_stale(&self) -> bool {
        self.age_seconds > STALE_THRESHOLD_SECS
    }

    /// Advances `age_seconds` by the wall-clock time elapsed since it was
    /// last computed. Clock steps backwards never reduce the age.
    pub fn refresh_age(&mut self, now: DateTime<Utc>) {
        let elapsed = now.signed_duration_since(self.observed_at).num_seconds();
        if elapsed > 0 {
            let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
            self.age_seconds = self.age_seconds.saturating_add(elapsed);
            self.observed_at = now;
        }
    }

    /// Copy of this reading with its age recomputed for `now`.
    pub fn aged_to(&self, now: DateTime<Utc>) -> Self {
        let mut location = self.clone();
        location.refresh_age(now);
        location
    }

    pub fn has_speed(&self) -> bool {
        self.speed_kmh.is_some()
    }

    /// Human-readable recency, e.g. "Just now" or "3 minutes ago".
    pub fn last_updated_text(&self) -> String {
        match self.age_seconds {
            0..=9 => "Just now".to_string(),
            10..=59 => format!("{} seconds ago", self.age_seconds),
            60..=119 => "1 minute ago".to_string(),
            age => format!("{} minutes ago", age / 60),
        }
    }
}

/// Wire shape of `GET /passenger/rides/{rideId}/location`.
///
/// Keys are matched after [`normalize_keys`](crate::utils::json::normalize_keys),
/// so `trackingActive`, `TrackingActive` and `tracking_active` all land on
/// the same field.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PassengerLocationResponse {
    #[serde(rename = "rideid", default, deserialize_with = "null_as_default")]
    pub ride_id: String,
    #[serde(rename = "trackingactive", default, deserialize_with = "null_as_default")]
    pub tracking_active: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "currentstatus", default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(rename = "ageseconds", default)]
    pub age_seconds: Option<f64>,
    #[serde(rename = "driveruid", default)]
    pub driver_uid: Option<String>,
    #[serde(rename = "drivername", default)]
    pub driver_name: Option<String>,
}

impl PassengerLocationResponse {
    /// Builds a [`DriverLocation`] from an active-tracking payload.
    ///
    /// `requested_ride_id` fills in the ride id when the server omits it.
    /// When no `ageSeconds` is reported the age is derived from the
    /// timestamp relative to `now`.
    pub fn to_driver_location(&self, requested_ride_id: &str, now: DateTime<Utc>) -> TrackingResult<DriverLocation> {
        let latitude = self
            .latitude
            .ok_or_else(|| TrackingError::malformed("trackingActive is true but latitude is missing"))?;
        let longitude = self
            .longitude
            .ok_or_else(|| TrackingError::malformed("trackingActive is true but longitude is missing"))?;
        let raw_timestamp = self
            .timestamp
            .as_deref()
            .ok_or_else(|| TrackingError::malformed("trackingActive is true but timestamp is missing"))?;

        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(TrackingError::malformed(format!("latitude out of range: {}", latitude)));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(TrackingError::malformed(format!("longitude out of range: {}", longitude)));
        }

        let timestamp = parse_utc_timestamp(raw_timestamp)
            .map_err(|e| TrackingError::malformed(format!("timestamp '{}': {}", raw_timestamp, e)))?;

        let ride_id = if self.ride_id.trim().is_empty() {
            requested_ride_id.to_string()
        } else {
            self.ride_id.clone()
        };

        let age_seconds = match self.age_seconds {
            Some(age) if age.is_finite() && age > 0.0 => age.min(u32::MAX as f64) as u32,
            Some(_) => 0,
            None => {
                let derived = now.signed_duration_since(timestamp).num_seconds().max(0);
                u32::try_from(derived).unwrap_or(u32::MAX)
            }
        };

        Ok(DriverLocation {
            ride_id,
            latitude,
            longitude,
            timestamp,
            age_seconds,
            heading: normalize_heading(self.heading),
            speed_kmh: normalize_speed(self.speed),
            accuracy: self.accuracy.filter(|a| a.is_finite() && *a >= 0.0),
            driver_uid: self.driver_uid.clone(),
            driver_name: self.driver_name.clone(),
            observed_at: now,
        })
    }
}

// GPS units report -1 when speed is unknown.
fn normalize_speed(speed: Option<f64>) -> Option<f64> {
    speed.filter(|s| s.is_finite() && *s >= 0.0)
}

fn normalize_heading(heading: Option<f64>) -> Option<f64> {
    heading
        .filter(|h| h.is_finite())
        .map(|h| h.rem_euclid(360.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_stale_boundary() {
        let fresh = DriverLocation::new("ride-1", 5.6, -0.18, at(0)).with_reported_age(120, at(0));
        assert!(!fresh.is_stale());

        let stale = DriverLocation::new("ride-1", 5.6, -0.18, at(0)).with_reported_age(121, at(0));
        assert!(stale.is_stale());
    }

    #[test]
    fn test_refresh_age_tracks_wall_clock() {
        let mut location = DriverLocation::new("ride-1", 5.6, -0.18, at(0)).with_reported_age(100, at(0));

        location.refresh_age(at(15));
        assert_eq!(location.age_seconds, 115);
        assert!(!location.is_stale());

        location.refresh_age(at(21));
        assert_eq!(location.age_seconds, 121);
        assert!(location.is_stale());
    }

    #[test]
    fn test_refresh_age_ignores_backwards_clock() {
        let mut location = DriverLocation::new("ride-1", 5.6, -0.18, at(60)).with_reported_age(30, at(60));
        location.refresh_age(at(0));
        assert_eq!(location.age_seconds, 30);
        assert_eq!(location.observed_at, at(60));
    }

    #[test]
    fn test_new_location_ages_from_timestamp() {
        let location = DriverLocation::new("ride-1", 5.6, -0.18, at(0));
        assert_eq!(location.aged_to(at(45)).age_seconds, 45);
        // the source reading keeps its age
        assert_eq!(location.age_seconds, 0);
    }

    #[test]
    fn test_last_updated_text() {
        let base = DriverLocation::new("ride-1", 5.6, -0.18, at(0));
        let text = |age| base.clone().with_reported_age(age, at(0)).last_updated_text();

        assert_eq!(text(0), "Just now");
        assert_eq!(text(9), "Just now");
        assert_eq!(text(10), "10 seconds ago");
        assert_eq!(text(59), "59 seconds ago");
        assert_eq!(text(60), "1 minute ago");
        assert_eq!(text(119), "1 minute ago");
        assert_eq!(text(120), "2 minutes ago");
        assert_eq!(text(605), "10 minutes ago");
    }

    #[test]
    fn test_negative_speed_is_dropped() {
        let location = DriverLocation::new("ride-1", 0.0, 0.0, at(0)).with_speed(-1.0);
        assert!(!location.has_speed());
        assert_eq!(location.with_heading(-90.0).heading, Some(270.0));
    }

    #[test]
    fn test_payload_to_location() {
        let payload = PassengerLocationResponse {
            ride_id: "ride-9".into(),
            tracking_active: true,
            latitude: Some(5.6037),
            longitude: Some(-0.187),
            timestamp: Some("2025-03-14T08:59:30Z".into()),
            speed: Some(42.0),
            heading: Some(370.0),
            age_seconds: Some(12.7),
            driver_name: Some("Kwame".into()),
            ..Default::default()
        };

        let location = payload.to_driver_location("ride-9", at(0)).unwrap();
        assert_eq!(location.ride_id, "ride-9");
        assert_eq!(location.age_seconds, 12);
        assert_eq!(location.speed_kmh, Some(42.0));
        assert_eq!(location.heading, Some(10.0));
        assert_eq!(location.driver_name.as_deref(), Some("Kwame"));
        assert_eq!(location.observed_at, at(0));
    }

    #[test]
    fn test_payload_age_derived_from_timestamp() {
        let payload = PassengerLocationResponse {
            tracking_active: true,
            latitude: Some(5.6),
            longitude: Some(-0.18),
            timestamp: Some("2025-03-14T08:57:00Z".into()),
            ..Default::default()
        };

        let location = payload.to_driver_location("ride-3", at(0)).unwrap();
        assert_eq!(location.ride_id, "ride-3");
        assert_eq!(location.age_seconds, 180);
        assert!(location.is_stale());
    }

    #[test]
    fn test_payload_missing_coordinates_is_malformed() {
        let payload = PassengerLocationResponse {
            tracking_active: true,
            latitude: Some(5.6),
            timestamp: Some("2025-03-14T08:57:00Z".into()),
            ..Default::default()
        };

        let err = payload.to_driver_location("ride-3", at(0)).unwrap_err();
        assert!(matches!(err, TrackingError::MalformedPayload(ref m) if m.contains("longitude")));
    }

    #[test]
    fn test_null_ride_id_and_tracking_flag_decode() {
        let body = br#"{"rideId": null, "trackingActive": null, "message": "Driver not assigned", "currentStatus": "Scheduled"}"#;
        let payload: PassengerLocationResponse = crate::utils::json::from_slice_case_insensitive(body).unwrap();

        assert_eq!(payload.ride_id, "");
        assert!(!payload.tracking_active);
        assert_eq!(payload.current_status.as_deref(), Some("Scheduled"));
    }

    #[test]
    fn test_payload_out_of_range_latitude_is_malformed() {
        let payload = PassengerLocationResponse {
            tracking_active: true,
            latitude: Some(95.0),
            longitude: Some(0.0),
            timestamp: Some("2025-03-14T08:57:00Z".into()),
            ..Default::default()
        };

        assert!(payload.to_driver_location("ride-3", at(0)).is_err());
    }
}
