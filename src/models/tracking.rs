// src/models/tracking.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use super::driver::DriverLocation;

/// Status of a tracking session.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackingState {
    #[default]
    Loading,      // Before the first poll has been classified
    Tracking,     // A current location is available
    Unavailable,  // Location not established yet
    NotStarted,   // Driver has not begun transmitting
    Unauthorized, // Caller may not view this ride
    Error,        // Request-level failure before any location arrived
    Ended,        // Ride completed or cancelled
}

impl TrackingState {
    /// Terminal states stop the poller; only a new `start_tracking` leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackingState::Unauthorized | TrackingState::Ended)
    }

    /// Whether offering a manual retry makes sense from this state.
    pub fn allows_retry(&self) -> bool {
        matches!(
            self,
            TrackingState::Error | TrackingState::Unavailable | TrackingState::NotStarted
        )
    }

    /// Short badge text for the state.
    pub fn status_label(&self) -> &'static str {
        match self {
            TrackingState::Loading => "Loading",
            TrackingState::Tracking => "Live",
            TrackingState::NotStarted | TrackingState::Unavailable => "Waiting",
            TrackingState::Unauthorized | TrackingState::Error => "Error",
            TrackingState::Ended => "Ended",
        }
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Straight-line ETA from the driver to the pickup point.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct EtaResult {
    pub estimated_minutes: u32,
    pub distance_km: f64,
    /// True when the fallback average speed was used.
    pub is_estimate: bool,
}

impl EtaResult {
    pub fn display_text(&self) -> String {
        if self.estimated_minutes <= 1 {
            "Arriving now".to_string()
        } else {
            format!("{} min away", self.estimated_minutes)
        }
    }

    pub fn distance_text(&self) -> String {
        let mut text = if self.distance_km < 1.0 {
            format!("{:.0} meters away", self.distance_km * 1000.0)
        } else {
            format!("{:.1} km away", self.distance_km)
        };
        if self.is_estimate {
            text.push_str(" (est.)");
        }
        text
    }
}

/// Events published by a tracking session, in poll completion order.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    LocationUpdated(DriverLocation),
    StateChanged { ride_id: String, state: TrackingState },
    EtaUpdated { ride_id: String, eta: EtaResult },
}

impl TrackingEvent {
    pub fn ride_id(&self) -> &str {
        match self {
            TrackingEvent::LocationUpdated(location) => &location.ride_id,
            TrackingEvent::StateChanged { ride_id, .. } => ride_id,
            TrackingEvent::EtaUpdated { ride_id, .. } => ride_id,
        }
    }
}
