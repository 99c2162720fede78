// src/models/ride.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Booking / ride lifecycle status as reported by the backend.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum RideStatus {
    Requested,
    Confirmed,
    Scheduled,
    Dispatched,
    EnRoute,
    OnRoute,
    Arrived,
    PassengerOnboard,
    InProgress,
    Completed,
    Cancelled,
    Declined,
    Other(String),
}

impl RideStatus {
    /// Case-insensitive parse; unknown values are kept verbatim.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let key: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "requested" | "created" => RideStatus::Requested,
            "confirmed" => RideStatus::Confirmed,
            "scheduled" => RideStatus::Scheduled,
            "dispatched" => RideStatus::Dispatched,
            "enroute" => RideStatus::EnRoute,
            "onroute" => RideStatus::OnRoute,
            "arrived" => RideStatus::Arrived,
            "passengeronboard" => RideStatus::PassengerOnboard,
            "inprogress" => RideStatus::InProgress,
            "completed" => RideStatus::Completed,
            "cancelled" | "canceled" => RideStatus::Cancelled,
            "declined" => RideStatus::Declined,
            _ => RideStatus::Other(trimmed.to_string()),
        }
    }

    /// The ride is over; there is nothing left to track.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::Declined
        )
    }

    /// The driver is expected to be transmitting location.
    pub fn is_trackable(&self) -> bool {
        matches!(
            self,
            RideStatus::OnRoute | RideStatus::InProgress | RideStatus::Dispatched | RideStatus::EnRoute
        )
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideStatus::Other(raw) => write!(f, "{}", raw),
            known => write!(f, "{:?}", known),
        }
    }
}

/// Wire shape of `GET /bookings/{id}`; only the status fields are read.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BookingStatusResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "currentridestatus", default)]
    pub current_ride_status: Option<String>,
}

impl BookingStatusResponse {
    /// The driver-side status wins over the booking status when present.
    pub fn effective_status(&self) -> Option<&str> {
        self.current_ride_status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.status.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

/// Emitted by the ride status monitor when the status string changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RideStatusChange {
    pub ride_id: String,
    /// Empty on the first observation.
    pub old_status: String,
    pub new_status: String,
}

impl RideStatusChange {
    pub fn is_trackable(&self) -> bool {
        !self.new_status.trim().is_empty() && RideStatus::parse(&self.new_status).is_trackable()
    }

    pub fn is_terminal(&self) -> bool {
        RideStatus::parse(&self.new_status).is_terminal()
    }
}
