// src/services/mod.rs
pub mod location_service;
pub mod ride_status_service;
pub mod state_machine;
pub mod tracking_service;

pub use location_service::{FetchOutcome, HttpLocationFetcher, LocationFetcher, MockLocationFetcher};
pub use ride_status_service::{HttpRideStatusSource, MockRideStatusSource, RideStatusMonitor, RideStatusSource};
pub use tracking_service::RideTrackingSession;
