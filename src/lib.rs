pub mod errors;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use errors::{TrackingError, TrackingResult, ValidationError};
pub use models::{DriverLocation, EtaResult, RideStatus, RideStatusChange, TrackingEvent, TrackingState};
pub use services::{FetchOutcome, LocationFetcher, RideStatusMonitor, RideTrackingSession};
pub use utils::geo::{estimate_eta, haversine_distance_km};
