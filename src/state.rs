// src/state.rs
use std::sync::Arc;
use std::time::Duration;

use crate::{
    errors::{TrackingError, TrackingResult},
    services::{
        location_service::{HttpLocationFetcher, LocationFetcher},
        ride_status_service::{DEFAULT_STATUS_POLL_INTERVAL, HttpRideStatusSource, RideStatusMonitor, RideStatusSource},
        tracking_service::{DEFAULT_EVENT_CAPACITY, DEFAULT_POLL_INTERVAL, RideTrackingSession},
    },
};

pub struct AppState {
    pub location_fetcher: Arc<dyn LocationFetcher>,
    pub status_source: Arc<dyn RideStatusSource>,
    pub tracking_session: Arc<RideTrackingSession>,
    pub status_monitor: Arc<RideStatusMonitor>,
    pub config: AppConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub status_poll_interval: Duration,
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: Duration::from_secs(10),
            status_poll_interval: DEFAULT_STATUS_POLL_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Reads `RIDE_TRACKER_*` environment variables. Only the base URL is
    /// required.
    pub fn from_env() -> TrackingResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TrackingResult<Self> {
        let defaults = Self::default();

        let base_url = lookup("RIDE_TRACKER_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| TrackingError::MissingEnvironmentVariable("RIDE_TRACKER_BASE_URL".to_string()))?;

        let config = Self {
            base_url: base_url.trim().to_string(),
            poll_interval: millis_var(&lookup, "RIDE_TRACKER_POLL_INTERVAL_MS")?.unwrap_or(defaults.poll_interval),
            request_timeout: millis_var(&lookup, "RIDE_TRACKER_REQUEST_TIMEOUT_MS")?
                .unwrap_or(defaults.request_timeout),
            status_poll_interval: millis_var(&lookup, "RIDE_TRACKER_STATUS_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.status_poll_interval),
            event_capacity: number_var(&lookup, "RIDE_TRACKER_EVENT_CAPACITY")?
                .map(|n| n as usize)
                .unwrap_or(defaults.event_capacity),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TrackingResult<()> {
        if self.poll_interval.is_zero() {
            return Err(TrackingError::invalid_config("poll interval must be greater than zero"));
        }
        if self.status_poll_interval.is_zero() {
            return Err(TrackingError::invalid_config("status poll interval must be greater than zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(TrackingError::invalid_config("request timeout must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(TrackingError::invalid_config("event capacity must be at least 1"));
        }
        Ok(())
    }
}

fn number_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> TrackingResult<Option<u64>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| TrackingError::InvalidFieldValue {
            field: key.to_string(),
            value: raw.clone(),
            reason: "expected a non-negative integer".to_string(),
        }),
    }
}

fn millis_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> TrackingResult<Option<Duration>> {
    Ok(number_var(lookup, key)?.map(Duration::from_millis))
}

impl AppState {
    pub fn new(config: AppConfig) -> TrackingResult<Self> {
        config.validate()?;
        let location_fetcher: Arc<dyn LocationFetcher> =
            Arc::new(HttpLocationFetcher::new(&config.base_url, config.request_timeout)?);
        let status_source: Arc<dyn RideStatusSource> =
            Arc::new(HttpRideStatusSource::new(&config.base_url, config.request_timeout)?);

        Ok(Self::with_services(config, location_fetcher, status_source))
    }

    /// Wires the session and monitor around caller-supplied backends.
    pub fn with_services(
        config: AppConfig,
        location_fetcher: Arc<dyn LocationFetcher>,
        status_source: Arc<dyn RideStatusSource>,
    ) -> Self {
        let tracking_session = Arc::new(RideTrackingSession::with_event_capacity(
            location_fetcher.clone(),
            config.event_capacity,
        ));
        let status_monitor = Arc::new(RideStatusMonitor::new(status_source.clone(), config.event_capacity));

        tracing::debug!("App state wired for {}", config.base_url);

        Self {
            location_fetcher,
            status_source,
            tracking_session,
            status_monitor,
            config,
        }
    }
}
