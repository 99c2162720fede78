// src/services/location_service.rs
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use std::collections::VecDeque;
use std::time::Duration;
use tracing;

use crate::{
    errors::{TrackingError, TrackingResult},
    models::{
        driver::{DriverLocation, PassengerLocationResponse},
        ride::RideStatus,
    },
    utils::{http, json},
};

/// Result of one attempt to read the driver's position for a ride.
///
/// Fetchers never fail outright: every transport or decoding problem is
/// folded into [`FetchOutcome::TransportError`].
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(DriverLocation),
    /// The ride exists but the driver is not transmitting.
    NotTrackingYet {
        message: Option<String>,
        ride_status: Option<RideStatus>,
    },
    NotFound,
    Forbidden,
    TransportError(String),
}

impl FetchOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::NotTrackingYet { .. } => "not_tracking_yet",
            FetchOutcome::NotFound => "not_found",
            FetchOutcome::Forbidden => "forbidden",
            FetchOutcome::TransportError(_) => "transport_error",
        }
    }
}

#[async_trait]
pub trait LocationFetcher: Send + Sync {
    async fn fetch_location(&self, ride_id: &str) -> FetchOutcome;
}

/// Reads `GET {base}/passenger/rides/{rideId}/location`.
pub struct HttpLocationFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpLocationFetcher {
    pub fn new(base_url: &str, request_timeout: Duration) -> TrackingResult<Self> {
        Self::with_client(http::build_client(request_timeout)?, base_url)
    }

    /// Reuses an existing client, e.g. one carrying auth headers.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> TrackingResult<Self> {
        Ok(Self {
            client,
            base_url: http::parse_base_url(base_url)?,
        })
    }

    pub fn location_url(&self, ride_id: &str) -> TrackingResult<Url> {
        http::endpoint_url(&self.base_url, &["passenger", "rides", ride_id, "location"])
    }

    async fn request(&self, ride_id: &str) -> TrackingResult<FetchOutcome> {
        let url = self.location_url(ride_id)?;
        tracing::debug!("Fetching driver location: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        match status {
            StatusCode::FORBIDDEN => {
                tracing::warn!("Not authorized to track ride {}", ride_id);
                return Ok(FetchOutcome::Forbidden);
            }
            StatusCode::NOT_FOUND => {
                tracing::debug!("No location resource for ride {}", ride_id);
                return Ok(FetchOutcome::NotFound);
            }
            s if !s.is_success() => {
                return Err(TrackingError::UnexpectedStatus {
                    status: s.as_u16(),
                    url: url.to_string(),
                });
            }
            _ => {}
        }

        let body = response.bytes().await?;
        let payload: PassengerLocationResponse = json::from_slice_case_insensitive(&body)?;

        if !payload.tracking_active {
            return Ok(FetchOutcome::NotTrackingYet {
                ride_status: payload
                    .current_status
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .map(RideStatus::parse),
                message: payload.message,
            });
        }

        let location = payload.to_driver_location(ride_id, Utc::now())?;
        Ok(FetchOutcome::Success(location))
    }
}

#[async_trait]
impl LocationFetcher for HttpLocationFetcher {
    async fn fetch_location(&self, ride_id: &str) -> FetchOutcome {
        match self.request(ride_id).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_transient() => {
                tracing::warn!("Location fetch for ride {} failed: {}", ride_id, e);
                FetchOutcome::TransportError(e.to_string())
            }
            Err(e) => {
                tracing::error!("Location fetch for ride {} returned an unusable response: {}", ride_id, e);
                FetchOutcome::TransportError(e.to_string())
            }
        }
    }
}

// Mock fetcher for development and testing
//
// Plays back a script of outcomes in order. Once the script runs out the
// fallback outcome (if any) repeats, otherwise the last scripted outcome does.
#[derive(Debug, Default)]
pub struct MockLocationFetcher {
    script: Mutex<VecDeque<FetchOutcome>>,
    fallback: Mutex<Option<FetchOutcome>>,
    calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl MockLocationFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(outcomes: impl IntoIterator<Item = FetchOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn then_repeat(self, outcome: FetchOutcome) -> Self {
        *self.fallback.lock() = Some(outcome);
        self
    }

    /// Each fetch sleeps this long (on the tokio clock) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push(&self, outcome: FetchOutcome) {
        self.script.lock().push_back(outcome);
    }

    /// Ride ids of every fetch started so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_outcome(&self) -> FetchOutcome {
        let mut script = self.script.lock();
        let mut fallback = self.fallback.lock();
        match script.pop_front() {
            Some(outcome) => {
                if script.is_empty() && fallback.is_none() {
                    *fallback = Some(outcome.clone());
                }
                outcome
            }
            None => fallback.clone().unwrap_or(FetchOutcome::NotTrackingYet {
                message: None,
                ride_status: None,
            }),
        }
    }
}

#[async_trait]
impl LocationFetcher for MockLocationFetcher {
    async fn fetch_location(&self, ride_id: &str) -> FetchOutcome {
        self.calls.lock().push(ride_id.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let outcome = self.next_outcome();
        tracing::debug!("[MOCK] Location fetch for {} -> {}", ride_id, outcome.kind());
        outcome
    }
}
