// src/services/ride_status_service.rs
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing;

use crate::{
    errors::{TrackingError, TrackingResult},
    models::ride::{BookingStatusResponse, RideStatus, RideStatusChange},
    utils::{http, json},
};

pub const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[async_trait]
pub trait RideStatusSource: Send + Sync {
    /// Current status string for the booking, `None` when it has none or
    /// the booking is unknown.
    async fn fetch_status(&self, ride_id: &str) -> TrackingResult<Option<String>>;
}

/// Reads `GET {base}/bookings/{id}`.
pub struct HttpRideStatusSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRideStatusSource {
    pub fn new(base_url: &str, request_timeout: Duration) -> TrackingResult<Self> {
        Self::with_client(http::build_client(request_timeout)?, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> TrackingResult<Self> {
        Ok(Self {
            client,
            base_url: http::parse_base_url(base_url)?,
        })
    }

    pub fn booking_url(&self, ride_id: &str) -> TrackingResult<Url> {
        http::endpoint_url(&self.base_url, &["bookings", ride_id])
    }
}

#[async_trait]
impl RideStatusSource for HttpRideStatusSource {
    async fn fetch_status(&self, ride_id: &str) -> TrackingResult<Option<String>> {
        let url = self.booking_url(ride_id)?;
        tracing::debug!("Fetching booking status: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            s if !s.is_success() => {
                return Err(TrackingError::UnexpectedStatus {
                    status: s.as_u16(),
                    url: url.to_string(),
                });
            }
            _ => {}
        }

        let body = response.bytes().await?;
        let booking: BookingStatusResponse = json::from_slice_case_insensitive(&body)?;
        Ok(booking.effective_status().map(str::to_string))
    }
}

// Mock source for development and testing. Replays scripted answers and
// then keeps repeating the last one; `Err` strings become connection errors.
#[derive(Debug, Default)]
pub struct MockRideStatusSource {
    script: Mutex<VecDeque<Result<Option<String>, String>>>,
    last: Mutex<Option<Result<Option<String>, String>>>,
    calls: Mutex<usize>,
}

impl MockRideStatusSource {
    pub fn with_script(answers: impl IntoIterator<Item = Result<Option<String>, String>>) -> Self {
        Self {
            script: Mutex::new(answers.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl RideStatusSource for MockRideStatusSource {
    async fn fetch_status(&self, ride_id: &str) -> TrackingResult<Option<String>> {
        *self.calls.lock() += 1;
        let answer = {
            let mut script = self.script.lock();
            let mut last = self.last.lock();
            if let Some(next) = script.pop_front() {
                *last = Some(next);
            }
            last.clone().unwrap_or(Ok(None))
        };
        tracing::debug!("[MOCK] Booking status for {} -> {:?}", ride_id, answer);
        answer.map_err(TrackingError::NetworkConnection)
    }
}

#[derive(Debug, Default)]
struct MonitorInner {
    generation: u64,
    ride_id: Option<String>,
    last_status: Option<String>,
    cancel: Option<CancellationToken>,
}

struct MonitorShared {
    inner: Mutex<MonitorInner>,
    events: broadcast::Sender<RideStatusChange>,
}

impl MonitorShared {
    /// Records `status` and emits a change when it differs from the last one.
    /// Returns false once this poller's generation has been retired.
    fn observe(&self, generation: u64, status: String) -> bool {
        let mut inner = self.inner.lock();
        let current = inner.generation == generation
            && inner.cancel.as_ref().is_some_and(|c| !c.is_cancelled());
        if !current {
            return false;
        }
        let Some(ride_id) = inner.ride_id.clone() else {
            return false;
        };

        if inner.last_status.as_deref() == Some(status.as_str()) {
            return true;
        }

        let old_status = inner.last_status.replace(status.clone()).unwrap_or_default();
        tracing::info!("Ride {} status changed: '{}' -> '{}'", ride_id, old_status, status);
        let _ = self.events.send(RideStatusChange {
            ride_id,
            old_status,
            new_status: status,
        });
        true
    }
}

/// Watches a booking's status and reports changes.
pub struct RideStatusMonitor {
    source: Arc<dyn RideStatusSource>,
    shared: Arc<MonitorShared>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RideStatusMonitor {
    pub fn new(source: Arc<dyn RideStatusSource>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            source,
            shared: Arc::new(MonitorShared {
                inner: Mutex::new(MonitorInner::default()),
                events,
            }),
            task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RideStatusChange> {
        self.shared.events.subscribe()
    }

    /// True for statuses in which the driver should be transmitting.
    pub fn is_trackable(status: &str) -> bool {
        RideStatus::parse(status).is_trackable()
    }

    /// Starts polling `ride_id`, replacing any ride already monitored.
    pub async fn start_monitoring(&self, ride_id: &str, interval: Duration) -> TrackingResult<()> {
        let ride_id = ride_id.trim();
        if ride_id.is_empty() {
            return Err(TrackingError::validation_error("ride_id", "must not be empty"));
        }
        if interval.is_zero() {
            return Err(TrackingError::validation_error("interval", "must be greater than zero"));
        }

        let mut task = self.task.lock().await;
        self.stop_monitoring();
        if let Some(handle) = task.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Previous status monitor ended abnormally: {}", e);
            }
        }

        let cancel = CancellationToken::new();
        let generation = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            inner.ride_id = Some(ride_id.to_string());
            inner.last_status = None;
            inner.cancel = Some(cancel.clone());
            inner.generation
        };

        tracing::info!("Monitoring status of ride {} every {:?}", ride_id, interval);
        *task = Some(tokio::spawn(run_monitor(
            self.shared.clone(),
            self.source.clone(),
            ride_id.to_string(),
            interval,
            generation,
            cancel,
        )));
        Ok(())
    }

    /// Idempotent. No change is emitted after this returns.
    pub fn stop_monitoring(&self) {
        let mut inner = self.shared.inner.lock();
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
            if let Some(ride_id) = inner.ride_id.take() {
                tracing::info!("Stopped monitoring ride {}", ride_id);
            }
        }
        inner.last_status = None;
    }

    /// One-shot lookup. Failures are logged and reported as `None`.
    pub async fn current_status(&self, ride_id: &str) -> Option<String> {
        match self.source.fetch_status(ride_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Could not fetch status for ride {}: {}", ride_id, e);
                None
            }
        }
    }

    pub fn last_known_status(&self) -> Option<String> {
        self.shared.inner.lock().last_status.clone()
    }
}

impl Drop for RideStatusMonitor {
    fn drop(&mut self) {
        if let Some(cancel) = self.shared.inner.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

async fn run_monitor(
    shared: Arc<MonitorShared>,
    source: Arc<dyn RideStatusSource>,
    ride_id: String,
    interval: Duration,
    generation: u64,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = source.fetch_status(&ride_id) => result,
        };

        match result {
            Ok(Some(status)) => {
                if !shared.observe(generation, status) {
                    break;
                }
            }
            Ok(None) => tracing::debug!("Ride {} has no status yet", ride_id),
            Err(e) => tracing::warn!("Status poll for ride {} failed: {}", ride_id, e),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    tracing::debug!("Status monitor for ride {} exited", ride_id);
}
