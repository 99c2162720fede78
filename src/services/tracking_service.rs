// src/services/tracking_service.rs
//! Polling session that follows one ride's driver.
//!
//! A session owns at most one background poller. Each poll result is
//! classified by [`TrackingStateMachine`] and published on a broadcast
//! channel. Results are applied under the session lock after checking that
//! the poller's generation is still current, so nothing from a stopped or
//! replaced session ever reaches subscribers.

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing;

use crate::{
    errors::{TrackingError, TrackingResult, ValidationError},
    models::{
        driver::DriverLocation,
        tracking::{EtaResult, TrackingEvent, TrackingState},
    },
    services::{
        location_service::{FetchOutcome, LocationFetcher},
        state_machine::TrackingStateMachine,
    },
    utils::geo,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
struct SessionParams {
    ride_id: String,
    pickup_lat: f64,
    pickup_lng: f64,
    interval: Duration,
}

#[derive(Debug)]
struct ActiveSession {
    params: SessionParams,
    generation: u64,
    cancel: CancellationToken,
    last_location: Option<DriverLocation>,
    last_eta: Option<EtaResult>,
}

#[derive(Debug, Default)]
struct SessionInner {
    session: Option<ActiveSession>,
    machine: TrackingStateMachine,
    // Last state subscribers were told about. Survives stop_tracking, which
    // resets the machine silently.
    announced: TrackingState,
    next_generation: u64,
    // Remembered across stop_tracking so retry_tracking can restart.
    last_params: Option<SessionParams>,
}

struct Shared {
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<TrackingEvent>,
}

#[derive(Debug, PartialEq)]
enum PollFlow {
    Continue,
    Stop,
}

impl Shared {
    fn emit(&self, event: TrackingEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Applies one poll outcome for `generation`.
    ///
    /// Events are sent while the lock is held so `stop_tracking` cannot
    /// return between the generation check and the send.
    fn apply_outcome(&self, generation: u64, outcome: FetchOutcome, first_fetch: bool) -> PollFlow {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let session = match inner.session.as_mut() {
            Some(s) if s.generation == generation && !s.cancel.is_cancelled() => s,
            _ => {
                tracing::debug!("Discarding {} result from a cancelled poller", outcome.kind());
                return PollFlow::Stop;
            }
        };
        let ride_id = session.params.ride_id.clone();

        let changed = inner.machine.apply(&outcome, first_fetch);
        if let Some(state) = changed {
            tracing::info!("Ride {} tracking state -> {}", ride_id, state);
            inner.announced = state;
            self.emit(TrackingEvent::StateChanged {
                ride_id: ride_id.clone(),
                state,
            });
        }

        match outcome {
            FetchOutcome::Success(mut location) => {
                location.ride_id = ride_id.clone();
                location.refresh_age(Utc::now());
                let eta = geo::estimate_eta(&location, session.params.pickup_lat, session.params.pickup_lng);

                if location.is_stale() {
                    tracing::debug!("Ride {} location is {}s old", ride_id, location.age_seconds);
                }

                session.last_location = Some(location.clone());
                session.last_eta = Some(eta);
                self.emit(TrackingEvent::LocationUpdated(location));
                self.emit(TrackingEvent::EtaUpdated { ride_id, eta });
            }
            FetchOutcome::NotTrackingYet { message: Some(message), .. } => {
                tracing::debug!("Ride {} not tracking yet: {}", ride_id, message);
            }
            _ => {}
        }

        if inner.machine.state().is_terminal() {
            tracing::info!("Ride {} reached {}, polling stops", session.params.ride_id, inner.machine.state());
            PollFlow::Stop
        } else {
            PollFlow::Continue
        }
    }
}

/// Tracks the driver for one ride at a time.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use ride_tracker::services::location_service::HttpLocationFetcher;
/// # use ride_tracker::services::tracking_service::RideTrackingSession;
/// # async fn run() -> ride_tracker::TrackingResult<()> {
/// let fetcher = HttpLocationFetcher::new("https://api.example.com", Duration::from_secs(10))?;
/// let session = RideTrackingSession::new(Arc::new(fetcher));
/// let mut events = session.subscribe();
/// session.start_tracking("ride-42", 5.6037, -0.1870, Duration::from_secs(15)).await?;
/// while let Ok(event) = events.recv().await {
///     println!("{:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
pub struct RideTrackingSession {
    fetcher: Arc<dyn LocationFetcher>,
    shared: Arc<Shared>,
    // Serializes start/retry so only one poller ever runs.
    poller: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RideTrackingSession {
    pub fn new(fetcher: Arc<dyn LocationFetcher>) -> Self {
        Self::with_event_capacity(fetcher, DEFAULT_EVENT_CAPACITY)
    }

    /// `capacity` bounds how far a slow subscriber may lag before it starts
    /// missing events.
    pub fn with_event_capacity(fetcher: Arc<dyn LocationFetcher>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            fetcher,
            shared: Arc::new(Shared {
                inner: Mutex::new(SessionInner::default()),
                events,
            }),
            poller: tokio::sync::Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.shared.events.subscribe()
    }

    /// Starts polling `ride_id`, replacing any session already running.
    ///
    /// Returns once the poller is spawned; the first fetch happens in the
    /// background.
    pub async fn start_tracking(
        &self,
        ride_id: &str,
        pickup_lat: f64,
        pickup_lng: f64,
        interval: Duration,
    ) -> TrackingResult<()> {
        let params = validate_params(ride_id, pickup_lat, pickup_lng, interval)?;
        self.launch(params).await
    }

    /// Restarts the last session with the same ride, pickup and interval.
    pub async fn retry_tracking(&self) -> TrackingResult<()> {
        let (state, params) = {
            let inner = self.shared.inner.lock();
            (inner.machine.state(), inner.last_params.clone())
        };
        if state == TrackingState::Unauthorized {
            return Err(TrackingError::RetryNotAllowed(state));
        }
        let params = params.ok_or(TrackingError::NoActiveSession)?;
        tracing::info!("Retrying tracking for ride {}", params.ride_id);
        self.launch(params).await
    }

    /// Cancels the running session. No event is emitted after this returns.
    /// Calling it with nothing running is a no-op.
    ///
    /// The state drops back to `Loading` silently; subscribers see
    /// `StateChanged(Loading)` when the next session starts.
    pub fn stop_tracking(&self) {
        let mut inner = self.shared.inner.lock();
        if let Some(session) = inner.session.take() {
            session.cancel.cancel();
            inner.machine = TrackingStateMachine::new();
            tracing::info!("Stopped tracking ride {}", session.params.ride_id);
        }
    }

    /// Stops tracking and waits for the poller task to finish.
    pub async fn shutdown(&self) -> TrackingResult<()> {
        self.stop_tracking();
        let handle = self.poller.lock().await.take();
        if let Some(handle) = handle {
            handle.await?;
        }
        Ok(())
    }

    /// Single fetch outside the polling loop. Does not touch session state.
    pub async fn fetch_once(&self, ride_id: &str) -> FetchOutcome {
        guarded_fetch(self.fetcher.as_ref(), ride_id).await
    }

    /// ETA from `location` to the active session's pickup point.
    pub fn calculate_eta(&self, location: &DriverLocation) -> Option<EtaResult> {
        let inner = self.shared.inner.lock();
        inner
            .session
            .as_ref()
            .map(|s| geo::estimate_eta(location, s.params.pickup_lat, s.params.pickup_lng))
    }

    pub fn current_state(&self) -> TrackingState {
        self.shared.inner.lock().machine.state()
    }

    pub fn current_ride_id(&self) -> Option<String> {
        self.shared.inner.lock().session.as_ref().map(|s| s.params.ride_id.clone())
    }

    /// True while a session exists and has not reached a terminal state.
    pub fn is_active(&self) -> bool {
        let inner = self.shared.inner.lock();
        inner.session.is_some() && !inner.machine.state().is_terminal()
    }

    /// Last reading with its age brought up to date.
    pub fn last_known_location(&self) -> Option<DriverLocation> {
        let inner = self.shared.inner.lock();
        inner
            .session
            .as_ref()
            .and_then(|s| s.last_location.as_ref())
            .map(|l| l.aged_to(Utc::now()))
    }

    pub fn last_known_eta(&self) -> Option<EtaResult> {
        self.shared.inner.lock().session.as_ref().and_then(|s| s.last_eta)
    }

    async fn launch(&self, params: SessionParams) -> TrackingResult<()> {
        let mut poller = self.poller.lock().await;

        // Retire the previous poller before the new one exists.
        let previous = {
            let mut inner = self.shared.inner.lock();
            inner.session.take().map(|s| {
                s.cancel.cancel();
                s.params.ride_id
            })
        };
        if let Some(handle) = poller.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Previous tracking poller ended abnormally: {}", e);
            }
        }
        if let Some(previous) = previous {
            tracing::info!("Replacing tracking session for ride {}", previous);
        }

        let cancel = CancellationToken::new();
        let generation = {
            let mut inner = self.shared.inner.lock();
            inner.next_generation += 1;
            let generation = inner.next_generation;
            inner.session = Some(ActiveSession {
                params: params.clone(),
                generation,
                cancel: cancel.clone(),
                last_location: None,
                last_eta: None,
            });
            inner.last_params = Some(params.clone());
            inner.machine.reset();
            if inner.announced != TrackingState::Loading {
                inner.announced = TrackingState::Loading;
                self.shared.emit(TrackingEvent::StateChanged {
                    ride_id: params.ride_id.clone(),
                    state: TrackingState::Loading,
                });
            }
            generation
        };

        tracing::info!(
            "Tracking ride {} every {:?} (pickup {}, {})",
            params.ride_id,
            params.interval,
            params.pickup_lat,
            params.pickup_lng
        );

        *poller = Some(tokio::spawn(run_poller(
            self.shared.clone(),
            self.fetcher.clone(),
            params,
            generation,
            cancel,
        )));
        Ok(())
    }
}

impl Drop for RideTrackingSession {
    fn drop(&mut self) {
        if let Some(session) = self.shared.inner.lock().session.take() {
            session.cancel.cancel();
        }
    }
}

fn validate_params(ride_id: &str, pickup_lat: f64, pickup_lng: f64, interval: Duration) -> TrackingResult<SessionParams> {
    let mut errors = Vec::new();
    let ride_id = ride_id.trim();

    if ride_id.is_empty() {
        errors.push(("ride_id", "must not be empty".to_string()));
    }
    if !pickup_lat.is_finite() || !(-90.0..=90.0).contains(&pickup_lat) {
        errors.push(("pickup_lat", format!("{} is not a valid latitude", pickup_lat)));
    }
    if !pickup_lng.is_finite() || !(-180.0..=180.0).contains(&pickup_lng) {
        errors.push(("pickup_lng", format!("{} is not a valid longitude", pickup_lng)));
    }
    if interval.is_zero() {
        errors.push(("interval", "must be greater than zero".to_string()));
    }

    if !errors.is_empty() {
        return Err(TrackingError::ValidationFailed(
            errors
                .into_iter()
                .map(|(field, message)| ValidationError {
                    field: field.to_string(),
                    message,
                })
                .collect(),
        ));
    }

    Ok(SessionParams {
        ride_id: ride_id.to_string(),
        pickup_lat,
        pickup_lng,
        interval,
    })
}

/// A panicking fetcher counts as a transport failure.
async fn guarded_fetch(fetcher: &dyn LocationFetcher, ride_id: &str) -> FetchOutcome {
    match AssertUnwindSafe(fetcher.fetch_location(ride_id)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!("Location fetcher panicked for ride {}", ride_id);
            FetchOutcome::TransportError("location fetcher panicked".to_string())
        }
    }
}

async fn run_poller(
    shared: Arc<Shared>,
    fetcher: Arc<dyn LocationFetcher>,
    params: SessionParams,
    generation: u64,
    cancel: CancellationToken,
) {
    tracing::debug!("Poller {} started for ride {}", generation, params.ride_id);
    let mut first_fetch = true;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = guarded_fetch(fetcher.as_ref(), &params.ride_id) => outcome,
        };

        if shared.apply_outcome(generation, outcome, first_fetch) == PollFlow::Stop {
            break;
        }
        first_fetch = false;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(params.interval) => {}
        }
    }

    tracing::debug!("Poller {} for ride {} exited", generation, params.ride_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ride::RideStatus;
    use crate::services::location_service::MockLocationFetcher;
    use async_trait::async_trait;
    use tokio::sync::broadcast::error::TryRecvError;

    const PICKUP: (f64, f64) = (5.6037, -0.1870);
    const INTERVAL: Duration = Duration::from_secs(15);

    fn located(ride_id: &str) -> FetchOutcome {
        // roughly 2 km north of the pickup
        FetchOutcome::Success(DriverLocation::new(ride_id, 5.6217, -0.1870, Utc::now()).with_speed(30.0))
    }

    fn not_tracking() -> FetchOutcome {
        FetchOutcome::NotTrackingYet { message: Some("Driver not started".into()), ride_status: None }
    }

    async fn next_event(rx: &mut broadcast::Receiver<TrackingEvent>) -> TrackingEvent {
        tokio::time::timeout(Duration::from_secs(120), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    fn session_with(fetcher: &Arc<MockLocationFetcher>) -> RideTrackingSession {
        RideTrackingSession::new(fetcher.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_stops_polling() {
        let fetcher = Arc::new(MockLocationFetcher::with_script([FetchOutcome::Forbidden]));
        let session = session_with(&fetcher);
        let mut rx = session.subscribe();

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        let mut states = vec![session.current_state()];

        match next_event(&mut rx).await {
            TrackingEvent::StateChanged { state, .. } => states.push(state),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(states, vec![TrackingState::Loading, TrackingState::Unauthorized]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.call_count(), 1);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(!session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_started_then_tracking() {
        let fetcher = Arc::new(
            MockLocationFetcher::with_script([not_tracking(), located("ride-1")])
                .then_repeat(FetchOutcome::TransportError("flaky".into())),
        );
        let session = session_with(&fetcher);
        let mut rx = session.subscribe();

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();

        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::NotStarted }
        );
        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::Tracking }
        );
        assert!(matches!(next_event(&mut rx).await, TrackingEvent::LocationUpdated(_)));
        let eta = match next_event(&mut rx).await {
            TrackingEvent::EtaUpdated { eta, .. } => eta,
            other => panic!("unexpected event {:?}", other),
        };
        assert!(eta.estimated_minutes >= 1);
        assert!(!eta.is_estimate);

        // later transport errors keep Tracking and emit nothing
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(fetcher.call_count() >= 4);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(session.current_state(), TrackingState::Tracking);
        assert_eq!(session.last_known_eta(), Some(eta));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_double_stop_is_quiet() {
        let fetcher = Arc::new(MockLocationFetcher::with_script([located("ride-1")]));
        let session = session_with(&fetcher);
        let mut rx = session.subscribe();

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        for _ in 0..3 {
            next_event(&mut rx).await;
        }
        assert!(session.last_known_location().is_some());

        session.stop_tracking();
        session.stop_tracking();

        assert_eq!(session.current_state(), TrackingState::Loading);
        assert!(session.last_known_location().is_none());
        assert!(session.last_known_eta().is_none());
        assert!(session.current_ride_id().is_none());

        let calls = fetcher.call_count();
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(fetcher.call_count(), calls);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_announces_loading() {
        let fetcher = Arc::new(MockLocationFetcher::with_script([located("ride-1")]));
        let session = session_with(&fetcher);
        let mut rx = session.subscribe();

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        for _ in 0..3 {
            next_event(&mut rx).await;
        }
        session.stop_tracking();

        // retrying after a stop starts a fresh session
        session.retry_tracking().await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::Loading }
        );
        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::Tracking }
        );
        session.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_fetch() {
        let fetcher = Arc::new(
            MockLocationFetcher::with_script([located("ride-1")]).with_latency(Duration::from_secs(5)),
        );
        let session = session_with(&fetcher);
        let mut rx = session.subscribe();

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetcher.call_count(), 1);

        session.stop_tracking();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(session.last_known_location().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_failures_map_to_states() {
        for (outcome, expected) in [
            (FetchOutcome::NotFound, TrackingState::Unavailable),
            (FetchOutcome::TransportError("refused".into()), TrackingState::Error),
            (not_tracking(), TrackingState::NotStarted),
        ] {
            let fetcher = Arc::new(MockLocationFetcher::with_script([outcome]));
            let session = session_with(&fetcher);
            let mut rx = session.subscribe();

            session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
            assert_eq!(
                next_event(&mut rx).await,
                TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: expected }
            );

            // repeats of the same outcome stay silent
            tokio::time::sleep(Duration::from_secs(50)).await;
            assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
            session.stop_tracking();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_ride_ends_tracking() {
        let fetcher = Arc::new(MockLocationFetcher::with_script([
            located("ride-1"),
            FetchOutcome::NotTrackingYet {
                message: Some("Ride completed".into()),
                ride_status: Some(RideStatus::Completed),
            },
        ]));
        let session = session_with(&fetcher);
        let mut rx = session.subscribe();

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        for _ in 0..3 {
            next_event(&mut rx).await;
        }
        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::Ended }
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.call_count(), 2);
        // the last reading survives the end of the ride
        assert!(session.last_known_location().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rules() {
        let fetcher = Arc::new(MockLocationFetcher::with_script([
            FetchOutcome::TransportError("down".into()),
            located("ride-1"),
        ]));
        let session = session_with(&fetcher);
        let mut rx = session.subscribe();

        assert!(matches!(session.retry_tracking().await, Err(TrackingError::NoActiveSession)));

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::Error }
        );

        session.retry_tracking().await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::Loading }
        );
        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::Tracking }
        );
        // exactly one immediate fetch per start
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_refused_when_unauthorized() {
        let fetcher = Arc::new(MockLocationFetcher::with_script([FetchOutcome::Forbidden]));
        let session = session_with(&fetcher);
        let mut rx = session.subscribe();

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        next_event(&mut rx).await;

        assert!(matches!(
            session.retry_tracking().await,
            Err(TrackingError::RetryNotAllowed(TrackingState::Unauthorized))
        ));
        // a fresh start is still allowed
        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        assert_eq!(session.current_state(), TrackingState::Loading);
    }

    #[tokio::test]
    async fn test_start_validates_arguments() {
        let session = RideTrackingSession::new(Arc::new(MockLocationFetcher::new()));

        let err = session.start_tracking("  ", 95.0, 0.0, Duration::ZERO).await.unwrap_err();
        match err {
            TrackingError::ValidationFailed(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["ride_id", "pickup_lat", "interval"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(session.current_ride_id().is_none());
    }

    struct PanickingFetcher;

    #[async_trait]
    impl LocationFetcher for PanickingFetcher {
        async fn fetch_location(&self, _ride_id: &str) -> FetchOutcome {
            panic!("decoder blew up");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetcher_is_transport_error() {
        let session = RideTrackingSession::new(Arc::new(PanickingFetcher));
        let mut rx = session.subscribe();

        session.start_tracking("ride-1", PICKUP.0, PICKUP.1, INTERVAL).await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            TrackingEvent::StateChanged { ride_id: "ride-1".into(), state: TrackingState::Error }
        );
        assert!(session.is_active());
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_once_and_calculate_eta() {
        let fetcher = Arc::new(MockLocationFetcher::with_script([located("ride-9")]));
        let session = session_with(&fetcher);

        let location = match session.fetch_once("ride-9").await {
            FetchOutcome::Success(location) => location,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(session.current_state(), TrackingState::Loading);
        // no pickup point without a session
        assert!(session.calculate_eta(&location).is_none());

        session
            .start_tracking("ride-9", PICKUP.0, PICKUP.1, Duration::from_secs(3600))
            .await
            .unwrap();
        let eta = session.calculate_eta(&location).unwrap();
        assert!(eta.distance_km > 1.9 && eta.distance_km < 2.1);
        session.shutdown().await.unwrap();
    }
}
