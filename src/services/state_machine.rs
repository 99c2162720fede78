// src/services/state_machine.rs
//! Maps fetch outcomes onto [`TrackingState`] transitions.
//!
//! | outcome                          | first poll    | later polls   |
//! |----------------------------------|---------------|---------------|
//! | `Success`                        | Tracking      | Tracking      |
//! | `NotTrackingYet`, ride finished  | Ended         | Ended         |
//! | `NotTrackingYet`                 | NotStarted    | unchanged     |
//! | `NotFound`                       | Unavailable   | unchanged     |
//! | `Forbidden`                      | Unauthorized  | Unauthorized  |
//! | `TransportError`                 | Error         | unchanged     |
//!
//! `Unauthorized` and `Ended` accept no further transitions until
//! [`TrackingStateMachine::reset`].

use crate::models::tracking::TrackingState;
use crate::services::location_service::FetchOutcome;

/// Target state for an outcome, or `None` when the prior state is kept.
pub fn classify(outcome: &FetchOutcome, first_fetch: bool) -> Option<TrackingState> {
    match outcome {
        FetchOutcome::Success(_) => Some(TrackingState::Tracking),
        FetchOutcome::Forbidden => Some(TrackingState::Unauthorized),
        FetchOutcome::NotTrackingYet { ride_status: Some(status), .. } if status.is_terminal() => {
            Some(TrackingState::Ended)
        }
        FetchOutcome::NotTrackingYet { .. } => first_fetch.then_some(TrackingState::NotStarted),
        FetchOutcome::NotFound => first_fetch.then_some(TrackingState::Unavailable),
        FetchOutcome::TransportError(_) => first_fetch.then_some(TrackingState::Error),
    }
}

#[derive(Debug, Default, Clone)]
pub struct TrackingStateMachine {
    state: TrackingState,
}

impl TrackingStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// Back to `Loading`. Returns the new state only if it differs.
    pub fn reset(&mut self) -> Option<TrackingState> {
        self.enter(TrackingState::Loading)
    }

    /// Applies one poll outcome. Returns the new state only when it changed.
    pub fn apply(&mut self, outcome: &FetchOutcome, first_fetch: bool) -> Option<TrackingState> {
        if self.state.is_terminal() {
            return None;
        }
        classify(outcome, first_fetch).and_then(|next| self.enter(next))
    }

    fn enter(&mut self, next: TrackingState) -> Option<TrackingState> {
        if self.state == next {
            None
        } else {
            self.state = next;
            Some(next)
        }
    }
}
