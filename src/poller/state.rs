//! Session poller state machine values.

use crate::control::TimerHandle;
use crate::executor::TaskHandle;
use crate::types::SessionId;
use std::time::{Duration, Instant};

/// Bookkeeping for a session that is waiting on the user
#[derive(Debug)]
pub struct PollState {
    /// Session being polled
    pub session_id: SessionId,
    /// Polls that found the session still active
    pub poll_count: u32,
    /// When polling started
    pub started_at: Instant,
    /// Interval between ticks
    pub interval: Duration,
    /// Active polls allowed before timing out
    pub max_polls: u32,
    /// Repeating tick driving the polls; dropped with this state
    pub(crate) timer: TimerHandle,
    /// Status request currently running, if any
    pub(crate) in_flight: Option<TaskHandle>,
}

impl PollState {
    /// Progress shown while waiting: 50% plus 2% per poll, capped at 95%
    pub fn progress_percent(&self) -> u8 {
        let bump = self.poll_count.saturating_mul(2).min(45);
        50 + bump as u8
    }

    /// Stop the timer and flag the in-flight poll
    pub(crate) fn stop(&self) {
        self.timer.stop();
        if let Some(task) = &self.in_flight {
            task.cancel();
        }
    }
}

/// Live state of the session poller
#[derive(Debug, Default)]
pub enum PollerState {
    /// No session
    #[default]
    Idle,
    /// Create-session task running
    Creating {
        /// The create task
        task: TaskHandle,
    },
    /// Session created; waiting for the user to finish picking
    AwaitingCompletion(PollState),
    /// Session complete; result pages are being fetched
    FetchingResults {
        /// Session being fetched
        session_id: SessionId,
        /// The fetch task
        task: TaskHandle,
    },
}

/// Observable phase of the poller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No session
    Idle,
    /// Creating a session
    Creating,
    /// Waiting for the user
    AwaitingCompletion,
    /// Fetching results
    FetchingResults,
}

impl PollerState {
    /// Phase of this state
    pub fn phase(&self) -> Phase {
        match self {
            PollerState::Idle => Phase::Idle,
            PollerState::Creating { .. } => Phase::Creating,
            PollerState::AwaitingCompletion(_) => Phase::AwaitingCompletion,
            PollerState::FetchingResults { .. } => Phase::FetchingResults,
        }
    }

    /// Session the state refers to, if one has been created
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            PollerState::AwaitingCompletion(poll) => Some(&poll.session_id),
            PollerState::FetchingResults { session_id, .. } => Some(session_id),
            PollerState::Idle | PollerState::Creating { .. } => None,
        }
    }
}

/// How the last session ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Results installed
    Done {
        /// Items installed
        item_count: usize,
    },
    /// Session expired before the user finished
    Expired,
    /// Poll budget exhausted
    TimedOut {
        /// Polls performed
        polls: u32,
    },
    /// Create, poll or fetch failed
    Failed {
        /// Message shown to the user
        message: String,
    },
    /// Cancelled by the user
    Cancelled,
}
