//! When to send the next status request.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    /// No status frame has parsed yet.
    Unpolled,
    Cadence,
    /// The last poll failed and a retry is due soon.
    ErrorBackoff,
}

#[derive(Clone, Copy, Debug)]
pub struct Cadence {
    pub poll_interval: Duration,
    /// Delay before polling again after a failed poll.
    pub retry_interval: Duration,
    /// Delay before polling after a write, so that a burst of writes settles first.
    pub debounce: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            retry_interval: Duration::from_secs(1),
            debounce: Duration::from_millis(500),
        }
    }
}

pub struct PollScheduler {
    cadence: Cadence,
    state: PollState,
    next: Instant,
    dirty: bool,
    debouncing: bool,
    last_success: Option<Instant>,
}

impl PollScheduler {
    /// A scheduler with the first poll due at `now`.
    pub fn new(cadence: Cadence, now: Instant) -> Self {
        Self {
            cadence,
            state: PollState::Unpolled,
            next: now,
            dirty: false,
            debouncing: false,
            last_success: None,
        }
    }

    /// The instant the next poll is due.
    ///
    /// Pending writes push the next poll out to `now` plus the debounce delay; evaluating
    /// clears the pending flag, so a poll does go out once the writes stop.
    pub fn evaluate(&mut self, now: Instant) -> Instant {
        if std::mem::take(&mut self.dirty) {
            self.next = now + self.cadence.debounce;
            self.debouncing = true;
            debug!(message = "debouncing the next poll", delay = ?self.cadence.debounce);
        }
        self.next
    }

    pub fn is_due(&mut self, now: Instant) -> bool {
        self.evaluate(now) <= now
    }

    pub fn on_success(&mut self, now: Instant) {
        self.state = PollState::Cadence;
        self.last_success = Some(now);
        self.debouncing = false;
        self.next = now + self.cadence.poll_interval;
    }

    pub fn on_failure(&mut self, now: Instant) {
        if self.state == PollState::Cadence {
            self.state = PollState::ErrorBackoff;
        }
        self.debouncing = false;
        self.next = now + self.cadence.retry_interval;
    }

    /// Note that a confirmed write may have changed the controller's state.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn poll_now(&mut self, now: Instant) {
        self.next = now;
    }

    /// Change the cadence, rescheduling the pending poll if it is on the regular cadence.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.cadence.poll_interval = interval;
        if let (PollState::Cadence, Some(last), false) =
            (self.state, self.last_success, self.debouncing)
        {
            self.next = last + interval;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.cadence.poll_interval
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Whether a status frame ever parsed successfully.
    pub fn is_initialised(&self) -> bool {
        self.last_success.is_some()
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    pub fn is_debouncing(&self) -> bool {
        self.debouncing || self.dirty
    }
}
