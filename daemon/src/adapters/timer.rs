//! Periodic auto-refresh
//!
//! Ticks once a second and asks for a `refresh` when the configured refresh
//! term has passed since the last one. A requested refresh is not repeated
//! until the handler records it, so each period yields at most one token.

use std::time::{Duration, Instant};

use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::action::{Action, ActionToken, Source};
use crate::dispatch::{DeviceStatus, Dispatcher, StatusReceiver, Submission};

pub const TICK: Duration = Duration::from_secs(1);

/// Decides when a refresh is owed
#[derive(Debug, Default)]
pub struct RefreshClock {
    /// `refreshed_at` of the period a refresh was already requested for
    requested_for: Option<Instant>,
}

impl RefreshClock {
    /// Whether to request a refresh at `now`
    pub fn poll(&mut self, status: &DeviceStatus, now: Instant) -> bool {
        if !status.refresh_due(now) || self.requested_for == Some(status.refreshed_at) {
            return false;
        }
        self.requested_for = Some(status.refreshed_at);
        true
    }

    /// Forget a request that never reached the dispatcher
    pub fn retry(&mut self) {
        self.requested_for = None;
    }
}

pub struct RefreshTimer {
    dispatcher: Dispatcher,
    status: StatusReceiver,
}

impl RefreshTimer {
    pub fn new(dispatcher: Dispatcher, status: StatusReceiver) -> Self {
        Self { dispatcher, status }
    }

    /// Tick until the dispatcher stops
    pub async fn run(&self) {
        let mut clock = RefreshClock::default();
        let mut interval = time::interval(TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let due = clock.poll(&self.status.borrow(), Instant::now());
            if !due {
                continue;
            }

            debug!("auto refresh due");
            match self
                .dispatcher
                .submit(ActionToken::new(Action::Refresh, Source::Timer))
            {
                Submission::Accepted => {}
                Submission::Dropped => clock.retry(),
                Submission::Closed => return,
            }
        }
    }
}
