//! Device status snapshot shared with the adapters
//!
//! Written only by the dispatcher worker, read by the companion link (status
//! pushes) and the timer (refresh bookkeeping).

use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::music::{PlaybackState, NO_TITLE};

pub type StatusSender = watch::Sender<DeviceStatus>;
pub type StatusReceiver = watch::Receiver<DeviceStatus>;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub title: String,
    pub playing: bool,
    /// Master volume, unknown without a mixer
    pub volume: Option<u8>,
    pub playback: PlaybackState,
    pub refreshed_at: Instant,
    pub refresh_term: Duration,
}

impl DeviceStatus {
    pub fn new(refresh_term: Duration) -> Self {
        Self {
            title: NO_TITLE.to_string(),
            playing: false,
            volume: None,
            playback: PlaybackState::Invalid,
            refreshed_at: Instant::now(),
            refresh_term,
        }
    }

    /// `[title, "true"/"false", volume]` as the companion app expects them
    pub fn metadata_args(&self) -> [String; 3] {
        [
            self.title.clone(),
            self.playing.to_string(),
            self.volume
                .map(|v| v.to_string())
                .unwrap_or_else(|| NO_TITLE.to_string()),
        ]
    }

    /// Whether the auto-refresh term has elapsed at `now`
    pub fn refresh_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.refreshed_at) >= self.refresh_term
    }
}

/// Create the status channel
pub fn channel(initial: DeviceStatus) -> (StatusSender, StatusReceiver) {
    watch::channel(initial)
}
