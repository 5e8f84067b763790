//! Playback engine callbacks
//!
//! Engines report the end of a track from their own threads; the notifier
//! turns that into a `track_ended` token so auto-advance runs on the
//! dispatcher like every other state change.

use tracing::debug;

use crate::action::{Action, ActionToken, Source};
use crate::dispatch::{Dispatcher, Submission};

#[derive(Clone)]
pub struct TrackEndNotifier {
    dispatcher: Dispatcher,
}

impl TrackEndNotifier {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn track_ended(&self) -> Submission {
        debug!("engine reported end of track");
        self.dispatcher
            .submit(ActionToken::new(Action::TrackEnded, Source::Player))
    }
}
