//! Music playback: playlist, cache and the playback state machine
//!
//! States:
//! - Invalid: nothing playable is loaded
//! - Stopped: a playlist is loaded, engine idle
//! - Loading: resolving the current entry to a stream
//! - Playing: the engine is producing audio

mod backend;
mod machine;
mod playlist;

pub use backend::{
    BackendError, EmotionClassifier, EmotionScores, PlaybackEngine, SearchPage, TrackSearch,
};
pub use machine::{
    MusicBackends, MusicPlayer, PlaybackState, PlayerError, PlayerOptions, NO_TITLE,
};
pub use playlist::{Playlist, PlaylistCache, Track};

#[cfg(test)]
pub(crate) use machine::tests as fakes;
