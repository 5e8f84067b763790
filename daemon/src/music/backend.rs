//! Collaborators the music player drives: search, playback engine and the
//! facial emotion classifier. Concrete implementations wrap vendor SDKs and
//! live outside this crate.

use std::collections::BTreeMap;

use super::playlist::Track;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("network request failed: {0}")]
    Network(String),

    #[error("track `{id}` could not be resolved to a stream: {reason}")]
    Unresolvable { id: String, reason: String },

    #[error("playback engine error: {0}")]
    Engine(String),

    #[error("emotion classification failed: {0}")]
    Classifier(String),
}

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub tracks: Vec<Track>,
    /// Cursor for the following page, if the service has more
    pub next_page: Option<String>,
}

/// Music search service
pub trait TrackSearch: Send {
    fn search(
        &mut self,
        query: &str,
        count: usize,
        page_token: Option<&str>,
    ) -> Result<SearchPage, BackendError>;
}

/// Audio output that plays one resolved track at a time
pub trait PlaybackEngine: Send {
    /// Resolve `track` to a playable stream and load it
    fn load(&mut self, track: &Track) -> Result<(), BackendError>;

    fn play(&mut self) -> Result<(), BackendError>;

    fn pause(&mut self);

    fn volume(&self) -> u8;

    fn set_volume(&mut self, volume: u8) -> Result<(), BackendError>;
}

/// Emotion label → confidence score
pub type EmotionScores = BTreeMap<String, f64>;

/// Camera-based facial emotion classifier
pub trait EmotionClassifier: Send {
    fn classify(&mut self) -> Result<EmotionScores, BackendError>;
}

/// Highest-scoring label; ties resolve to the alphabetically first label
pub fn dominant_emotion(scores: &EmotionScores) -> Option<&str> {
    scores
        .iter()
        .filter(|(_, score)| score.is_finite() && **score > 0.0)
        .fold(None, |best: Option<(&String, f64)>, (label, score)| match best {
            Some((_, top)) if top >= *score => best,
            _ => Some((label, *score)),
        })
        .map(|(label, _)| label.as_str())
}
