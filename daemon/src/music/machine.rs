//! Music playback state machine
//!
//! Tracks Invalid, Stopped, Loading and Playing over a playlist. Resolution
//! failures skip to the neighbouring entry, bounded by a retry budget.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{self, DeviceEvent, EventBus};

use super::backend::{
    dominant_emotion, BackendError, EmotionClassifier, PlaybackEngine, TrackSearch,
};
use super::playlist::{Playlist, PlaylistCache};

const VOLUME_STEP: u8 = 10;

/// Title reported when nothing is loaded
pub const NO_TITLE: &str = "default";

/// Lifecycle of the music feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No playable track is loaded
    #[default]
    Invalid,
    Stopped,
    /// A track is being resolved
    Loading,
    Playing,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Invalid => write!(f, "Invalid"),
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Loading => write!(f, "Loading"),
            PlaybackState::Playing => write!(f, "Playing"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("a search query is required")]
    QueryRequired,

    #[error("search failed: {0}")]
    Search(#[source] BackendError),

    #[error("no playable track after {attempts} attempts")]
    NoPlayableTrack { attempts: usize },

    #[error("emotion detection is unavailable")]
    EmotionUnavailable,

    #[error("no emotion could be detected")]
    NoEmotion,

    #[error("emotion classification failed: {0}")]
    Classifier(#[source] BackendError),

    #[error("volume change failed: {0}")]
    Volume(#[source] BackendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// External services the player drives
pub struct MusicBackends {
    pub search: Box<dyn TrackSearch>,
    pub engine: Box<dyn PlaybackEngine>,
    /// Present only when emotion detection is enabled
    pub classifier: Option<Box<dyn EmotionClassifier>>,
}

/// Knobs taken from the device configuration
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub page_size: usize,
    /// `None` tries every playlist entry once
    pub max_resolve_attempts: Option<usize>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            page_size: 5,
            max_resolve_attempts: None,
        }
    }
}

/// The music player driven by the dispatcher
pub struct MusicPlayer {
    backends: MusicBackends,
    options: PlayerOptions,
    cache: PlaylistCache,
    playlist: Playlist,
    state: PlaybackState,
    /// The engine holds a resolved stream for the current entry
    ready: bool,
    events: EventBus,
}

impl MusicPlayer {
    /// Create a player, restoring the last playlist from `cache` if present
    pub fn restore(
        backends: MusicBackends,
        options: PlayerOptions,
        cache: PlaylistCache,
        events: EventBus,
    ) -> Self {
        let mut player = Self {
            backends,
            options,
            cache,
            playlist: Playlist::default(),
            state: PlaybackState::Invalid,
            ready: false,
            events,
        };

        match player.cache.read() {
            Ok(playlist) if !playlist.is_empty() => {
                info!(
                    tracks = playlist.len(),
                    query = ?playlist.query(),
                    "playlist restored from cache"
                );
                player.playlist = playlist;
                player.transition_to(PlaybackState::Stopped);
            }
            Ok(_) => debug!("playlist cache is empty"),
            Err(e) => info!(error = %e, "no usable playlist cache"),
        }

        player
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_invalid(&self) -> bool {
        self.state == PlaybackState::Invalid
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PlaybackState::Stopped
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn volume(&self) -> u8 {
        self.backends.engine.volume()
    }

    /// Title of the current entry
    pub fn title(&self) -> &str {
        self.playlist
            .current()
            .map(|t| t.title.as_str())
            .unwrap_or(NO_TITLE)
    }

    /// Start playing the current entry
    pub fn play(&mut self) -> Result<(), PlayerError> {
        if self.playlist.is_empty() {
            debug!("play requested with an empty playlist");
            self.transition_to(PlaybackState::Stopped);
            return Ok(());
        }
        if self.is_playing() {
            return Ok(());
        }
        self.start_with_retry(Direction::Forward)
    }

    /// Pause playback; a no-op unless playing
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.backends.engine.pause();
        self.transition_to(PlaybackState::Stopped);
    }

    /// Skip to the next entry and play it
    pub fn move_next(&mut self) -> Result<(), PlayerError> {
        if self.playlist.is_empty() {
            return Ok(());
        }
        self.halt();
        self.advance();
        self.start_with_retry(Direction::Forward)
    }

    /// Go back to the previous entry and play it
    pub fn move_prev(&mut self) -> Result<(), PlayerError> {
        if self.playlist.is_empty() {
            return Ok(());
        }
        self.halt();
        self.retreat();
        self.start_with_retry(Direction::Backward)
    }

    /// The engine finished the current track
    pub fn on_track_ended(&mut self) -> Result<(), PlayerError> {
        if !self.is_playing() {
            debug!(state = %self.state, "track end ignored");
            return Ok(());
        }
        self.move_next()
    }

    /// Search for `count` results of `query` (or the current query)
    ///
    /// A continuation extends the playlist only when the query is the one it
    /// was built from; any other query starts a new playlist.
    pub fn search(
        &mut self,
        query: Option<&str>,
        count: usize,
        continuation: bool,
    ) -> Result<(), PlayerError> {
        self.pause();

        let query = match query.or(self.playlist.query()) {
            Some(q) => q.to_owned(),
            None => {
                warn!("search requested without a query");
                return Err(PlayerError::QueryRequired);
            }
        };

        let extending = continuation && self.playlist.query() == Some(query.as_str());
        let page_token = if extending {
            self.playlist.next_page().map(str::to_owned)
        } else {
            None
        };

        let page = self
            .backends
            .search
            .search(&query, count.max(1), page_token.as_deref())
            .map_err(|e| {
                warn!(%query, error = %e, "search failed");
                PlayerError::Search(e)
            })?;

        info!(%query, results = page.tracks.len(), extending, "search complete");

        if extending && page_token.is_some() {
            self.playlist.extend(page.tracks, page.next_page);
        } else {
            self.playlist = Playlist::new(query, page.tracks, page.next_page);
        }
        self.persist();

        self.ready = false;
        self.transition_to(PlaybackState::Stopped);
        Ok(())
    }

    /// Pick music from the listener's facial expression; returns the emotion
    pub fn search_by_emotion(&mut self) -> Result<String, PlayerError> {
        let classifier = self
            .backends
            .classifier
            .as_mut()
            .ok_or(PlayerError::EmotionUnavailable)?;

        let scores = classifier.classify().map_err(|e| {
            warn!(error = %e, "face emotion detection failed");
            PlayerError::Classifier(e)
        })?;

        let emotion = dominant_emotion(&scores)
            .ok_or(PlayerError::NoEmotion)?
            .to_owned();
        info!(%emotion, "face emotion estimated");

        let count = self.options.page_size;
        self.search(Some(&format!("{emotion} musics")), count, false)?;
        Ok(emotion)
    }

    pub fn volume_up(&mut self) -> Result<u8, PlayerError> {
        let target = self.volume().saturating_add(VOLUME_STEP).min(100);
        self.set_volume(target)
    }

    pub fn volume_down(&mut self) -> Result<u8, PlayerError> {
        let target = self.volume().saturating_sub(VOLUME_STEP);
        self.set_volume(target)
    }

    fn set_volume(&mut self, volume: u8) -> Result<u8, PlayerError> {
        self.backends
            .engine
            .set_volume(volume)
            .map_err(PlayerError::Volume)?;
        Ok(volume)
    }

    /// Stop the engine before moving the cursor
    fn halt(&mut self) {
        if self.is_playing() {
            self.backends.engine.pause();
        }
        self.ready = false;
    }

    /// Step forward, fetching the next page before wrapping around
    fn advance(&mut self) {
        self.ready = false;
        if self.playlist.at_end() && self.playlist.next_page().is_some() {
            let before = self.playlist.len();
            if let Err(e) = self.fetch_continuation() {
                warn!(error = %e, "continuation page unavailable, wrapping around");
            }
            if self.playlist.len() > before {
                self.playlist.step_forward();
                self.persist();
                return;
            }
        }
        self.playlist.step_forward();
        self.persist();
    }

    fn retreat(&mut self) {
        self.ready = false;
        self.playlist.step_back();
        self.persist();
    }

    fn fetch_continuation(&mut self) -> Result<(), PlayerError> {
        let query = self
            .playlist
            .query()
            .map(str::to_owned)
            .ok_or(PlayerError::QueryRequired)?;
        let page_token = self.playlist.next_page().map(str::to_owned);

        debug!(%query, ?page_token, "fetching continuation page");
        let page = self
            .backends
            .search
            .search(&query, self.options.page_size, page_token.as_deref())
            .map_err(PlayerError::Search)?;

        self.playlist.extend(page.tracks, page.next_page);
        Ok(())
    }

    fn retry_budget(&self) -> usize {
        self.options
            .max_resolve_attempts
            .unwrap_or(self.playlist.len())
            .max(1)
    }

    /// Resolve and play the current entry, stepping in `direction` on failure
    fn start_with_retry(&mut self, direction: Direction) -> Result<(), PlayerError> {
        let attempts = self.retry_budget();

        for attempt in 1..=attempts {
            match self.start_current() {
                Ok(()) => {
                    self.transition_to(PlaybackState::Playing);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt,
                        index = self.playlist.index(),
                        error = %e,
                        "skipping unplayable track"
                    );
                    self.ready = false;
                    if attempt < attempts {
                        match direction {
                            Direction::Forward => self.advance(),
                            Direction::Backward => self.retreat(),
                        }
                    }
                }
            }
        }

        warn!(attempts, "giving up: no playable track");
        self.transition_to(PlaybackState::Invalid);
        events::publish(&self.events, DeviceEvent::NoPlayableTrack { attempts });
        Err(PlayerError::NoPlayableTrack { attempts })
    }

    fn start_current(&mut self) -> Result<(), BackendError> {
        if !self.ready {
            let track = match self.playlist.current() {
                Some(track) => track.clone(),
                None => {
                    return Err(BackendError::Engine("playlist cursor out of range".into()))
                }
            };
            self.transition_to(PlaybackState::Loading);
            self.backends.engine.load(&track)?;
            self.ready = true;
        }
        self.backends.engine.play()
    }

    fn persist(&self) {
        if let Err(e) = self.cache.write(&self.playlist) {
            warn!(error = %e, "failed to write playlist cache");
        }
    }

    fn transition_to(&mut self, new_state: PlaybackState) {
        let old_state = self.state;
        self.state = new_state;

        if old_state != new_state {
            info!(from = %old_state, to = %new_state, "playback transition");
        }
        events::publish(
            &self.events,
            DeviceEvent::PlaybackChanged {
                state: new_state,
                title: self.title().to_owned(),
            },
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tempfile::{tempdir, TempDir};
    use tokio::sync::broadcast;

    use super::*;
    use crate::music::backend::{EmotionScores, SearchPage};
    use crate::music::playlist::Track;

    /// Search fake that numbers tracks by page
    #[derive(Clone, Default)]
    pub(crate) struct FakeSearch {
        pub calls: Arc<AtomicUsize>,
        pub continuation_calls: Arc<AtomicUsize>,
        pub fail: bool,
        pub last_page: Option<usize>,
    }

    impl TrackSearch for FakeSearch {
        fn search(
            &mut self,
            query: &str,
            count: usize,
            page_token: Option<&str>,
        ) -> Result<SearchPage, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BackendError::Network("offline".into()));
            }
            let page: usize = match page_token {
                Some(token) => {
                    self.continuation_calls.fetch_add(1, Ordering::SeqCst);
                    token.trim_start_matches("page").parse().unwrap()
                }
                None => 0,
            };
            let tracks = (0..count)
                .map(|i| Track::new(format!("{query}-{page}-{i}"), format!("{query} #{}", page * count + i)))
                .collect();
            let next_page = match self.last_page {
                Some(last) if page >= last => None,
                _ => Some(format!("page{}", page + 1)),
            };
            Ok(SearchPage { tracks, next_page })
        }
    }

    /// Engine fake with scripted unresolvable ids
    #[derive(Clone, Default)]
    pub(crate) struct FakeEngine {
        pub unresolvable: Arc<Mutex<HashSet<String>>>,
        pub loads: Arc<Mutex<Vec<String>>>,
        pub plays: Arc<AtomicUsize>,
        pub pauses: Arc<AtomicUsize>,
        pub volume: Arc<AtomicUsize>,
    }

    impl FakeEngine {
        pub fn reject_all(&self) {
            self.unresolvable.lock().unwrap().insert("*".into());
        }
    }

    impl PlaybackEngine for FakeEngine {
        fn load(&mut self, track: &Track) -> Result<(), BackendError> {
            self.loads.lock().unwrap().push(track.id.clone());
            let bad = self.unresolvable.lock().unwrap();
            if bad.contains("*") || bad.contains(&track.id) {
                return Err(BackendError::Unresolvable {
                    id: track.id.clone(),
                    reason: "video unavailable".into(),
                });
            }
            Ok(())
        }

        fn play(&mut self) -> Result<(), BackendError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn pause(&mut self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }

        fn volume(&self) -> u8 {
            self.volume.load(Ordering::SeqCst) as u8
        }

        fn set_volume(&mut self, volume: u8) -> Result<(), BackendError> {
            self.volume.store(volume as usize, Ordering::SeqCst);
            Ok(())
        }
    }

    pub(crate) struct FakeClassifier(pub Result<EmotionScores, String>);

    impl EmotionClassifier for FakeClassifier {
        fn classify(&mut self) -> Result<EmotionScores, BackendError> {
            self.0.clone().map_err(BackendError::Classifier)
        }
    }

    fn player_with(
        home: &TempDir,
        search: FakeSearch,
        engine: FakeEngine,
        classifier: Option<Box<dyn EmotionClassifier>>,
        options: PlayerOptions,
    ) -> (MusicPlayer, broadcast::Receiver<DeviceEvent>) {
        let (bus, rx) = broadcast::channel(256);
        let backends = MusicBackends {
            search: Box::new(search),
            engine: Box::new(engine),
            classifier,
        };
        let cache = PlaylistCache::new(&home.path().join("youtube_cache.json"));
        (MusicPlayer::restore(backends, options, cache, bus), rx)
    }

    fn player(home: &TempDir) -> (MusicPlayer, FakeSearch, FakeEngine) {
        let search = FakeSearch::default();
        let engine = FakeEngine::default();
        let (p, _) = player_with(home, search.clone(), engine.clone(), None, PlayerOptions::default());
        (p, search, engine)
    }

    #[test]
    fn test_initial_state_without_cache() {
        let tmp = tempdir().unwrap();
        let (p, _, _) = player(&tmp);
        assert_eq!(p.state(), PlaybackState::Invalid);
        assert_eq!(p.title(), NO_TITLE);
    }

    #[test]
    fn test_empty_playlist_play_stops_without_error() {
        let tmp = tempdir().unwrap();
        let (mut p, _, engine) = player(&tmp);
        assert!(p.play().is_ok());
        assert_eq!(p.state(), PlaybackState::Stopped);
        assert_eq!(engine.plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_search_then_play() {
        let tmp = tempdir().unwrap();
        let (mut p, _, engine) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        assert_eq!(p.state(), PlaybackState::Stopped);
        assert_eq!(p.playlist().len(), 5);
        assert_eq!(p.playlist().index(), 0);

        p.play().unwrap();
        assert_eq!(p.state(), PlaybackState::Playing);
        assert_eq!(p.title(), "jazz #0");
        assert_eq!(engine.loads.lock().unwrap().as_slice(), ["jazz-0-0"]);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let tmp = tempdir().unwrap();
        let (mut p, _, engine) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        p.play().unwrap();

        p.pause();
        p.pause();
        assert_eq!(p.state(), PlaybackState::Stopped);
        assert_eq!(engine.pauses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resume_does_not_reload() {
        let tmp = tempdir().unwrap();
        let (mut p, _, engine) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        p.play().unwrap();
        p.pause();
        p.play().unwrap();
        assert_eq!(engine.loads.lock().unwrap().len(), 1);
        assert_eq!(engine.plays.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_five_moves_trigger_one_continuation() {
        let tmp = tempdir().unwrap();
        let (mut p, search, _) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        assert_eq!(p.playlist().len(), 5);

        for _ in 0..5 {
            p.move_next().unwrap();
        }
        assert_eq!(search.continuation_calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.playlist().len(), 10);
        assert_eq!(p.playlist().index(), 5);
        assert_eq!(p.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_next_wraps_when_no_more_pages() {
        let search = FakeSearch {
            last_page: Some(0),
            ..FakeSearch::default()
        };
        let tmp = tempdir().unwrap();
        let (mut p, _) = player_with(&tmp, search.clone(), FakeEngine::default(), None, PlayerOptions::default());
        p.search(Some("jazz"), 5, false).unwrap();
        for _ in 0..5 {
            p.move_next().unwrap();
        }
        assert_eq!(p.playlist().index(), 0);
        assert_eq!(search.continuation_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_next_then_prev_returns_to_index() {
        let tmp = tempdir().unwrap();
        let (mut p, _, _) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        p.move_next().unwrap();
        let start = p.playlist().index();
        for _ in 0..3 {
            p.move_next().unwrap();
        }
        for _ in 0..3 {
            p.move_prev().unwrap();
        }
        assert_eq!(p.playlist().index(), start);
    }

    #[test]
    fn test_prev_wraps_to_last() {
        let tmp = tempdir().unwrap();
        let (mut p, _, _) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        p.move_prev().unwrap();
        assert_eq!(p.playlist().index(), 4);
    }

    #[test]
    fn test_unresolvable_track_is_skipped() {
        let engine = FakeEngine::default();
        engine.unresolvable.lock().unwrap().insert("jazz-0-0".into());
        let tmp = tempdir().unwrap();
        let (mut p, _) = player_with(&tmp, FakeSearch::default(), engine.clone(), None, PlayerOptions::default());

        p.search(Some("jazz"), 5, false).unwrap();
        p.play().unwrap();
        assert_eq!(p.playlist().index(), 1);
        assert_eq!(p.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_retry_is_bounded() {
        let engine = FakeEngine::default();
        engine.reject_all();
        let options = PlayerOptions {
            max_resolve_attempts: Some(3),
            ..PlayerOptions::default()
        };
        let tmp = tempdir().unwrap();
        let (mut p, mut rx) = player_with(&tmp, FakeSearch::default(), engine.clone(), None, options);

        p.search(Some("jazz"), 5, false).unwrap();
        let err = p.play().unwrap_err();
        assert!(matches!(err, PlayerError::NoPlayableTrack { attempts: 3 }));
        assert_eq!(p.state(), PlaybackState::Invalid);
        assert_eq!(engine.loads.lock().unwrap().len(), 3);

        let mut saw_event = false;
        while let Ok(event) = rx.try_recv() {
            saw_event |= event == DeviceEvent::NoPlayableTrack { attempts: 3 };
        }
        assert!(saw_event);
    }

    #[test]
    fn test_default_budget_is_one_pass() {
        let engine = FakeEngine::default();
        engine.reject_all();
        let tmp = tempdir().unwrap();
        let (mut p, _) = player_with(&tmp, FakeSearch::default(), engine.clone(), None, PlayerOptions::default());
        p.search(Some("jazz"), 5, false).unwrap();
        assert!(p.move_prev().is_err());
        assert_eq!(engine.loads.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_search_without_query_fails() {
        let tmp = tempdir().unwrap();
        let (mut p, _, _) = player(&tmp);
        assert!(matches!(p.search(None, 5, false), Err(PlayerError::QueryRequired)));
        assert_eq!(p.state(), PlaybackState::Invalid);
    }

    #[test]
    fn test_search_failure_keeps_playlist() {
        let search = FakeSearch::default();
        let tmp = tempdir().unwrap();
        let (mut p, _) = player_with(&tmp, search, FakeEngine::default(), None, PlayerOptions::default());
        p.search(Some("jazz"), 5, false).unwrap();

        p.backends.search = Box::new(FakeSearch {
            fail: true,
            ..FakeSearch::default()
        });
        assert!(p.search(Some("rock"), 5, false).is_err());
        assert_eq!(p.playlist().query(), Some("jazz"));
    }

    #[test]
    fn test_continuation_search_extends() {
        let tmp = tempdir().unwrap();
        let (mut p, _, _) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        p.search(None, 5, true).unwrap();
        assert_eq!(p.playlist().len(), 10);
        assert_eq!(p.playlist().query(), Some("jazz"));
    }

    #[test]
    fn test_search_honours_count() {
        let tmp = tempdir().unwrap();
        let (mut p, _, _) = player(&tmp);
        p.search(Some("jazz"), 3, false).unwrap();
        assert_eq!(p.playlist().len(), 3);
        assert_eq!(p.playlist().index(), 0);
    }

    #[test]
    fn test_continuation_with_other_query_starts_over() {
        let tmp = tempdir().unwrap();
        let (mut p, search, _) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        p.search(Some("rock"), 5, true).unwrap();

        assert_eq!(p.playlist().len(), 5);
        assert_eq!(p.playlist().query(), Some("rock"));
        assert!(p.playlist().current().unwrap().id.starts_with("rock-0-"));
        assert_eq!(search.continuation_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_restore_from_cache() {
        let search = FakeSearch::default();
        let tmp = tempdir().unwrap();
        let (mut p, _) = player_with(&tmp, search.clone(), FakeEngine::default(), None, PlayerOptions::default());
        p.search(Some("lofi"), 5, false).unwrap();
        p.move_next().unwrap();
        p.move_next().unwrap();

        let (bus, _rx) = broadcast::channel(16);
        let restored = MusicPlayer::restore(
            MusicBackends {
                search: Box::new(search),
                engine: Box::new(FakeEngine::default()),
                classifier: None,
            },
            PlayerOptions::default(),
            p.cache.clone(),
            bus,
        );
        assert_eq!(restored.state(), PlaybackState::Stopped);
        assert_eq!(restored.playlist().index(), 2);
        assert_eq!(restored.playlist().query(), Some("lofi"));
    }

    #[test]
    fn test_search_by_emotion() {
        let scores: EmotionScores = [("happiness".to_string(), 0.8), ("sadness".to_string(), 0.2)]
            .into_iter()
            .collect();
        let tmp = tempdir().unwrap();
        let (mut p, _) = player_with(
            &tmp,
            FakeSearch::default(),
            FakeEngine::default(),
            Some(Box::new(FakeClassifier(Ok(scores)))),
            PlayerOptions::default(),
        );
        assert_eq!(p.search_by_emotion().unwrap(), "happiness");
        assert_eq!(p.playlist().query(), Some("happiness musics"));
    }

    #[test]
    fn test_search_by_emotion_fails_closed() {
        let tmp = tempdir().unwrap();
        let (mut p, _, _) = player(&tmp);
        assert!(matches!(p.search_by_emotion(), Err(PlayerError::EmotionUnavailable)));

        let tmp = tempdir().unwrap();
        let (mut p, _) = player_with(
            &tmp,
            FakeSearch::default(),
            FakeEngine::default(),
            Some(Box::new(FakeClassifier(Err("no face".into())))),
            PlayerOptions::default(),
        );
        assert!(matches!(p.search_by_emotion(), Err(PlayerError::Classifier(_))));
        assert_eq!(p.state(), PlaybackState::Invalid);
    }

    #[test]
    fn test_track_end_advances_only_while_playing() {
        let tmp = tempdir().unwrap();
        let (mut p, _, _) = player(&tmp);
        p.search(Some("jazz"), 5, false).unwrap();
        p.on_track_ended().unwrap();
        assert_eq!(p.playlist().index(), 0);

        p.play().unwrap();
        p.on_track_ended().unwrap();
        assert_eq!(p.playlist().index(), 1);
        assert!(p.is_playing());
    }

    #[test]
    fn test_volume_is_clamped() {
        let engine = FakeEngine::default();
        engine.volume.store(95, Ordering::SeqCst);
        let tmp = tempdir().unwrap();
        let (mut p, _) = player_with(&tmp, FakeSearch::default(), engine, None, PlayerOptions::default());
        assert_eq!(p.volume_up().unwrap(), 100);
        engine_volume_down_to_zero(&mut p);
    }

    fn engine_volume_down_to_zero(p: &mut MusicPlayer) {
        for _ in 0..12 {
            p.volume_down().unwrap();
        }
        assert_eq!(p.volume(), 0);
    }
}
