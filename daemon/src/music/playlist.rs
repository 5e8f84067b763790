//! Playlist with a wrapping cursor, and its on-disk cache

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A searchable, playable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Ordered tracks plus the current position and search context
///
/// `index < tracks.len()` whenever the playlist is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(rename = "playlist")]
    tracks: Vec<Track>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    index: usize,
    #[serde(default)]
    next_page: Option<String>,
}

impl Playlist {
    pub fn new(query: impl Into<String>, tracks: Vec<Track>, next_page: Option<String>) -> Self {
        Self {
            tracks,
            query: Some(query.into()),
            index: 0,
            next_page,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    /// Append a continuation page
    pub fn extend(&mut self, tracks: Vec<Track>, next_page: Option<String>) {
        self.tracks.extend(tracks);
        self.next_page = next_page;
    }

    /// Whether stepping forward would run past the last entry
    pub fn at_end(&self) -> bool {
        self.index + 1 >= self.tracks.len()
    }

    /// Step forward, wrapping to the first entry
    pub fn step_forward(&mut self) {
        if !self.tracks.is_empty() {
            self.index = (self.index + 1) % self.tracks.len();
        }
    }

    /// Step backward, wrapping to the last entry
    pub fn step_back(&mut self) {
        if !self.tracks.is_empty() {
            self.index = (self.index + self.tracks.len() - 1) % self.tracks.len();
        }
    }

    fn clamp_index(&mut self) {
        if self.index >= self.tracks.len() {
            self.index = 0;
        }
    }
}

/// Errors reading or writing the playlist cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("playlist cache I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("playlist cache format: {0}")]
    Format(#[from] serde_json::Error),
}

/// JSON file holding the last search results
#[derive(Debug, Clone)]
pub struct PlaylistCache {
    path: PathBuf,
}

impl PlaylistCache {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }

    pub fn read(&self) -> Result<Playlist, CacheError> {
        let content = std::fs::read_to_string(&self.path)?;
        let mut playlist: Playlist = serde_json::from_str(&content)?;
        playlist.clamp_index();
        Ok(playlist)
    }

    /// Rewrite the whole cache file
    pub fn write(&self, playlist: &Playlist) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(playlist)?)?;
        Ok(())
    }
}
