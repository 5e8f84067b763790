//! Persisted UI settings (location and auto-refresh term)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Settings document stored in `settings.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lat: f64,
    pub lon: f64,
    /// Seconds between automatic refreshes
    pub refresh_term: u64,
}

impl Default for Settings {
    fn default() -> Self {
        // Seoul, refreshed every 30 seconds
        Self {
            lat: 37.56779,
            lon: 126.97765,
            refresh_term: 30,
        }
    }
}

impl Settings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_term.max(1))
    }
}

/// Owner of the settings file; every mutation is written through
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Settings,
}

impl SettingsStore {
    /// Read settings from `path`, falling back to defaults for anything missing
    pub fn open(path: &Path) -> Self {
        let current = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(?path, error = %e, "unreadable settings, using defaults");
                Settings::default()
            }),
            Err(e) => {
                debug!(?path, error = %e, "no settings file, using defaults");
                Settings::default()
            }
        };

        Self {
            path: path.to_owned(),
            current,
        }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn set_location(&mut self, lat: f64, lon: f64) -> Result<(), SettingsError> {
        self.current.lat = lat;
        self.current.lon = lon;
        self.save()
    }

    pub fn set_refresh_term(&mut self, secs: u64) -> Result<(), SettingsError> {
        self.current.refresh_term = secs;
        self.save()
    }

    fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(&self.current)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let tmp = tempdir().unwrap();
        let store = SettingsStore::open(&tmp.path().join("settings.json"));
        assert_eq!(store.get(), &Settings::default());
        assert_eq!(store.get().refresh_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{"refresh_term": 60}"#).unwrap();
        let store = SettingsStore::open(&path);
        assert_eq!(store.get().refresh_term, 60);
        assert_eq!(store.get().lat, Settings::default().lat);
    }

    #[test]
    fn test_changes_are_persisted_immediately() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        let mut store = SettingsStore::open(&path);
        store.set_location(35.1, 129.0).unwrap();
        store.set_refresh_term(10).unwrap();

        let reopened = SettingsStore::open(&path);
        assert_eq!(reopened.get().lat, 35.1);
        assert_eq!(reopened.get().lon, 129.0);
        assert_eq!(reopened.get().refresh_term, 10);
    }
}
