//! Action handlers: one arm per action, applied on the dispatcher worker

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::action::{Action, ActionToken};
use crate::adapters::voice::AssistantTrigger;
use crate::config::Config;
use crate::events::{self, DeviceEvent, EventBus, VolumeTarget};
use crate::hardware::{
    median, MoistureMeter, MoistureSensor, Sampling, VolumeControl, VolumeError,
};
use crate::music::{
    MusicBackends, MusicPlayer, PlaybackState, PlayerError, PlayerOptions, PlaylistCache,
    NO_TITLE,
};
use crate::remote::{SkinConditionUploader, StyleRecommender};
use crate::settings::{SettingsError, SettingsStore};

use super::queue::ActionSink;
use super::status::{DeviceStatus, StatusSender};

/// Fewer samples than this makes a moisture reading unreliable
const MIN_RELIABLE_SAMPLES: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// Collaborators wired in at startup; `None` means not present on this device
#[derive(Default)]
pub struct Services {
    pub music: Option<MusicBackends>,
    pub mixer: Option<Box<dyn VolumeControl>>,
    pub moisture_sensor: Option<Box<dyn MoistureSensor>>,
    pub skin_uploader: Option<Box<dyn SkinConditionUploader>>,
    pub style: Option<Box<dyn StyleRecommender>>,
}

/// Owner of all mutable device state; only the dispatcher worker touches it
pub struct ActionHandler {
    config: Arc<Config>,
    settings: SettingsStore,
    music: Option<MusicPlayer>,
    mixer: Option<Box<dyn VolumeControl>>,
    moisture: Option<MoistureMeter>,
    sampling: Sampling,
    skin_uploader: Option<Box<dyn SkinConditionUploader>>,
    style: Option<Box<dyn StyleRecommender>>,
    trigger: AssistantTrigger,
    refreshed_at: Instant,
    events: EventBus,
    status: StatusSender,
}

impl ActionHandler {
    pub fn new(
        config: Arc<Config>,
        services: Services,
        trigger: AssistantTrigger,
        events: EventBus,
        status: StatusSender,
    ) -> Self {
        let features = &config.features;
        let settings = SettingsStore::open(&config.settings_path());

        let music = match services.music {
            Some(mut backends) if features.youtube_music_enabled => {
                if !features.face_emotion_detection_enabled {
                    backends.classifier = None;
                }
                let options = PlayerOptions {
                    page_size: config.search_page_size,
                    max_resolve_attempts: config.max_resolve_attempts,
                };
                let cache = PlaylistCache::new(&config.playlist_cache_path());
                Some(MusicPlayer::restore(backends, options, cache, events.clone()))
            }
            Some(_) => {
                info!("youtube music disabled by configuration");
                None
            }
            None => None,
        };

        let moisture = services
            .moisture_sensor
            .filter(|_| features.moisture_sensor_enabled)
            .map(MoistureMeter::new);
        let style = services
            .style
            .filter(|_| features.style_recommendation_enabled);
        let skin_uploader = services
            .skin_uploader
            .filter(|_| features.google_drive_enabled);

        let handler = Self {
            settings,
            music,
            mixer: services.mixer,
            moisture,
            sampling: Sampling::default(),
            skin_uploader,
            style,
            trigger,
            refreshed_at: Instant::now(),
            events,
            status,
            config,
        };
        handler.publish_status();
        handler
    }

    #[cfg(test)]
    pub(crate) fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Current music state; Invalid when the feature is off
    pub fn playback_state(&self) -> PlaybackState {
        self.music
            .as_ref()
            .map(MusicPlayer::state)
            .unwrap_or(PlaybackState::Invalid)
    }

    fn apply(&mut self, action: Action) -> Result<(), HandlerError> {
        match action {
            Action::SetLocation { lat, lon } => {
                self.settings.set_location(lat, lon)?;
                info!(lat, lon, "location updated");
                self.refresh();
            }

            Action::Refresh => {
                self.refresh();
                alert(&self.events, "Refresh", "The screen has been refreshed");
            }

            Action::RefreshAssistant { message } => {
                self.refresh();
                say(&self.events, message);
            }

            Action::SetAutoInterval { secs } => {
                self.settings.set_refresh_term(secs)?;
                info!(secs, "auto refresh interval updated");
                self.refresh();
            }

            Action::MusicAutoplay { message } => {
                say_opt(&self.events, message);
                if let Some(player) = playable(&mut self.music) {
                    if player.is_stopped() {
                        player.play()?;
                    } else {
                        player.pause();
                    }
                }
            }

            Action::MusicForcePlay { message } => {
                if let Some(player) = self.music.as_mut() {
                    if player.is_invalid() {
                        say(&self.events, "Music cannot be played");
                    } else {
                        say_opt(&self.events, message);
                        player.play()?;
                    }
                }
            }

            Action::MusicForcePause { message } => {
                if let Some(player) = self.music.as_mut() {
                    if player.is_invalid() {
                        say(&self.events, "Music cannot be played");
                    } else {
                        say_opt(&self.events, message);
                        player.pause();
                    }
                }
            }

            Action::MusicNext { message } => {
                say_opt(&self.events, message);
                if let Some(player) = playable(&mut self.music) {
                    player.move_next()?;
                }
            }

            Action::MusicPrev { message } => {
                say_opt(&self.events, message);
                if let Some(player) = playable(&mut self.music) {
                    player.move_prev()?;
                }
            }

            Action::PlayMusicByKeyword { message, keyword } => {
                let count = self.config.search_page_size;
                if let Some(player) = self.music.as_mut() {
                    player.pause();
                    player.search(Some(&keyword), count, false)?;
                    player.play()?;
                    say(&self.events, message);
                }
            }

            Action::PlayMusicByEmotion { message } => self.play_by_emotion(message)?,

            Action::Moisture { message } => {
                say_opt(&self.events, message);
                self.measure_moisture();
            }

            Action::Style { message } => {
                say_opt(&self.events, message);
                self.recommend_style();
            }

            Action::Assistant => {
                if self.config.features.google_assistant_enabled {
                    self.trigger.trigger();
                } else {
                    debug!("assistant disabled, trigger ignored");
                }
            }

            Action::AssistantMsg { message } => say(&self.events, message),

            Action::MasterVolumeUp | Action::MasterVolumeDown => {
                if let Some(mixer) = self.mixer.as_mut() {
                    let volume = if action == Action::MasterVolumeUp {
                        mixer.volume_up()?
                    } else {
                        mixer.volume_down()?
                    };
                    events::publish(
                        &self.events,
                        DeviceEvent::VolumeChanged {
                            target: VolumeTarget::Master,
                            volume,
                        },
                    );
                }
            }

            Action::VlcVolumeUp | Action::VlcVolumeDown => {
                if let Some(player) = self.music.as_mut() {
                    let volume = if action == Action::VlcVolumeUp {
                        player.volume_up()?
                    } else {
                        player.volume_down()?
                    };
                    events::publish(
                        &self.events,
                        DeviceEvent::VolumeChanged {
                            target: VolumeTarget::Player,
                            volume,
                        },
                    );
                }
            }

            Action::TrackEnded => {
                if let Some(player) = self.music.as_mut() {
                    player.on_track_ended()?;
                }
            }
        }
        Ok(())
    }

    fn refresh(&mut self) {
        self.refreshed_at = Instant::now();
        events::publish(&self.events, DeviceEvent::RefreshRequested);
    }

    fn play_by_emotion(&mut self, message: Option<String>) -> Result<(), HandlerError> {
        let Some(player) = self.music.as_mut() else {
            debug!("music disabled, emotion request ignored");
            return Ok(());
        };

        say_opt(&self.events, message);
        alert(&self.events, "Emotion analysis", "Face the mirror to analyse your expression");

        player.pause();
        match player.search_by_emotion() {
            Ok(emotion) => {
                let played = player.play();
                alert(
                    &self.events,
                    "Emotion analysis",
                    format!("Current emotion: {emotion}\nPlaying matching music"),
                );
                played?;
            }
            Err(e) => {
                warn!(error = %e, "emotion based search failed");
                alert(&self.events, "Emotion analysis", "Emotion analysis failed");
            }
        }
        Ok(())
    }

    fn measure_moisture(&mut self) {
        let Some(meter) = self.moisture.as_mut() else {
            debug!("moisture sensor disabled");
            return;
        };

        alert(&self.events, "Skin analysis", "Touch the sensor to your skin");

        let message = match meter.measure(&self.sampling) {
            Ok(samples) => match median(&samples) {
                Some(value) => {
                    info!(value, samples = samples.len(), "moisture measured");
                    if let Some(uploader) = self.skin_uploader.as_mut() {
                        let today = chrono::Local::now().date_naive();
                        if let Err(e) = uploader.upload(value, today) {
                            warn!(error = %e, "failed to upload skin condition");
                        }
                    }
                    let mut message = format!("Measured moisture: {value}");
                    if samples.len() < MIN_RELIABLE_SAMPLES {
                        message.push_str("\nWarning: too few samples, the result may be inaccurate");
                    }
                    message
                }
                None => "No moisture sample could be taken".to_string(),
            },
            Err(e) => {
                warn!(error = %e, "moisture measurement failed");
                "Measurement failed.\nCheck that the sensor is working.".to_string()
            }
        };

        alert(&self.events, "Skin moisture", message);
    }

    fn recommend_style(&mut self) {
        let Some(style) = self.style.as_mut() else {
            debug!("style recommendation disabled");
            return;
        };

        alert(&self.events, "Style analysis", "Stand in front of the mirror");

        let outcome = style.capture_and_search().and_then(|results| match results {
            Some(results) => style.upload(&results).map(|()| true),
            None => Ok(false),
        });

        let message = match outcome {
            Ok(true) => "Check the analysis on your phone",
            Ok(false) => "No similar styles were found",
            Err(e) => {
                warn!(error = %e, "style recommendation failed");
                "Analysis failed.\nCheck that the camera is working."
            }
        };
        alert(&self.events, "Style analysis", message);
    }

    fn publish_status(&self) {
        let (title, playing, playback) = match &self.music {
            Some(player) => (player.title().to_owned(), player.is_playing(), player.state()),
            None => (NO_TITLE.to_string(), false, PlaybackState::Invalid),
        };
        let next = DeviceStatus {
            title,
            playing,
            volume: self.mixer.as_ref().map(|m| m.volume()),
            playback,
            refreshed_at: self.refreshed_at,
            refresh_term: self.settings.get().refresh_interval(),
        };

        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl ActionSink for ActionHandler {
    fn handle(&mut self, token: ActionToken) {
        let kind = token.action.kind();
        debug!(action = kind, source = %token.source, "handling action");

        if let Err(e) = self.apply(token.action) {
            warn!(action = kind, error = %e, "action failed");
        }
        self.publish_status();
    }
}

/// The player, unless nothing playable is loaded
fn playable(music: &mut Option<MusicPlayer>) -> Option<&mut MusicPlayer> {
    music.as_mut().filter(|p| !p.is_invalid())
}

fn say(events: &EventBus, message: impl Into<String>) {
    events::publish(
        events,
        DeviceEvent::AssistantMessage {
            message: message.into(),
        },
    );
}

fn say_opt(events: &EventBus, message: Option<String>) {
    if let Some(message) = message {
        say(events, message);
    }
}

fn alert(events: &EventBus, title: &str, message: impl Into<String>) {
    events::publish(events, DeviceEvent::alert(title, message));
}
