//! Device events published on the broadcast bus
//!
//! The dispatcher and the music player emit these; any number of listeners
//! (the UI bridge, the main logger) subscribe with `Sender::subscribe`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::music::PlaybackState;

/// Bus type shared by every publisher
pub type EventBus = broadcast::Sender<DeviceEvent>;

/// Which volume a change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTarget {
    Master,
    Player,
}

/// Events emitted while handling actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// The music player changed state
    PlaybackChanged {
        state: PlaybackState,
        title: String,
    },

    VolumeChanged {
        target: VolumeTarget,
        volume: u8,
    },

    /// Text for the assistant label
    AssistantMessage { message: String },

    /// Short-lived dialog for the user
    Alert { title: String, message: String },

    /// The screen should be redrawn with fresh data
    RefreshRequested,

    /// Every resolution attempt failed; playback gave up
    NoPlayableTrack { attempts: usize },

    /// A token arrived while the dispatcher was saturated
    ActionDropped { action: String, source: String },
}

impl DeviceEvent {
    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        DeviceEvent::Alert {
            title: title.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::PlaybackChanged { state, title } => {
                write!(f, "PLAYBACK_CHANGED ({state}, {title})")
            }
            DeviceEvent::VolumeChanged { target, volume } => {
                write!(f, "VOLUME_CHANGED ({target:?}, {volume})")
            }
            DeviceEvent::AssistantMessage { message } => write!(f, "ASSISTANT_MESSAGE ({message})"),
            DeviceEvent::Alert { title, .. } => write!(f, "ALERT ({title})"),
            DeviceEvent::RefreshRequested => write!(f, "REFRESH_REQUESTED"),
            DeviceEvent::NoPlayableTrack { attempts } => {
                write!(f, "NO_PLAYABLE_TRACK ({attempts} attempts)")
            }
            DeviceEvent::ActionDropped { action, source } => {
                write!(f, "ACTION_DROPPED ({action} from {source})")
            }
        }
    }
}

/// Emit an event; having no subscribers is not an error
pub fn publish(bus: &EventBus, event: DeviceEvent) {
    let _ = bus.send(event);
}
