//! Action tokens: the closed vocabulary every adapter funnels into the
//! dispatcher.
//!
//! Adapters receive loosely typed `{type, args}` pairs (companion app JSON,
//! assistant commands, button bindings) and decode them here exactly once.

use serde_json::Value;

/// Errors raised while decoding a `{type, args}` pair
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ActionError {
    #[error("unknown action type `{0}`")]
    Unknown(String),

    #[error("invalid arguments for `{kind}`: {reason}")]
    InvalidArgs { kind: &'static str, reason: String },
}

/// Everything the device can be asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetLocation { lat: f64, lon: f64 },
    Refresh,
    RefreshAssistant { message: String },
    SetAutoInterval { secs: u64 },
    MusicAutoplay { message: Option<String> },
    MusicForcePlay { message: Option<String> },
    MusicForcePause { message: Option<String> },
    MusicNext { message: Option<String> },
    MusicPrev { message: Option<String> },
    PlayMusicByKeyword { message: String, keyword: String },
    PlayMusicByEmotion { message: Option<String> },
    Moisture { message: Option<String> },
    Style { message: Option<String> },
    Assistant,
    AssistantMsg { message: String },
    MasterVolumeUp,
    MasterVolumeDown,
    VlcVolumeUp,
    VlcVolumeDown,
    /// The playback engine reached the end of the current track
    TrackEnded,
}

impl Action {
    /// Decode a `{type, args}` pair
    pub fn from_parts(kind: &str, args: &[Value]) -> Result<Self, ActionError> {
        let action = match kind {
            "set_location" => Action::SetLocation {
                lat: number_arg("set_location", args, 0)?,
                lon: number_arg("set_location", args, 1)?,
            },
            "refresh" => Action::Refresh,
            "refresh_assistant" => Action::RefreshAssistant {
                message: text_arg("refresh_assistant", args, 0)?,
            },
            "set_auto_interval" => {
                let secs = number_arg("set_auto_interval", args, 0)?;
                if secs < 1.0 {
                    return Err(ActionError::InvalidArgs {
                        kind: "set_auto_interval",
                        reason: format!("interval must be at least one second, got {secs}"),
                    });
                }
                Action::SetAutoInterval { secs: secs as u64 }
            }
            "music_autoplay" => Action::MusicAutoplay {
                message: message_arg(args),
            },
            "music_force_play" => Action::MusicForcePlay {
                message: message_arg(args),
            },
            "music_force_pause" => Action::MusicForcePause {
                message: message_arg(args),
            },
            "music_next" => Action::MusicNext {
                message: message_arg(args),
            },
            "music_prev" => Action::MusicPrev {
                message: message_arg(args),
            },
            "play_music_by_keyword" => Action::PlayMusicByKeyword {
                message: text_arg("play_music_by_keyword", args, 0)?,
                keyword: text_arg("play_music_by_keyword", args, 1)?,
            },
            "play_music_by_emotion" => Action::PlayMusicByEmotion {
                message: message_arg(args),
            },
            "moisture" => Action::Moisture {
                message: message_arg(args),
            },
            "style" => Action::Style {
                message: message_arg(args),
            },
            "assistant" => Action::Assistant,
            "assistant_msg" => Action::AssistantMsg {
                message: text_arg("assistant_msg", args, 0)?,
            },
            "master_volume_up" => Action::MasterVolumeUp,
            "master_volume_down" => Action::MasterVolumeDown,
            "vlc_volume_up" => Action::VlcVolumeUp,
            "vlc_volume_down" => Action::VlcVolumeDown,
            "track_ended" => Action::TrackEnded,
            other => return Err(ActionError::Unknown(other.to_string())),
        };
        Ok(action)
    }

    /// Wire name of this action
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SetLocation { .. } => "set_location",
            Action::Refresh => "refresh",
            Action::RefreshAssistant { .. } => "refresh_assistant",
            Action::SetAutoInterval { .. } => "set_auto_interval",
            Action::MusicAutoplay { .. } => "music_autoplay",
            Action::MusicForcePlay { .. } => "music_force_play",
            Action::MusicForcePause { .. } => "music_force_pause",
            Action::MusicNext { .. } => "music_next",
            Action::MusicPrev { .. } => "music_prev",
            Action::PlayMusicByKeyword { .. } => "play_music_by_keyword",
            Action::PlayMusicByEmotion { .. } => "play_music_by_emotion",
            Action::Moisture { .. } => "moisture",
            Action::Style { .. } => "style",
            Action::Assistant => "assistant",
            Action::AssistantMsg { .. } => "assistant_msg",
            Action::MasterVolumeUp => "master_volume_up",
            Action::MasterVolumeDown => "master_volume_down",
            Action::VlcVolumeUp => "vlc_volume_up",
            Action::VlcVolumeDown => "vlc_volume_down",
            Action::TrackEnded => "track_ended",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Which adapter produced a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Companion,
    Voice,
    Button,
    Timer,
    Player,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Companion => write!(f, "companion"),
            Source::Voice => write!(f, "voice"),
            Source::Button => write!(f, "button"),
            Source::Timer => write!(f, "timer"),
            Source::Player => write!(f, "player"),
        }
    }
}

/// A decoded action plus its origin; consumed exactly once by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct ActionToken {
    pub action: Action,
    pub source: Source,
}

impl ActionToken {
    pub fn new(action: Action, source: Source) -> Self {
        Self { action, source }
    }
}

fn message_arg(args: &[Value]) -> Option<String> {
    args.first().and_then(|v| v.as_str()).map(str::to_owned)
}

fn text_arg(kind: &'static str, args: &[Value], index: usize) -> Result<String, ActionError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ActionError::InvalidArgs {
            kind,
            reason: format!("argument {index} is not text: {other}"),
        }),
        None => Err(ActionError::InvalidArgs {
            kind,
            reason: format!("missing argument {index}"),
        }),
    }
}

// The companion app sends numbers as strings more often than not
fn number_arg(kind: &'static str, args: &[Value], index: usize) -> Result<f64, ActionError> {
    let parsed = match args.get(index) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| ActionError::InvalidArgs {
            kind,
            reason: format!("argument {index} is not a number"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_location_accepts_numbers_and_strings() {
        let a = Action::from_parts("set_location", &[json!(35.1), json!("129.04")]).unwrap();
        assert_eq!(a, Action::SetLocation { lat: 35.1, lon: 129.04 });
    }

    #[test]
    fn test_keyword_requires_both_args() {
        let err = Action::from_parts("play_music_by_keyword", &[json!("playing jazz")]).unwrap_err();
        assert!(matches!(err, ActionError::InvalidArgs { kind: "play_music_by_keyword", .. }));

        let a = Action::from_parts("play_music_by_keyword", &[json!("ok"), json!("jazz")]).unwrap();
        assert_eq!(
            a,
            Action::PlayMusicByKeyword {
                message: "ok".into(),
                keyword: "jazz".into()
            }
        );
    }

    #[test]
    fn test_optional_message() {
        assert_eq!(
            Action::from_parts("music_next", &[]).unwrap(),
            Action::MusicNext { message: None }
        );
        assert_eq!(
            Action::from_parts("music_next", &[json!("skipping")]).unwrap(),
            Action::MusicNext {
                message: Some("skipping".into())
            }
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            Action::from_parts("launch_rocket", &[]),
            Err(ActionError::Unknown("launch_rocket".into()))
        );
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert!(Action::from_parts("set_auto_interval", &[json!(0)]).is_err());
        assert_eq!(
            Action::from_parts("set_auto_interval", &[json!("45")]).unwrap(),
            Action::SetAutoInterval { secs: 45 }
        );
    }

    #[test]
    fn test_kind_matches_wire_name() {
        for kind in [
            "refresh",
            "assistant",
            "master_volume_up",
            "master_volume_down",
            "vlc_volume_up",
            "vlc_volume_down",
            "music_autoplay",
            "moisture",
            "style",
            "track_ended",
        ] {
            assert_eq!(Action::from_parts(kind, &[]).unwrap().kind(), kind);
        }
    }
}
