//! Event sources feeding the dispatcher
//!
//! Each adapter normalizes its input into an [`ActionToken`](crate::action::ActionToken)
//! and submits it; none of them touch device state directly.

pub mod buttons;
pub mod companion;
pub mod player;
pub mod timer;
pub mod voice;

pub use buttons::{ButtonAdapter, ButtonBindings, GpioMonitor};
pub use companion::CompanionServer;
pub use player::TrackEndNotifier;
pub use timer::RefreshTimer;
pub use voice::{AssistantTrigger, VoiceAssistant, VoiceListener};
