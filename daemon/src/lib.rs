//! mirror-daemon: event orchestration for a smart mirror device
//!
//! Heterogeneous event sources (companion app link, push-to-talk voice
//! assistant, hardware buttons, the refresh timer, playback engine callbacks)
//! normalize their input into action tokens and hand them to a single
//! dispatcher worker, which owns all mutable device state:
//! - the music player and its playlist cache
//! - persisted display settings
//! - the master mixer and the moisture sensor
//!
//! Observers follow the device through the [`events`] bus and the
//! [`dispatch::DeviceStatus`] watch channel.

pub mod action;
pub mod adapters;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod hardware;
pub mod lifecycle;
pub mod music;
pub mod remote;
pub mod settings;
