//! Companion app adapter

mod protocol;
mod server;

pub use protocol::{FrameDecoder, InboundToken, ProtocolError, StatusFrame};
pub use server::{CompanionError, CompanionServer};
