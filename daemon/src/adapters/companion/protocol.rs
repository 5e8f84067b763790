//! Companion app wire format
//!
//! Frames are bare JSON objects with no delimiter. A read may carry part of a
//! frame or several frames back to back, so inbound bytes go through a
//! [`FrameDecoder`] that yields whole objects as they complete.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{Action, ActionError};
use crate::dispatch::DeviceStatus;

/// Ticket used for frames the device sends on its own
pub const UNSOLICITED_TICKET: i64 = -1;

/// Upper bound on a single buffered frame
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

fn unsolicited() -> i64 {
    UNSOLICITED_TICKET
}

/// An action request from the app
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundToken {
    #[serde(default = "unsolicited")]
    pub ticket: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl InboundToken {
    pub fn action(&self) -> Result<Action, ActionError> {
        Action::from_parts(&self.kind, &self.args)
    }
}

/// Acknowledgment or status push: `{"ticket", "type", "args": [title, playing, volume]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusFrame {
    pub ticket: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub args: [String; 3],
}

impl StatusFrame {
    /// Reply to `token` carrying the current status
    pub fn ack(token: &InboundToken, status: &DeviceStatus) -> Self {
        Self {
            ticket: token.ticket,
            kind: token.kind.clone(),
            args: status.metadata_args(),
        }
    }

    /// Unsolicited status frame
    pub fn init(status: &DeviceStatus) -> Self {
        Self {
            ticket: UNSOLICITED_TICKET,
            kind: "init".to_string(),
            args: status.metadata_args(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Reassembles inbound frames from arbitrary read boundaries
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete frame, or `None` until more bytes arrive
    pub fn next_frame(&mut self) -> Result<Option<InboundToken>, ProtocolError> {
        let mut frames = serde_json::Deserializer::from_slice(&self.buf).into_iter::<InboundToken>();

        match frames.next() {
            Some(Ok(token)) => {
                let consumed = frames.byte_offset();
                self.buf.drain(..consumed);
                Ok(Some(token))
            }
            Some(Err(e)) if e.is_eof() => {
                if self.buf.len() > MAX_FRAME_LEN {
                    return Err(ProtocolError::TooLarge {
                        limit: MAX_FRAME_LEN,
                    });
                }
                Ok(None)
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                // only whitespace left
                self.buf.clear();
                Ok(None)
            }
        }
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
