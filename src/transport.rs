//! Wire contract with the voice-call transport
//!
//! The transport delivers lifecycle and content events and accepts
//! start/stop commands. Audio, speech recognition and signaling stay on the
//! transport's side of this boundary.

use crate::context::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Events delivered by the transport, at least once and in order per call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransportEvent {
    CallStart,
    CallEnd,
    /// The assistant began speaking
    SpeechStart,
    /// The user stopped speaking
    SpeechEnd,
    Message { message: TransportMessage },
    Error { message: String },
    VolumeLevel { level: f32 },
}

/// Payload of a `message` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub role: Role,
    #[serde(default)]
    pub transcript: Option<String>,
}

/// Only transcripts carry conversation turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Transcript,
    #[serde(other)]
    Other,
}

/// Messages the session pushes into a live call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// Ask the assistant to say something to fill a silence
    AddMessage { role: Role, content: String },
}

/// Commands issued to the transport, as written on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum TransportCommand {
    Start { assistant_id: String },
    Stop,
    Send { message: OutboundMessage },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("Transport closed")]
    Closed,
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode transport command: {0}")]
    Encode(#[from] serde_json::Error),
}
