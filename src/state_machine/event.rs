//! Events that drive the session

use crate::context::Role;
use crate::timers::TimerHandle;
use crate::transport::{MessageKind, TransportEvent};
use tokio::time::Instant;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Transport events
    CallStart,
    CallEnd,
    /// The assistant began speaking
    SpeechStart {
        at: Instant,
    },
    /// The user stopped speaking
    SpeechEnd {
        at: Instant,
    },
    Message {
        kind: MessageKind,
        role: Role,
        transcript: String,
    },
    TransportError {
        message: String,
    },
    VolumeLevel {
        #[allow(dead_code)] // Reserved for metering
        level: f32,
    },

    // User commands
    StartRequested,
    StopRequested,

    /// The asynchronous transport start for `attempt` failed
    StartFailed {
        attempt: u64,
        message: String,
    },

    // Timer events
    TimerFired {
        handle: TimerHandle,
    },
}

impl Event {
    /// Convert a transport event, stamping time-sensitive events with `now`
    pub fn from_transport(event: TransportEvent, now: Instant) -> Self {
        match event {
            TransportEvent::CallStart => Event::CallStart,
            TransportEvent::CallEnd => Event::CallEnd,
            TransportEvent::SpeechStart => Event::SpeechStart { at: now },
            TransportEvent::SpeechEnd => Event::SpeechEnd { at: now },
            TransportEvent::Message { message } => Event::Message {
                kind: message.kind,
                role: message.role,
                transcript: message.transcript.unwrap_or_default(),
            },
            TransportEvent::Error { message } => Event::TransportError { message },
            TransportEvent::VolumeLevel { level } => Event::VolumeLevel { level },
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Event::CallStart => "call-start",
            Event::CallEnd => "call-end",
            Event::SpeechStart { .. } => "speech-start",
            Event::SpeechEnd { .. } => "speech-end",
            Event::Message { .. } => "message",
            Event::TransportError { .. } => "error",
            Event::VolumeLevel { .. } => "volume-level",
            Event::StartRequested => "start",
            Event::StopRequested => "stop",
            Event::StartFailed { .. } => "start-failed",
            Event::TimerFired { .. } => "timer-fired",
        }
    }
}
