//! Session state types

use crate::config::SessionTimings;
use crate::context::ContextBuffer;
use serde::Serialize;
use tokio::time::Instant;

// ============================================================================
// Conversation State
// ============================================================================

/// Where the conversation is in its lifecycle
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// No active call
    #[default]
    Idle,
    /// First call of the session has just connected
    Greeting,
    /// Normal turn-taking
    Active,
    /// Goodbye initiated, teardown imminent
    Ending,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Greeting => "greeting",
            ConversationState::Active => "active",
            ConversationState::Ending => "ending",
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Root aggregate for one mounted voice widget
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Credentials were valid and a transport exists
    pub configured: bool,
    /// Between a confirmed call start and call end
    pub listening: bool,
    /// Waiting on the assistant's next turn
    pub processing: bool,
    /// Debounced, user-visible form of `processing`
    pub busy_indicator: bool,
    pub conversation_state: ConversationState,
    pub retry_count: u32,
    /// Cleared by the first successful call start
    pub first_activation: bool,
    pub error_message: Option<String>,
    /// Transient informational status such as a pending retry
    pub status_message: Option<String>,
    pub context: ContextBuffer,
    /// When the user last stopped talking
    pub turn_started_at: Option<Instant>,
    /// Number of transport starts issued so far
    pub start_attempts: u64,
    /// Start attempt still awaiting `call-start`; a failure report for any
    /// other attempt is stale
    pub pending_start: Option<u64>,
}

impl Session {
    pub fn new(configured: bool) -> Self {
        Self {
            configured,
            listening: false,
            processing: false,
            busy_indicator: false,
            conversation_state: ConversationState::Idle,
            retry_count: 0,
            first_activation: true,
            error_message: None,
            status_message: None,
            context: ContextBuffer::new(),
            turn_started_at: None,
            start_attempts: 0,
            pending_start: None,
        }
    }

    pub fn is_ending(&self) -> bool {
        self.conversation_state == ConversationState::Ending
    }

    /// Read-only view for the UI renderer
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            listening: self.listening,
            configured: self.configured,
            processing: self.processing,
            busy: self.busy_indicator,
            conversation_state: self.conversation_state,
            error_message: self.error_message.clone(),
            status: self.status_line(),
        }
    }

    fn status_line(&self) -> String {
        if let Some(error) = &self.error_message {
            return error.clone();
        }
        if let Some(status) = &self.status_message {
            return status.clone();
        }
        let line = match self.conversation_state {
            ConversationState::Ending => "Ending call...",
            _ if self.busy_indicator => "Thinking...",
            _ if self.listening => "Listening... Speak now",
            _ if self.first_activation => "Click to start voice assistant",
            _ => "Voice assistant stopped",
        };
        line.to_string()
    }
}

/// What observers see after every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub listening: bool,
    pub configured: bool,
    pub processing: bool,
    pub busy: bool,
    pub conversation_state: ConversationState,
    pub error_message: Option<String>,
    pub status: String,
}

// ============================================================================
// Session Context
// ============================================================================

/// Immutable configuration for a session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    /// Absent when credentials are missing
    pub assistant_id: Option<String>,
    pub timings: SessionTimings,
}

impl SessionContext {
    pub fn new(assistant_id: Option<String>, timings: SessionTimings) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            assistant_id,
            timings,
        }
    }
}
