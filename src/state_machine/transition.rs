//! Pure state transition function
//!
//! Given the current session, its context and one event, compute the next
//! session and the effects the runtime must carry out. No I/O happens here.

use super::{ConversationState, Effect, Event, Session, SessionContext};
use crate::context::{Role, Turn};
use crate::goodbye::is_goodbye;
use crate::prompts::contextual_prompt;
use crate::retry::{self, RetryDecision};
use crate::timers::TimerSlot;
use crate::transport::MessageKind;
use thiserror::Error;

/// Error message for a start command without credentials
pub const NOT_CONFIGURED: &str = "Not configured";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            new_session: session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A call is already in progress (stop it first)")]
    CallInProgress,
}

/// Pure transition function
#[allow(clippy::too_many_lines)] // One arm per event
pub fn transition(
    session: &Session,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let mut next = session.clone();

    match event {
        // ============================================================
        // Call lifecycle
        // ============================================================
        Event::CallStart => {
            next.conversation_state = if next.first_activation {
                ConversationState::Greeting
            } else {
                ConversationState::Active
            };
            next.listening = true;
            next.first_activation = false;
            next.retry_count = 0;
            next.pending_start = None;
            next.error_message = None;
            next.status_message = None;
            Ok(TransitionResult::new(next).with_effect(Effect::CancelAllTimers))
        }

        Event::CallEnd => {
            next.conversation_state = ConversationState::Idle;
            next.listening = false;
            next.pending_start = None;
            clear_processing(&mut next);
            next.turn_started_at = None;
            Ok(TransitionResult::new(next).with_effect(Effect::CancelAllTimers))
        }

        // ============================================================
        // Turn taking
        // ============================================================
        Event::SpeechStart { at } => {
            clear_processing(&mut next);
            let latency = next
                .turn_started_at
                .take()
                .map(|mark| Effect::RecordLatency {
                    sample: at.saturating_duration_since(mark),
                });

            // The closing utterance plays while ending; keep the hangup armed.
            let timers = if next.is_ending() {
                vec![
                    Effect::cancel(TimerSlot::Silence),
                    Effect::cancel(TimerSlot::ProcessingSpinner),
                ]
            } else {
                next.conversation_state = ConversationState::Active;
                vec![Effect::CancelAllTimers]
            };

            Ok(TransitionResult::new(next)
                .with_effects(timers)
                .with_effects(latency))
        }

        Event::SpeechEnd { at } => {
            next.processing = true;
            next.turn_started_at = Some(at);
            let timings = &context.timings;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::arm(TimerSlot::Silence, timings.silence))
                .with_effect(Effect::arm(
                    TimerSlot::ProcessingSpinner,
                    timings.processing_spinner,
                )))
        }

        Event::Message {
            kind,
            role,
            transcript,
        } => {
            let transcript = transcript.trim();
            if kind != MessageKind::Transcript || transcript.is_empty() {
                return Ok(TransitionResult::new(next));
            }
            next.context.push(Turn::new(role, transcript));

            match role {
                Role::User if next.listening && !next.is_ending() && is_goodbye(transcript) => {
                    tracing::info!(session_id = %context.session_id, "Explicit goodbye detected");
                    Ok(enter_ending(next, context))
                }
                Role::User => Ok(TransitionResult::new(next)),
                Role::Assistant if next.is_ending() => Ok(TransitionResult::new(next)),
                Role::Assistant => Ok(TransitionResult::new(next)
                    .with_effect(Effect::CancelAllTimers)
                    .with_effect(Effect::arm(TimerSlot::Ending, context.timings.ending))),
            }
        }

        Event::VolumeLevel { .. } => Ok(TransitionResult::new(next)),

        // ============================================================
        // Errors and retry
        // ============================================================
        Event::TransportError { message } => Ok(handle_error(next, context, &message)),

        Event::StartFailed { attempt, message } => {
            if next.pending_start != Some(attempt) {
                tracing::debug!(
                    session_id = %context.session_id,
                    attempt,
                    error = %message,
                    "Ignoring failure of an abandoned start"
                );
                return Ok(TransitionResult::new(next));
            }
            Ok(handle_error(next, context, &message))
        }

        // ============================================================
        // User commands
        // ============================================================
        Event::StartRequested => {
            if next.listening {
                return Err(TransitionError::CallInProgress);
            }
            // A manual start supersedes any pending automatic one.
            Ok(request_start(next, context).with_effect(Effect::cancel(TimerSlot::Retry)))
        }

        Event::StopRequested => {
            // Abandons any pending automatic restart along with its budget.
            next.status_message = None;
            next.retry_count = 0;
            next.pending_start = None;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::CancelAllTimers)
                .with_effect(Effect::StopTransport))
        }

        // ============================================================
        // Timers
        // ============================================================
        Event::TimerFired { handle } => Ok(timer_fired(next, context, handle.slot)),
    }
}

/// A claimed timer fired; each slot re-checks that its action still applies
fn timer_fired(mut next: Session, context: &SessionContext, slot: TimerSlot) -> TransitionResult {
    match slot {
        TimerSlot::Silence => {
            if !next.listening || next.is_ending() {
                return TransitionResult::new(next);
            }
            let text = contextual_prompt(next.context.last_user_utterance()).to_string();
            TransitionResult::new(next).with_effect(Effect::SendPrompt { text })
        }

        TimerSlot::ProcessingSpinner => {
            next.busy_indicator = next.processing;
            TransitionResult::new(next)
        }

        TimerSlot::Ending => {
            if !next.listening || next.is_ending() {
                return TransitionResult::new(next);
            }
            tracing::info!(session_id = %context.session_id, "Conversation inactive, closing");
            enter_ending(next, context)
        }

        TimerSlot::Hangup => {
            if !next.is_ending() {
                return TransitionResult::new(next);
            }
            TransitionResult::new(next).with_effect(Effect::StopTransport)
        }

        TimerSlot::Retry => {
            if next.listening {
                return TransitionResult::new(next);
            }
            request_start(next, context)
        }
    }
}

fn clear_processing(session: &mut Session) {
    session.processing = false;
    session.busy_indicator = false;
}

/// Enter `ending` and give the closing utterance time to play before hangup
fn enter_ending(mut session: Session, context: &SessionContext) -> TransitionResult {
    session.conversation_state = ConversationState::Ending;
    TransitionResult::new(session)
        .with_effect(Effect::CancelAllTimers)
        .with_effect(Effect::arm(TimerSlot::Hangup, context.timings.hangup_grace))
}

fn request_start(mut session: Session, context: &SessionContext) -> TransitionResult {
    let assistant_id = match (&context.assistant_id, session.configured) {
        (Some(id), true) => id.clone(),
        _ => {
            session.error_message = Some(NOT_CONFIGURED.to_string());
            session.status_message = None;
            return TransitionResult::new(session);
        }
    };

    session.error_message = None;
    if session.retry_count == 0 {
        session.status_message = Some("Connecting...".to_string());
    }
    session.start_attempts += 1;
    session.pending_start = Some(session.start_attempts);
    let attempt = session.start_attempts;
    TransitionResult::new(session).with_effect(Effect::StartTransport {
        assistant_id,
        attempt,
    })
}

/// Every error leaves the call down and no timers armed before classification
fn handle_error(mut session: Session, context: &SessionContext, message: &str) -> TransitionResult {
    session.listening = false;
    session.conversation_state = ConversationState::Idle;
    session.pending_start = None;
    clear_processing(&mut session);
    session.turn_started_at = None;

    match retry::decide(message, session.retry_count) {
        RetryDecision::Retry { attempt, status } => {
            tracing::warn!(
                session_id = %context.session_id,
                attempt,
                error = %message,
                "Transient transport error, retrying"
            );
            session.retry_count = attempt;
            session.error_message = None;
            session.status_message = Some(status);
            TransitionResult::new(session)
                .with_effect(Effect::CancelAllTimers)
                .with_effect(Effect::arm(TimerSlot::Retry, context.timings.retry))
        }
        RetryDecision::GiveUp { message: terminal } => {
            tracing::error!(
                session_id = %context.session_id,
                error = %terminal,
                "Transport error"
            );
            session.retry_count = 0;
            session.status_message = None;
            session.error_message = Some(terminal);
            TransitionResult::new(session).with_effect(Effect::CancelAllTimers)
        }
    }
}
