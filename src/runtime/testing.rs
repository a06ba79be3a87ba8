//! Mock implementations for testing
//!
//! These mocks enable integration testing without a real call transport.

use super::traits::*;
use super::{spawn_session, SessionHandle, SessionUpdate};
use crate::config::SessionTimings;
use crate::state_machine::SessionSnapshot;
use crate::transport::{OutboundMessage, TransportCommand, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Mock Transport
// ============================================================================

/// Mock transport that records every command it receives
#[derive(Default)]
pub struct MockTransport {
    /// Results for upcoming `start` calls; empty means success
    start_results: Mutex<VecDeque<Result<(), TransportError>>>,
    /// How long each `start` takes before reporting its result
    start_delay: Mutex<Duration>,
    /// Fail every `send`
    fail_sends: AtomicBool,
    /// Record of all commands issued
    pub commands: Mutex<Vec<TransportCommand>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` call fail
    pub fn queue_start_error(&self, error: TransportError) {
        self.start_results.lock().unwrap().push_back(Err(error));
    }

    pub fn set_start_delay(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = delay;
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn recorded_commands(&self) -> Vec<TransportCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn start_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCommand::Start { .. }))
    }

    pub fn stop_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCommand::Stop))
    }

    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                TransportCommand::Send { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&TransportCommand) -> bool) -> usize {
        self.commands.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start(&self, assistant_id: &str) -> Result<(), TransportError> {
        self.commands.lock().unwrap().push(TransportCommand::Start {
            assistant_id: assistant_id.to_string(),
        });
        let delay = *self.start_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.start_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn stop(&self) {
        self.commands.lock().unwrap().push(TransportCommand::Stop);
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.commands.lock().unwrap().push(TransportCommand::Send {
            message: message.clone(),
        });
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

// ============================================================================
// Test Session Harness
// ============================================================================

/// A running session wired to a [`MockTransport`]
pub struct TestSession {
    pub handle: SessionHandle,
    pub transport: Arc<MockTransport>,
    updates: broadcast::Receiver<SessionUpdate>,
}

impl TestSession {
    pub fn configured() -> Self {
        let transport = Arc::new(MockTransport::new());
        let handle = spawn_session(
            Some("assistant-1".to_string()),
            Some(Arc::clone(&transport)),
            SessionTimings::default(),
        );
        let updates = handle.subscribe();
        Self {
            handle,
            transport,
            updates,
        }
    }

    pub fn unconfigured() -> Self {
        let transport = Arc::new(MockTransport::new());
        let handle = spawn_session::<Arc<MockTransport>>(None, None, SessionTimings::default());
        let updates = handle.subscribe();
        Self {
            handle,
            transport,
            updates,
        }
    }

    /// Wait for an update matching `pred`
    pub async fn wait_for<F>(&mut self, timeout: Duration, mut pred: F) -> Option<SessionUpdate>
    where
        F: FnMut(&SessionUpdate) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.updates.recv()).await {
                Ok(Ok(update)) if pred(&update) => return Some(update),
                Ok(Ok(_) | Err(broadcast::error::RecvError::Lagged(_))) => {}
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
            }
        }
    }

    /// Wait for a snapshot matching `pred`
    pub async fn wait_for_snapshot<F>(&mut self, timeout: Duration, pred: F) -> Option<SessionSnapshot>
    where
        F: Fn(&SessionSnapshot) -> bool,
    {
        match self
            .wait_for(timeout, |u| matches!(u, SessionUpdate::Snapshot(s) if pred(s)))
            .await
        {
            Some(SessionUpdate::Snapshot(s)) => Some(s),
            _ => None,
        }
    }

    /// Poll the mock transport until `pred` holds
    pub async fn wait_for_transport<F>(&self, timeout: Duration, pred: F) -> bool
    where
        F: Fn(&MockTransport) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if pred(&self.transport) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        pred(&self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use crate::state_machine::ConversationState;
    use crate::transport::{MessageKind, TransportEvent, TransportMessage};

    const WAIT: Duration = Duration::from_secs(5);

    fn transcript(role: Role, text: &str) -> TransportEvent {
        TransportEvent::Message {
            message: TransportMessage {
                kind: MessageKind::Transcript,
                role,
                transcript: Some(text.to_string()),
            },
        }
    }

    fn network_error() -> TransportEvent {
        TransportEvent::Error {
            message: "WebSocket connection lost".to_string(),
        }
    }

    async fn live_session() -> TestSession {
        let mut rt = TestSession::configured();
        rt.handle.start().await;
        assert!(rt.wait_for_transport(WAIT, |t| t.start_count() == 1).await);
        rt.handle.deliver(TransportEvent::CallStart).await;
        assert!(rt.wait_for_snapshot(WAIT, |s| s.listening).await.is_some());
        rt
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_unconfigured_reports_error() {
        let mut rt = TestSession::unconfigured();
        rt.handle.start().await;

        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.error_message.is_some())
            .await
            .expect("error snapshot");
        assert!(!snapshot.configured);
        assert_eq!(snapshot.error_message.as_deref(), Some("Not configured"));
        assert_eq!(snapshot.status, "Not configured");
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_lifecycle() {
        let mut rt = TestSession::configured();
        rt.handle.start().await;
        assert!(rt.wait_for_transport(WAIT, |t| t.start_count() == 1).await);
        assert_eq!(
            rt.transport.recorded_commands()[0],
            TransportCommand::Start {
                assistant_id: "assistant-1".to_string()
            }
        );

        rt.handle.deliver(TransportEvent::CallStart).await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.listening)
            .await
            .expect("listening snapshot");
        assert_eq!(snapshot.conversation_state, ConversationState::Greeting);
        assert_eq!(snapshot.status, "Listening... Speak now");

        rt.handle.stop().await;
        assert!(rt.wait_for_transport(WAIT, |t| t.stop_count() == 1).await);

        rt.handle.deliver(TransportEvent::CallEnd).await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| !s.listening)
            .await
            .expect("stopped snapshot");
        assert_eq!(snapshot.conversation_state, ConversationState::Idle);
        assert_eq!(snapshot.status, "Voice assistant stopped");

        // Second call skips the greeting
        rt.handle.start().await;
        rt.handle.deliver(TransportEvent::CallStart).await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.listening)
            .await
            .expect("second call");
        assert_eq!(snapshot.conversation_state, ConversationState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_listening_is_rejected() {
        let mut rt = live_session().await;
        rt.handle.start().await;

        let update = rt
            .wait_for(WAIT, |u| matches!(u, SessionUpdate::Error { .. }))
            .await;
        assert!(update.is_some());
        assert_eq!(rt.transport.start_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retry_then_terminal_error() {
        let mut rt = live_session().await;

        rt.handle.deliver(network_error()).await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.status.contains("retrying"))
            .await
            .expect("retry status");
        assert_eq!(snapshot.status, "Connection issue, retrying... (1/2)");
        assert!(!snapshot.listening);
        assert!(rt.wait_for_transport(WAIT, |t| t.start_count() == 2).await);

        rt.handle.deliver(network_error()).await;
        assert!(rt.wait_for_transport(WAIT, |t| t.start_count() == 3).await);

        rt.handle.deliver(network_error()).await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.error_message.is_some())
            .await
            .expect("terminal error");
        assert_eq!(
            snapshot.error_message.as_deref(),
            Some("Failed after 2 retries: WebSocket connection lost")
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rt.transport.start_count(), 3, "one manual + two automatic");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_never_restarts() {
        let mut rt = live_session().await;

        rt.handle
            .deliver(TransportEvent::Error {
                message: "Unauthorized".to_string(),
            })
            .await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.error_message.is_some())
            .await
            .expect("terminal error");
        assert_eq!(snapshot.error_message.as_deref(), Some("Unauthorized"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rt.transport.start_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_is_retried() {
        let mut rt = TestSession::configured();
        rt.transport
            .queue_start_error(TransportError::Connect("room unavailable".to_string()));

        rt.handle.start().await;
        assert!(rt.wait_for_transport(WAIT, |t| t.start_count() == 2).await);

        rt.handle.deliver(TransportEvent::CallStart).await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.listening)
            .await
            .expect("connected after retry");
        assert_eq!(snapshot.error_message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_slow_failing_start_does_not_restart() {
        let mut rt = TestSession::configured();
        rt.transport.set_start_delay(Duration::from_millis(500));
        rt.transport
            .queue_start_error(TransportError::Connect("network unreachable".to_string()));

        rt.handle.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        rt.handle.stop().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rt.transport.start_count(), 1);
        let snapshot = rt
            .wait_for_snapshot(Duration::from_millis(10), |s| s.status.contains("retrying"))
            .await;
        assert!(snapshot.is_none(), "stopped session must not schedule a retry");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_retry() {
        let rt = live_session().await;
        rt.handle.deliver(network_error()).await;
        rt.handle.stop().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rt.transport.start_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_sends_contextual_prompt() {
        let mut rt = live_session().await;
        rt.handle
            .deliver(transcript(Role::User, "How much does it cost?"))
            .await;
        rt.handle.deliver(TransportEvent::SpeechEnd).await;

        let update = rt
            .wait_for(Duration::from_secs(10), |u| {
                matches!(u, SessionUpdate::Prompt { .. })
            })
            .await;
        let Some(SessionUpdate::Prompt { text }) = update else {
            panic!("Expected a filler prompt");
        };
        assert_eq!(
            text,
            crate::prompts::contextual_prompt(Some("How much does it cost?"))
        );
        assert!(
            rt.wait_for_transport(WAIT, |t| t.sent_messages().len() == 1)
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_undelivered_prompt_is_not_published() {
        let mut rt = live_session().await;
        rt.transport.fail_sends();
        rt.handle.deliver(TransportEvent::SpeechEnd).await;

        assert!(
            rt.wait_for_transport(Duration::from_secs(10), |t| t.sent_messages().len() == 1)
                .await
        );
        let update = rt
            .wait_for(Duration::from_secs(1), |u| {
                matches!(u, SessionUpdate::Prompt { .. })
            })
            .await;
        assert!(update.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_assistant_reply_cancels_silence_and_spinner() {
        let mut rt = live_session().await;
        rt.handle.deliver(TransportEvent::SpeechEnd).await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.processing)
            .await
            .expect("processing");
        assert!(!snapshot.busy, "spinner is debounced");

        tokio::time::sleep(Duration::from_millis(100)).await;
        rt.handle.deliver(TransportEvent::SpeechStart).await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| !s.processing)
            .await
            .expect("reply started");
        assert!(!snapshot.busy);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rt.transport.sent_messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_indicator_after_debounce() {
        let mut rt = live_session().await;
        rt.handle.deliver(TransportEvent::SpeechEnd).await;

        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.busy)
            .await
            .expect("busy indicator");
        assert_eq!(snapshot.status, "Thinking...");
    }

    #[tokio::test(start_paused = true)]
    async fn test_goodbye_hangs_up_after_grace() {
        let mut rt = live_session().await;
        rt.handle
            .deliver(transcript(Role::User, "Okay, goodbye"))
            .await;
        let snapshot = rt
            .wait_for_snapshot(WAIT, |s| s.conversation_state == ConversationState::Ending)
            .await
            .expect("ending");
        assert_eq!(snapshot.status, "Ending call...");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rt.transport.stop_count(), 0, "closing line still playing");

        assert!(rt.wait_for_transport(WAIT, |t| t.stop_count() == 1).await);
        rt.handle.deliver(TransportEvent::CallEnd).await;
        assert!(rt
            .wait_for_snapshot(WAIT, |s| s.conversation_state == ConversationState::Idle)
            .await
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_closes_conversation() {
        let mut rt = live_session().await;
        rt.handle
            .deliver(transcript(Role::Assistant, "Anything else?"))
            .await;

        let ending = rt
            .wait_for_snapshot(Duration::from_secs(20), |s| {
                s.conversation_state == ConversationState::Ending
            })
            .await;
        assert!(ending.is_some());
        assert!(rt.wait_for_transport(WAIT, |t| t.stop_count() == 1).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_summary_after_twenty_turns() {
        let mut rt = live_session().await;

        for _ in 0..20 {
            rt.handle.deliver(TransportEvent::SpeechEnd).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            rt.handle.deliver(TransportEvent::SpeechStart).await;
        }

        let update = rt
            .wait_for(WAIT, |u| matches!(u, SessionUpdate::Latency(_)))
            .await;
        let Some(SessionUpdate::Latency(summary)) = update else {
            panic!("Expected a latency summary");
        };
        assert_eq!(summary.count, 20);
        assert_eq!(summary.p95_ms, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_timers_and_stops_transport() {
        let rt = live_session().await;
        rt.handle
            .deliver(transcript(Role::Assistant, "Anything else?"))
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let transport = Arc::clone(&rt.transport);
        drop(rt);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.stop_count(), 1);

        // The armed ending timer must not trigger a hangup later
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_level_publishes_nothing() {
        let mut rt = live_session().await;
        rt.handle
            .deliver(TransportEvent::VolumeLevel { level: 0.4 })
            .await;
        let update = rt.wait_for(Duration::from_secs(1), |_| true).await;
        assert!(update.is_none());
    }
}
