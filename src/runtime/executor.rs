//! Session runtime executor

use super::traits::Transport;
use super::SessionUpdate;

use crate::context::Role;
use crate::latency::LatencyRecorder;
use crate::state_machine::{transition, Effect, Event, Session, SessionContext, SessionSnapshot};
use crate::timers::TimerSet;
use crate::transport::OutboundMessage;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Runs one session: applies events in order and carries out their effects
pub struct SessionRuntime<T>
where
    T: Transport + 'static,
{
    context: SessionContext,
    session: Session,
    /// Absent when the session is not configured
    transport: Option<Arc<T>>,
    timers: TimerSet,
    latency: LatencyRecorder,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    update_tx: broadcast::Sender<SessionUpdate>,
    shutdown: CancellationToken,
    last_snapshot: SessionSnapshot,
}

impl<T> SessionRuntime<T>
where
    T: Transport + 'static,
{
    pub fn new(
        context: SessionContext,
        transport: Option<T>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        update_tx: broadcast::Sender<SessionUpdate>,
        shutdown: CancellationToken,
    ) -> Self {
        let configured = transport.is_some() && context.assistant_id.is_some();
        let session = Session::new(configured);
        let last_snapshot = session.snapshot();
        Self {
            context,
            session,
            transport: transport.map(Arc::new),
            timers: TimerSet::new(),
            latency: LatencyRecorder::new(),
            event_rx,
            event_tx,
            update_tx,
            shutdown,
            last_snapshot,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            session_id = %self.context.session_id,
            configured = self.session.configured,
            "Starting session runtime"
        );
        let _ = self
            .update_tx
            .send(SessionUpdate::Snapshot(self.last_snapshot.clone()));

        // Process events in a loop until unmounted
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(event) = self.event_rx.recv() => self.process_event(event),
                else => break,
            }
        }

        self.teardown();
        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        if let Event::TimerFired { handle } = &event {
            if !self.timers.complete(*handle) {
                tracing::debug!(slot = ?handle.slot, "Ignoring stale timer");
                return;
            }
        }

        let name = event.name();
        let result = match transition(&self.session, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(event = name, error = %e, "Event rejected");
                let _ = self.update_tx.send(SessionUpdate::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        let old_state = self.session.conversation_state;
        self.session = result.new_session;
        if old_state != self.session.conversation_state {
            tracing::info!(
                session_id = %self.context.session_id,
                event = name,
                from = old_state.as_str(),
                to = self.session.conversation_state.as_str(),
                "Conversation state changed"
            );
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }

        self.publish_snapshot();
    }

    /// Execute an effect. Nothing here blocks the event loop; transport
    /// calls that may suspend run in their own task.
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartTransport {
                assistant_id,
                attempt,
            } => {
                let Some(transport) = self.transport.clone() else {
                    tracing::error!("Start requested without a transport");
                    return;
                };
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = transport.start(&assistant_id).await {
                        tracing::warn!(attempt, error = %e, "Transport start failed");
                        let _ = event_tx
                            .send(Event::StartFailed {
                                attempt,
                                message: e.to_string(),
                            })
                            .await;
                    }
                });
            }

            Effect::StopTransport => {
                if let Some(transport) = &self.transport {
                    transport.stop();
                }
            }

            Effect::ArmTimer { slot, delay } => {
                let event_tx = self.event_tx.clone();
                self.timers.arm(slot, delay, move |handle| async move {
                    let _ = event_tx.send(Event::TimerFired { handle }).await;
                });
            }

            Effect::CancelTimer { slot } => self.timers.cancel(slot),

            Effect::CancelAllTimers => self.timers.cancel_all(),

            Effect::SendPrompt { text } => {
                let Some(transport) = self.transport.clone() else {
                    return;
                };
                let update_tx = self.update_tx.clone();
                tokio::spawn(async move {
                    let message = OutboundMessage::AddMessage {
                        role: Role::Assistant,
                        content: text.clone(),
                    };
                    // Filler prompts are best effort; the call goes on without them.
                    match transport.send(&message).await {
                        Ok(()) => {
                            let _ = update_tx.send(SessionUpdate::Prompt { text });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Filler prompt not delivered");
                        }
                    }
                });
            }

            Effect::RecordLatency { sample } => {
                tracing::debug!(latency_ms = %sample.as_millis(), "Turn latency");
                if let Some(summary) = self.latency.record(sample) {
                    tracing::info!(
                        p95_ms = summary.p95_ms,
                        mean_ms = summary.mean_ms,
                        max_ms = summary.max_ms,
                        samples = summary.count,
                        "Turn latency summary"
                    );
                    let _ = self.update_tx.send(SessionUpdate::Latency(summary));
                }
            }
        }
    }

    fn publish_snapshot(&mut self) {
        let snapshot = self.session.snapshot();
        if snapshot != self.last_snapshot {
            self.last_snapshot = snapshot.clone();
            let _ = self.update_tx.send(SessionUpdate::Snapshot(snapshot));
        }
    }

    /// Unmount: no timer may fire afterwards and any call is released
    fn teardown(&mut self) {
        self.timers.cancel_all();
        if let Some(transport) = &self.transport {
            transport.stop();
        }
    }
}
