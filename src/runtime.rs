//! Runtime for a voice-call session
//!
//! One task per mounted widget owns the session and processes events one at
//! a time. Observers subscribe to [`SessionUpdate`]s; they never drive logic
//! except through the handle's start/stop commands.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::config::SessionTimings;
use crate::latency::LatencySummary;
use crate::state_machine::{Event, SessionContext, SessionSnapshot};
use crate::transport::TransportEvent;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Updates sent to observers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// Published whenever the visible state changes
    Snapshot(SessionSnapshot),
    /// A filler prompt was delivered during silence
    Prompt { text: String },
    /// A full latency window was summarized
    Latency(LatencySummary),
    /// A command was rejected
    Error { message: String },
}

/// Handle to interact with a running session.
///
/// Dropping the handle unmounts the session: pending timers are canceled and
/// the transport is stopped.
pub struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    update_tx: broadcast::Sender<SessionUpdate>,
    shutdown: CancellationToken,
}

/// Spawn a session runtime. `transport` is `None` when credentials are missing.
pub fn spawn_session<T>(
    assistant_id: Option<String>,
    transport: Option<T>,
    timings: SessionTimings,
) -> SessionHandle
where
    T: Transport + 'static,
{
    let context = SessionContext::new(assistant_id, timings);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (update_tx, _) = broadcast::channel(128);
    let shutdown = CancellationToken::new();

    let runtime = SessionRuntime::new(
        context,
        transport,
        event_rx,
        event_tx.clone(),
        update_tx.clone(),
        shutdown.clone(),
    );
    tokio::spawn(runtime.run());

    SessionHandle {
        event_tx,
        update_tx,
        shutdown,
    }
}

impl SessionHandle {
    /// Request a call start
    pub async fn start(&self) {
        self.send(Event::StartRequested).await;
    }

    /// Request the call to stop. Safe when no call is active.
    pub async fn stop(&self) {
        self.send(Event::StopRequested).await;
    }

    /// Feed an event from the transport
    pub async fn deliver(&self, event: TransportEvent) {
        self.send(Event::from_transport(event, Instant::now())).await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }

    /// Unmount the session
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn send(&self, event: Event) {
        if self.event_tx.send(event).await.is_err() {
            tracing::warn!("Session runtime is gone, dropping event");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
