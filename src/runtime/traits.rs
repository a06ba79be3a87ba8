//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::config::Credentials;
use crate::transport::{OutboundMessage, TransportCommand, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Client side of the voice-call transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin a call with the given assistant. Completion does not mean the
    /// call is live; that is signalled by a `call-start` event.
    async fn start(&self, assistant_id: &str) -> Result<(), TransportError>;

    /// End any call in progress. Safe to call at any time.
    fn stop(&self);

    /// Push a message into the live call
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn start(&self, assistant_id: &str) -> Result<(), TransportError> {
        (**self).start(assistant_id).await
    }

    fn stop(&self) {
        (**self).stop();
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        (**self).send(message).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Transport that speaks JSON lines to an external call bridge.
///
/// Commands are queued to a writer task so `stop` stays synchronous.
pub struct StdioTransport {
    credentials: Credentials,
    command_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl StdioTransport {
    /// Spawn the writer task over `writer`
    pub fn new<W>(credentials: Credentials, writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_commands(command_rx, writer));
        Self {
            credentials,
            command_tx,
        }
    }

    fn enqueue(&self, command: TransportCommand) -> Result<(), TransportError> {
        self.command_tx
            .send(command)
            .map_err(|_| TransportError::Closed)
    }
}

async fn write_commands<W>(mut rx: mpsc::UnboundedReceiver<TransportCommand>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        if let Err(e) = write_line(&mut writer, &command).await {
            tracing::error!(error = %e, "Failed to write transport command");
            break;
        }
    }
}

async fn write_line<W>(writer: &mut W, command: &TransportCommand) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(command)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self, assistant_id: &str) -> Result<(), TransportError> {
        tracing::debug!(
            public_key = %crate::config::redact(&self.credentials.public_key),
            "Starting call"
        );
        self.enqueue(TransportCommand::Start {
            assistant_id: assistant_id.to_string(),
        })
        .map_err(|_| TransportError::Connect("call bridge is gone".to_string()))
    }

    fn stop(&self) {
        // Nothing to stop once the bridge has gone away.
        let _ = self.enqueue(TransportCommand::Stop);
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.enqueue(TransportCommand::Send {
            message: message.clone(),
        })
    }
}
