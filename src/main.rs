//! Voice Session - call controller for a voice-assistant widget
//!
//! Drives one voice-call session over stdio. Transport events and user
//! commands arrive as JSON lines on stdin; transport commands and session
//! updates leave as JSON lines on stdout. Logs go to stderr.

mod config;
mod context;
mod goodbye;
mod latency;
mod prompts;
mod retry;
mod runtime;
mod state_machine;
mod timers;
mod transport;

use config::{ConfigScope, SessionTimings, VoiceConfig};
use runtime::{spawn_session, SessionUpdate, StdioTransport};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::TransportEvent;

/// One line of driver input
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Input {
    Control(Control),
    Event(TransportEvent),
}

/// Commands from the widget's button and lifecycle
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Control {
    Start,
    Stop,
    Quit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_session=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = VoiceConfig::from_env();
    if std::env::args().skip(1).any(|arg| arg == "--check-server-config") {
        let validation = config.log_validation(ConfigScope::Server);
        if !validation.is_valid() {
            return Err(format!(
                "{} required environment variable(s) missing",
                validation.errors.len()
            )
            .into());
        }
        return Ok(());
    }
    config.log_validation(ConfigScope::Client);

    // All stdout lines go through one writer so they never interleave
    let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_lines(out_rx));

    let transport = match config.credentials() {
        Ok(credentials) => {
            let (bridge, wire) = tokio::io::duplex(64 * 1024);
            tokio::spawn(forward_lines(wire, out_tx.clone()));
            Some(StdioTransport::new(credentials, bridge))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Voice assistant not configured");
            None
        }
    };

    let handle = spawn_session(
        config.assistant_id.clone(),
        transport,
        SessionTimings::default(),
    );

    let mut updates = handle.subscribe();
    let update_tx = out_tx.clone();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    if !publish(&update_tx, &update) {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Update printer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    drop(out_tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Input>(line) {
            Ok(Input::Control(Control::Start)) => handle.start().await,
            Ok(Input::Control(Control::Stop)) => handle.stop().await,
            Ok(Input::Control(Control::Quit)) => break,
            Ok(Input::Event(event)) => handle.deliver(event).await,
            Err(e) => tracing::warn!(error = %e, line, "Ignoring malformed input"),
        }
    }

    tracing::info!("Input closed, unmounting session");
    handle.shutdown();
    drop(handle);

    // The writer drains once the runtime and transport have released the output
    if tokio::time::timeout(std::time::Duration::from_secs(1), writer)
        .await
        .is_err()
    {
        tracing::warn!("Timed out flushing output");
    }

    Ok(())
}

fn publish(tx: &mpsc::UnboundedSender<String>, update: &SessionUpdate) -> bool {
    match serde_json::to_string(update) {
        Ok(line) => tx.send(line).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode update");
            true
        }
    }
}

/// Relay transport command lines onto the shared output
async fn forward_lines(wire: tokio::io::DuplexStream, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(wire).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Transport bridge read failed");
                break;
            }
        }
    }
}

async fn write_lines(mut rx: mpsc::UnboundedReceiver<String>) {
    let mut stdout = tokio::io::stdout();
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            tracing::error!(error = %e, "Failed to write to stdout");
            break;
        }
        let _ = stdout.flush().await;
    }
}
