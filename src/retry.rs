//! Bounded, fixed-delay retry of call start after transport errors

use std::time::Duration;

/// Automatic restarts allowed before an error becomes terminal
pub const MAX_RETRIES: u32 = 2;

/// Delay before an automatic restart
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

const RETRYABLE_KEYWORDS: &[&str] = &[
    "network",
    "connection",
    "timeout",
    "websocket",
    "meeting has ended",
    "failed to connect",
];

/// What to do about a transport error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Restart after [`RETRY_DELAY`]; `attempt` is the new retry count
    Retry { attempt: u32, status: String },
    /// Surface the error and reset the retry budget
    GiveUp { message: String },
}

/// Transient transport hiccups are recognised by their message text
pub fn is_retryable(message: &str) -> bool {
    let lowered = message.to_lowercase();
    RETRYABLE_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Decide based on the live retry count at the time the error is handled
pub fn decide(message: &str, retry_count: u32) -> RetryDecision {
    let retryable = is_retryable(message);

    if retryable && retry_count < MAX_RETRIES {
        let attempt = retry_count + 1;
        return RetryDecision::Retry {
            attempt,
            status: format!("Connection issue, retrying... ({attempt}/{MAX_RETRIES})"),
        };
    }

    let message = if retryable {
        format!("Failed after {MAX_RETRIES} retries: {message}")
    } else {
        message.to_string()
    };
    RetryDecision::GiveUp { message }
}
