//! Explicit farewell detection
//!
//! Only deliberate farewells count. Routine politeness ("thanks", "great")
//! must not end a call.

const FAREWELL_PHRASES: &[&str] = &[
    "goodbye",
    "good bye",
    "bye bye",
    "bye-bye",
    "see you later",
    "talk to you later",
    "that's all for now",
    "that is all for now",
];

/// Check whether a transcript contains an explicit farewell
pub fn is_goodbye(transcript: &str) -> bool {
    let normalized = transcript.to_lowercase().replace('\u{2019}', "'");
    FAREWELL_PHRASES
        .iter()
        .any(|phrase| normalized.contains(phrase))
}
