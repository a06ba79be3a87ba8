//! Credentials and timing configuration
//!
//! Credentials come from process environment. Missing credentials are a
//! configuration error: the session still runs, but every call start is
//! refused until they are provided.

use crate::retry::RETRY_DELAY;
use std::time::Duration;
use thiserror::Error;

pub const PUBLIC_KEY_VAR: &str = "NEXT_PUBLIC_VAPI_KEY";
pub const ASSISTANT_ID_VAR: &str = "NEXT_PUBLIC_VAPI_ASSISTANT_ID";
pub const PRIVATE_KEY_VAR: &str = "VAPI_PRIVATE_KEY";

/// Raw configuration as read from the environment
#[derive(Debug, Clone, Default)]
pub struct VoiceConfig {
    pub public_key: Option<String>,
    pub assistant_id: Option<String>,
    /// Only meaningful for server-side operations; never used by the session
    pub private_key: Option<String>,
}

/// Where the configuration is being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// Public key and assistant id only
    Client,
    /// Client variables plus the private key
    Server,
}

/// Credentials needed to construct a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub public_key: String,
    pub assistant_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var} ({description})")]
    Missing {
        var: &'static str,
        description: &'static str,
    },
}

/// Outcome of checking a [`VoiceConfig`]
#[derive(Debug, Default)]
pub struct ConfigValidation {
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Requirement<'a> {
    var: &'static str,
    description: &'static str,
    value: Option<&'a str>,
}

impl VoiceConfig {
    pub fn from_env() -> Self {
        Self {
            public_key: non_empty_var(PUBLIC_KEY_VAR),
            assistant_id: non_empty_var(ASSISTANT_ID_VAR),
            private_key: non_empty_var(PRIVATE_KEY_VAR),
        }
    }

    fn requirements(&self, scope: ConfigScope) -> Vec<Requirement<'_>> {
        let mut reqs = vec![
            Requirement {
                var: PUBLIC_KEY_VAR,
                description: "public key for client-side authentication",
                value: self.public_key.as_deref(),
            },
            Requirement {
                var: ASSISTANT_ID_VAR,
                description: "assistant ID for voice interactions",
                value: self.assistant_id.as_deref(),
            },
        ];
        if scope == ConfigScope::Server {
            reqs.push(Requirement {
                var: PRIVATE_KEY_VAR,
                description: "private key for server-side operations",
                value: self.private_key.as_deref(),
            });
        }
        reqs
    }

    /// Check every required variable for `scope`.
    ///
    /// Missing values are errors. Values that are not UUIDs are accepted with
    /// a warning, since keys are normally UUIDs.
    pub fn validate(&self, scope: ConfigScope) -> ConfigValidation {
        let mut validation = ConfigValidation::default();

        for req in self.requirements(scope) {
            match req.value {
                None => validation.errors.push(ConfigError::Missing {
                    var: req.var,
                    description: req.description,
                }),
                Some(value) if uuid::Uuid::try_parse(value).is_err() => validation
                    .warnings
                    .push(format!("{} does not appear to be a valid UUID", req.var)),
                Some(_) => {}
            }
        }

        validation
    }

    /// Credentials for the client-side transport
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let missing = |var, description| ConfigError::Missing { var, description };
        let public_key = self.public_key.clone().ok_or_else(|| {
            missing(PUBLIC_KEY_VAR, "public key for client-side authentication")
        })?;
        let assistant_id = self
            .assistant_id
            .clone()
            .ok_or_else(|| missing(ASSISTANT_ID_VAR, "assistant ID for voice interactions"))?;
        Ok(Credentials {
            public_key,
            assistant_id,
        })
    }

    /// Log the validation report the way operators expect to see it
    pub fn log_validation(&self, scope: ConfigScope) -> ConfigValidation {
        let validation = self.validate(scope);

        if validation.is_valid() {
            tracing::info!(
                ?scope,
                public_key = %redact(self.public_key.as_deref().unwrap_or_default()),
                assistant_id = %redact(self.assistant_id.as_deref().unwrap_or_default()),
                "All required environment variables are present"
            );
        } else {
            for error in &validation.errors {
                tracing::error!(?scope, "{error}");
            }
        }
        for warning in &validation.warnings {
            tracing::warn!(?scope, "{warning}");
        }

        validation
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Keep the first 8 characters of a secret for log correlation
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    if prefix.len() == value.len() {
        prefix
    } else {
        format!("{prefix}...")
    }
}

/// Delays used by the session's timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// After the user stops talking, before a filler prompt
    pub silence: Duration,
    /// After the assistant's last turn, before the conversation closes
    pub ending: Duration,
    /// Between entering `ending` and stopping the transport
    pub hangup_grace: Duration,
    /// Before an automatic restart
    pub retry: Duration,
    /// Before the busy indicator shows
    pub processing_spinner: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            silence: Duration::from_secs(8),
            ending: Duration::from_secs(15),
            hangup_grace: Duration::from_secs(2),
            retry: RETRY_DELAY,
            processing_spinner: Duration::from_millis(300),
        }
    }
}
