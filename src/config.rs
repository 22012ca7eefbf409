//! Session layer configuration.
//!
//! Sources, in increasing precedence: built-in defaults, a YAML file, environment
//! variables. Call [`SessionConfig::validate`] before use; the builder does.

use crate::types::mode::DispatchKind;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "AGENT_SESSION_BASE_URL";
pub const ENV_CHAT_TIMEOUT_SECS: &str = "AGENT_SESSION_CHAT_TIMEOUT_SECS";
pub const ENV_START_TIMEOUT_SECS: &str = "AGENT_SESSION_START_TIMEOUT_SECS";
pub const ENV_STREAM_TIMEOUT_SECS: &str = "AGENT_SESSION_STREAM_TIMEOUT_SECS";
pub const ENV_MIN_SEND_INTERVAL_MS: &str = "AGENT_SESSION_MIN_SEND_INTERVAL_MS";
pub const ENV_PROXY_URL: &str = "AGENT_SESSION_PROXY_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL the mode endpoints are resolved against (e.g. `http://host/api`).
    pub base_url: String,
    /// Deadline for a synchronous chat turn.
    pub chat_timeout_ms: u64,
    /// Deadline for a session start (may involve opening an external connection).
    pub session_start_timeout_ms: u64,
    /// Deadline for a streamed chat turn.
    pub stream_timeout_ms: u64,
    /// Minimum interval between two accepted sends in the same mode.
    pub min_send_interval_ms: u64,
    /// Start a session in the background when switching into a mode that already has a resource.
    pub prewarm_on_switch: bool,
    /// Follow the out-of-band auto-init channel after each fresh session start.
    pub follow_auto_init: bool,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub proxy_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
            connect_timeout_secs: 10,
            proxy_url: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            chat_timeout_ms: 30_000,
            session_start_timeout_ms: 45_000,
            stream_timeout_ms: 300_000,
            min_send_interval_ms: 1_000,
            prewarm_on_switch: true,
            follow_auto_init: false,
            http: HttpConfig::default(),
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

impl SessionConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid session config: {}", e),
                ErrorContext::new().with_source("config"),
            )
        })
    }

    /// Load a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let cfg = Self::from_yaml_str(&raw).map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_details(path.display().to_string()),
            },
            other => other,
        })?;
        Ok(cfg.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        if let Some(secs) = env_u64(ENV_CHAT_TIMEOUT_SECS) {
            self.chat_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = env_u64(ENV_START_TIMEOUT_SECS) {
            self.session_start_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = env_u64(ENV_STREAM_TIMEOUT_SECS) {
            self.stream_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(ms) = env_u64(ENV_MIN_SEND_INTERVAL_MS) {
            self.min_send_interval_ms = ms;
        }
        if let Ok(proxy) = env::var(ENV_PROXY_URL) {
            if !proxy.trim().is_empty() {
                self.http.proxy_url = Some(proxy.trim().to_string());
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("base_url is not a valid URL: {}", e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(self.base_url.clone())
                    .with_source("config"),
            )
        })?;

        for (field, value) in [
            ("chat_timeout_ms", self.chat_timeout_ms),
            ("session_start_timeout_ms", self.session_start_timeout_ms),
            ("stream_timeout_ms", self.stream_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::configuration_with_context(
                    "deadline must be positive",
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("config"),
                ));
            }
        }
        Ok(())
    }

    pub fn chat_deadline(&self) -> Duration {
        Duration::from_millis(self.chat_timeout_ms)
    }

    pub fn session_start_deadline(&self) -> Duration {
        Duration::from_millis(self.session_start_timeout_ms)
    }

    pub fn stream_deadline(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }

    /// Deadline applied to a chat turn of the given kind.
    pub fn deadline_for(&self, kind: DispatchKind) -> Duration {
        match kind {
            DispatchKind::Synchronous => self.chat_deadline(),
            DispatchKind::Streaming => self.stream_deadline(),
        }
    }
}
