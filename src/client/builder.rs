use crate::client::core::AgentSessions;
use crate::config::SessionConfig;
use crate::notify::{noop_sink, NotificationSink};
use crate::registry::ModeRegistry;
use crate::transport::{HttpTransport, Transport, TransportAdapter};
use crate::types::mode::ConversationMode;
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Builder for [`AgentSessions`].
///
/// Without an explicit config the environment is consulted (see
/// [`SessionConfig::from_env`]). Without an explicit transport an [`HttpTransport`]
/// is built from the config.
pub struct AgentSessionsBuilder {
    config: Option<SessionConfig>,
    /// Override base URL (primarily for testing with mock servers)
    base_url_override: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    sink: Arc<dyn NotificationSink>,
    initial_mode: ConversationMode,
    resource_refs: Vec<(ConversationMode, String)>,
}

impl AgentSessionsBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            base_url_override: None,
            transport: None,
            sink: noop_sink(),
            initial_mode: ConversationMode::default(),
            resource_refs: Vec::new(),
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Use a custom backend instead of HTTP (tests, demos, alternative transports).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Inject a notification sink. Default is a no-op sink.
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn initial_mode(mut self, mode: ConversationMode) -> Self {
        self.initial_mode = mode;
        self
    }

    /// Preselect a resource for `mode` (e.g. a connection remembered from a previous run).
    pub fn resource_ref(mut self, mode: ConversationMode, resource_ref: impl Into<String>) -> Self {
        self.resource_refs.push((mode, resource_ref.into()));
        self
    }

    pub fn build(self) -> Result<AgentSessions> {
        let mut config = self.config.unwrap_or_else(SessionConfig::from_env);
        if let Some(url) = self.base_url_override {
            config.base_url = url;
        }
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config)?),
        };

        let mut registry = ModeRegistry::new(self.initial_mode, config.min_send_interval());
        for (mode, resource_ref) in self.resource_refs {
            registry
                .conversation_mut(mode)
                .on_resource_ref_changed(Some(resource_ref));
        }

        info!(
            base_url = config.base_url.as_str(),
            mode = %self.initial_mode,
            "agent sessions ready"
        );
        Ok(AgentSessions::from_parts(
            config,
            TransportAdapter::new(transport),
            registry,
            self.sink,
        ))
    }
}

impl Default for AgentSessionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
