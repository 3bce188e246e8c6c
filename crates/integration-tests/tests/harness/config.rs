//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use secrecy::SecretString;
use switchboard_config::{CapabilityOverride, Config, CorsConfig, ProviderKind, ServerConfig, UpstreamConfig};

use super::mock_upstream::MockUpstream;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with no upstreams
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                ..Config::default()
            },
        }
    }

    /// Point every provider kind at the mock
    pub fn with_mock(self, mock: &MockUpstream) -> Self {
        self.with_upstream(ProviderKind::Openai, &mock.base_url())
            .with_upstream(ProviderKind::Anthropic, &mock.base_url())
            .with_upstream(ProviderKind::Gemini, &mock.gemini_base_url())
            .with_upstream(ProviderKind::Text, &mock.base_url())
    }

    /// Add one upstream with a generous timeout
    pub fn with_upstream(self, kind: ProviderKind, base_url: &str) -> Self {
        self.with_upstream_timeout(kind, base_url, "5s")
    }

    /// Add one upstream with the given timeout
    pub fn with_upstream_timeout(mut self, kind: ProviderKind, base_url: &str, timeout: &str) -> Self {
        let upstream = UpstreamConfig {
            base_url: base_url.parse().expect("valid URL"),
            api_key: Some(SecretString::from("test-key")),
            timeout: timeout.to_owned(),
        };

        let upstreams = &mut self.config.llm.upstreams;
        let slot = match kind {
            ProviderKind::Openai => &mut upstreams.openai,
            ProviderKind::Anthropic => &mut upstreams.anthropic,
            ProviderKind::Gemini => &mut upstreams.gemini,
            ProviderKind::Text => &mut upstreams.text,
        };
        *slot = Some(upstream);
        self
    }

    /// Add an inline capability override
    pub fn with_capability(mut self, model: &str, capability: CapabilityOverride) -> Self {
        self.config.llm.capabilities.models.insert(model.to_owned(), capability);
        self
    }

    /// Set the text chunk size of simulated streams
    pub fn with_chunk_chars(mut self, chars: usize) -> Self {
        self.config.llm.streaming.text_chunk_chars = chars;
        self
    }

    /// Set the heartbeat interval of simulated streams
    pub fn with_heartbeat(mut self, interval: &str) -> Self {
        self.config.llm.streaming.heartbeat_interval = interval.to_owned();
        self
    }

    /// Set CORS configuration
    pub fn with_cors(mut self, config: CorsConfig) -> Self {
        self.config.server.cors = Some(config);
        self
    }

    /// Serve the health probe at `path`
    pub fn with_health_path(mut self, path: &str) -> Self {
        self.config.server.health.path = path.to_owned();
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
