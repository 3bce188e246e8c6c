use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::capability::{CapabilitiesConfig, ProviderKind};

/// Top-level LLM configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// One upstream per provider kind
    #[serde(default)]
    pub upstreams: UpstreamsConfig,
    /// Simulated streaming behaviour
    #[serde(default)]
    pub streaming: StreamingConfig,
    /// Capability override sources
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
}

/// Configured upstream providers
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamsConfig {
    #[serde(default)]
    pub openai: Option<UpstreamConfig>,
    #[serde(default)]
    pub anthropic: Option<UpstreamConfig>,
    #[serde(default)]
    pub gemini: Option<UpstreamConfig>,
    #[serde(default)]
    pub text: Option<UpstreamConfig>,
}

impl UpstreamsConfig {
    /// Upstream configuration for a provider kind, if present
    pub const fn get(&self, kind: ProviderKind) -> Option<&UpstreamConfig> {
        match kind {
            ProviderKind::Openai => self.openai.as_ref(),
            ProviderKind::Anthropic => self.anthropic.as_ref(),
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::Text => self.text.as_ref(),
        }
    }

    /// Every configured upstream with its provider kind
    pub fn iter(&self) -> impl Iterator<Item = (ProviderKind, &UpstreamConfig)> {
        [
            ProviderKind::Openai,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
            ProviderKind::Text,
        ]
        .into_iter()
        .filter_map(|kind| self.get(kind).map(|config| (kind, config)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Connection settings for one upstream provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: Url,
    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Request timeout (e.g. "60s", "2m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl UpstreamConfig {
    /// Parsed request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the duration string is invalid
    pub fn timeout(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.timeout)
    }
}

/// Simulated streaming configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    /// Interval between no-op heartbeat events
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: String,
    /// Characters of text per delta event
    #[serde(default = "default_text_chunk_chars")]
    pub text_chunk_chars: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            text_chunk_chars: default_text_chunk_chars(),
        }
    }
}

impl StreamingConfig {
    /// Parsed heartbeat interval
    ///
    /// # Errors
    ///
    /// Returns an error if the duration string is invalid
    pub fn heartbeat_interval(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.heartbeat_interval)
    }
}

fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid duration '{raw}': {e}"))
}

fn default_timeout() -> String {
    "60s".to_owned()
}

fn default_heartbeat_interval() -> String {
    "15s".to_owned()
}

const fn default_text_chunk_chars() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_defaults() {
        let config = StreamingConfig::default();
        assert_eq!(config.heartbeat_interval().unwrap(), Duration::from_secs(15));
        assert_eq!(config.text_chunk_chars, 64);
    }

    #[test]
    fn upstream_timeout_parses() {
        let config: UpstreamConfig = toml::from_str(
            r#"
            base_url = "https://api.example.com/v1"
            timeout = "2m"
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout().unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn iter_lists_configured_upstreams_in_order() {
        let config: UpstreamsConfig = toml::from_str(
            r#"
            [text]
            base_url = "http://localhost:9000"
            [anthropic]
            base_url = "https://api.anthropic.com/v1"
            "#,
        )
        .unwrap();

        let kinds: Vec<_> = config.iter().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec![ProviderKind::Anthropic, ProviderKind::Text]);
        assert!(config.get(ProviderKind::Openai).is_none());
    }
}
