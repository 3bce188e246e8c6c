use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Model id (or `prefix*` pattern) to override mapping
pub type CapabilityOverrides = IndexMap<String, CapabilityOverride>;

/// Shape of an upstream provider's native response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Already OpenAI tool-call shaped; validated, not transformed
    NativePassthrough,
    /// Typed content blocks (Anthropic blocks, Gemini parts)
    BlockContent,
    /// Free text that may embed a delimited function-call payload
    FunctionCallInText,
    /// Best-effort text extraction, never produces tool calls
    Generic,
}

/// Upstream provider protocol used to reach a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Gemini `generateContent`
    Gemini,
    /// Generic prompt-in, text-out completion endpoint
    Text,
}

impl ProviderKind {
    /// Config table name for this provider kind
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Text => "text",
        }
    }
}

/// Field-wise override of a capability entry; unset fields keep the lower layer's value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityOverride {
    #[serde(default, alias = "backend_kind", skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_native_tools: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_normalization: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_streaming: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,
}

impl CapabilityOverride {
    /// Layer `higher` on top of `self`
    pub fn merge(&mut self, higher: &Self) {
        self.backend = higher.backend.or(self.backend);
        self.upstream = higher.upstream.or(self.upstream);
        self.supports_native_tools = higher.supports_native_tools.or(self.supports_native_tools);
        self.requires_normalization = higher.requires_normalization.or(self.requires_normalization);
        self.supports_streaming = higher.supports_streaming.or(self.supports_streaming);
        self.default_max_tokens = higher.default_max_tokens.or(self.default_max_tokens);
    }
}

/// Capability override sources
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilitiesConfig {
    /// JSON file holding a `{ model_id: override }` object
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Overrides written inline in the config file
    #[serde(default)]
    pub models: CapabilityOverrides,
    /// Explicit JSON supplied on the command line; highest precedence
    #[serde(skip)]
    pub explicit_json: Option<String>,
}

impl CapabilitiesConfig {
    /// Merge every layer, lowest precedence first: file, inline table, explicit JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or either JSON source is malformed
    pub fn resolve_overrides(&self) -> anyhow::Result<CapabilityOverrides> {
        let mut layers = Vec::with_capacity(3);

        if let Some(path) = &self.file {
            layers.push(load_overrides_file(path)?);
        }
        layers.push(self.models.clone());
        if let Some(json) = &self.explicit_json {
            layers.push(parse_overrides(json).context("invalid explicit capability JSON")?);
        }

        let mut merged = CapabilityOverrides::new();
        for layer in layers {
            for (model, entry) in layer {
                merged.entry(model).or_default().merge(&entry);
            }
        }

        Ok(merged)
    }
}

/// Parse a `{ model_id: override }` JSON object
///
/// # Errors
///
/// Returns an error if the JSON is malformed or contains unknown fields
pub fn parse_overrides(json: &str) -> anyhow::Result<CapabilityOverrides> {
    Ok(serde_json::from_str(json)?)
}

fn load_overrides_file(path: &Path) -> anyhow::Result<CapabilityOverrides> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read capability file {}", path.display()))?;
    let overrides =
        parse_overrides(&raw).with_context(|| format!("invalid capability file {}", path.display()))?;

    tracing::debug!(path = %path.display(), count = overrides.len(), "loaded capability overrides");
    Ok(overrides)
}
