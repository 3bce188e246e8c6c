//! Capability registry: model identifier to backend kind and feature flags
//!
//! Built once at startup from the built-in pattern table plus layered
//! overrides, then shared read-only between requests.

use std::collections::HashMap;

use switchboard_config::{BackendKind, CapabilitiesConfig, CapabilityOverride, CapabilityOverrides, ProviderKind};

/// Resolved capabilities of one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEntry {
    pub model_id: String,
    pub backend: BackendKind,
    /// Upstream provider that serves the model
    pub upstream: ProviderKind,
    /// Tool definitions can be forwarded natively instead of prompted
    pub supports_native_tools: bool,
    /// Repairs are expected for this model's output
    pub requires_normalization: bool,
    /// Upstream can stream natively; informational since streaming is simulated
    pub supports_streaming: bool,
    /// `max_tokens` applied when the client omits it
    pub default_max_tokens: u32,
}

impl CapabilityEntry {
    /// Entry for models nothing else matches
    pub fn fallback(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            backend: BackendKind::Generic,
            upstream: ProviderKind::Text,
            supports_native_tools: false,
            requires_normalization: true,
            supports_streaming: false,
            default_max_tokens: 1024,
        }
    }

    const fn template(
        backend: BackendKind,
        upstream: ProviderKind,
        supports_native_tools: bool,
        default_max_tokens: u32,
    ) -> Template {
        Template {
            backend,
            upstream,
            supports_native_tools,
            requires_normalization: !matches!(backend, BackendKind::NativePassthrough),
            supports_streaming: !matches!(backend, BackendKind::Generic),
            default_max_tokens,
        }
    }

    fn apply(&mut self, over: &CapabilityOverride) {
        if let Some(backend) = over.backend {
            self.backend = backend;
        }
        if let Some(upstream) = over.upstream {
            self.upstream = upstream;
        }
        if let Some(native) = over.supports_native_tools {
            self.supports_native_tools = native;
        }
        if let Some(normalize) = over.requires_normalization {
            self.requires_normalization = normalize;
        }
        if let Some(streaming) = over.supports_streaming {
            self.supports_streaming = streaming;
        }
        if let Some(max_tokens) = over.default_max_tokens {
            self.default_max_tokens = max_tokens;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Template {
    backend: BackendKind,
    upstream: ProviderKind,
    supports_native_tools: bool,
    requires_normalization: bool,
    supports_streaming: bool,
    default_max_tokens: u32,
}

impl Template {
    fn instantiate(self, model_id: &str) -> CapabilityEntry {
        CapabilityEntry {
            model_id: model_id.to_owned(),
            backend: self.backend,
            upstream: self.upstream,
            supports_native_tools: self.supports_native_tools,
            requires_normalization: self.requires_normalization,
            supports_streaming: self.supports_streaming,
            default_max_tokens: self.default_max_tokens,
        }
    }
}

/// How a table row matches a model identifier
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Prefix(String),
    Contains(String),
    Suffix(String),
}

impl Pattern {
    fn matches(&self, model: &str) -> bool {
        match self {
            Self::Prefix(prefix) => model.starts_with(prefix.as_str()),
            Self::Contains(needle) => model.contains(needle.as_str()),
            Self::Suffix(suffix) => model.ends_with(suffix.as_str()),
        }
    }
}

const OPENAI_NATIVE: Template =
    CapabilityEntry::template(BackendKind::NativePassthrough, ProviderKind::Openai, true, 4096);
const ANTHROPIC_BLOCKS: Template =
    CapabilityEntry::template(BackendKind::BlockContent, ProviderKind::Anthropic, true, 8192);
const GEMINI_BLOCKS: Template = CapabilityEntry::template(BackendKind::BlockContent, ProviderKind::Gemini, true, 8192);
const TEXT_CALLS: Template =
    CapabilityEntry::template(BackendKind::FunctionCallInText, ProviderKind::Openai, false, 4096);
const TEXT_ONLY: Template = CapabilityEntry::template(BackendKind::Generic, ProviderKind::Text, false, 1024);

/// Well-known model names, advertised by `/v1/models`
const BUILTIN_MODELS: &[(&str, Template)] = &[
    ("gpt-4o", OPENAI_NATIVE),
    ("gpt-4o-mini", OPENAI_NATIVE),
    ("gpt-4.1", OPENAI_NATIVE),
    ("gpt-4.1-mini", OPENAI_NATIVE),
    ("o3-mini", OPENAI_NATIVE),
    ("claude-sonnet-4-20250514", ANTHROPIC_BLOCKS),
    ("claude-3-5-haiku-20241022", ANTHROPIC_BLOCKS),
    ("gemini-2.0-flash", GEMINI_BLOCKS),
    ("gemini-2.5-pro", GEMINI_BLOCKS),
    ("qwen2.5-72b-instruct", TEXT_CALLS),
    ("deepseek-chat", TEXT_CALLS),
];

/// Built-in pattern table, checked in order
fn builtin_patterns() -> Vec<(Pattern, Template)> {
    let prefix = |p: &str| Pattern::Prefix(p.to_owned());

    vec![
        (prefix("gpt-"), OPENAI_NATIVE),
        (prefix("o1"), OPENAI_NATIVE),
        (prefix("o3"), OPENAI_NATIVE),
        (prefix("o4"), OPENAI_NATIVE),
        (prefix("chatgpt-"), OPENAI_NATIVE),
        (prefix("claude-"), ANTHROPIC_BLOCKS),
        (Pattern::Contains("bedrock-anthropic".to_owned()), ANTHROPIC_BLOCKS),
        (prefix("gemini-"), GEMINI_BLOCKS),
        (prefix("qwen"), TEXT_CALLS),
        (prefix("deepseek"), TEXT_CALLS),
        (prefix("hermes"), TEXT_CALLS),
        (Pattern::Suffix("-fc".to_owned()), TEXT_CALLS),
        (prefix("text-"), TEXT_ONLY),
        (prefix("davinci"), TEXT_ONLY),
        (prefix("babbage"), TEXT_ONLY),
    ]
}

/// Supplies capability overrides at registry construction
pub trait CapabilitySource {
    /// Overrides keyed by model id or `prefix*` pattern
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed
    fn capabilities(&self) -> anyhow::Result<CapabilityOverrides>;
}

impl CapabilitySource for CapabilitiesConfig {
    fn capabilities(&self) -> anyhow::Result<CapabilityOverrides> {
        self.resolve_overrides()
    }
}

impl CapabilitySource for CapabilityOverrides {
    fn capabilities(&self) -> anyhow::Result<CapabilityOverrides> {
        Ok(self.clone())
    }
}

/// Read-only model capability lookup
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    /// Exact-name overrides
    exact: HashMap<String, CapabilityEntry>,
    /// Prefix overrides, longest first
    patterns: Vec<(Pattern, CapabilityEntry)>,
    builtin_exact: HashMap<&'static str, Template>,
    builtin: Vec<(Pattern, Template)>,
    known: Vec<String>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CapabilityRegistry {
    /// Registry holding only the built-in table
    pub fn builtin() -> Self {
        Self {
            exact: HashMap::new(),
            patterns: Vec::new(),
            builtin_exact: BUILTIN_MODELS.iter().copied().collect(),
            builtin: builtin_patterns(),
            known: BUILTIN_MODELS.iter().map(|(model, _)| (*model).to_owned()).collect(),
        }
    }

    /// Built-in table with the given overrides layered on top
    ///
    /// A key ending in `*` applies to every model starting with the rest of
    /// the key. Each override only replaces the fields it sets.
    pub fn with_overrides(overrides: &CapabilityOverrides) -> Self {
        let mut registry = Self::builtin();

        // Patterns first, shortest first, so every override sees the
        // broader patterns beneath it whatever the key order
        let mut prefixed: Vec<_> = overrides
            .iter()
            .filter_map(|(key, over)| key.strip_suffix('*').map(|prefix| (prefix, over)))
            .collect();
        prefixed.sort_by_key(|(prefix, _)| prefix.len());

        for (prefix, over) in prefixed {
            let mut entry = registry.lookup(prefix);
            entry.apply(over);
            registry.patterns.push((Pattern::Prefix(prefix.to_owned()), entry));
            // Longest prefix wins among override patterns
            registry
                .patterns
                .sort_by(|(a, _), (b, _)| pattern_len(b).cmp(&pattern_len(a)));
        }

        for (key, over) in overrides.iter().filter(|(key, _)| !key.ends_with('*')) {
            let mut entry = registry.lookup(key);
            entry.apply(over);
            if !registry.known.contains(key) {
                registry.known.push(key.clone());
            }
            registry.exact.insert(key.clone(), entry);
        }

        tracing::debug!(
            overrides = overrides.len(),
            models = registry.known.len(),
            "capability registry built"
        );

        registry
    }

    /// Build from a layered source
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to produce its overrides
    pub fn from_source(source: &dyn CapabilitySource) -> anyhow::Result<Self> {
        Ok(Self::with_overrides(&source.capabilities()?))
    }

    /// Capabilities for `model`; never fails
    ///
    /// Resolution order: exact override, prefix override, built-in name,
    /// built-in pattern, then the generic fallback.
    pub fn lookup(&self, model: &str) -> CapabilityEntry {
        if let Some(entry) = self.exact.get(model) {
            return entry.clone();
        }

        if let Some((_, entry)) = self.patterns.iter().find(|(pattern, _)| pattern.matches(model)) {
            return CapabilityEntry {
                model_id: model.to_owned(),
                ..entry.clone()
            };
        }

        if let Some(template) = self.builtin_exact.get(model) {
            return template.instantiate(model);
        }

        if let Some((_, template)) = self.builtin.iter().find(|(pattern, _)| pattern.matches(model)) {
            return template.instantiate(model);
        }

        tracing::debug!(model = %model, "unknown model, using generic capabilities");
        CapabilityEntry::fallback(model)
    }

    /// Explicitly named models: built-in exact names plus exact overrides
    pub fn known_models(&self) -> &[String] {
        &self.known
    }
}

fn pattern_len(pattern: &Pattern) -> usize {
    match pattern {
        Pattern::Prefix(s) | Pattern::Contains(s) | Pattern::Suffix(s) => s.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn over(backend: Option<BackendKind>) -> CapabilityOverride {
        CapabilityOverride {
            backend,
            ..CapabilityOverride::default()
        }
    }

    #[test]
    fn builtin_patterns_classify_well_known_families() {
        let registry = CapabilityRegistry::builtin();

        let gpt = registry.lookup("gpt-5-preview");
        assert_eq!(gpt.backend, BackendKind::NativePassthrough);
        assert_eq!(gpt.upstream, ProviderKind::Openai);
        assert!(gpt.supports_native_tools);
        assert!(!gpt.requires_normalization);

        assert_eq!(registry.lookup("claude-opus-4").backend, BackendKind::BlockContent);
        assert_eq!(registry.lookup("us.bedrock-anthropic.v2").upstream, ProviderKind::Anthropic);
        assert_eq!(registry.lookup("gemini-1.5-pro").upstream, ProviderKind::Gemini);
        assert_eq!(registry.lookup("qwen3-32b").backend, BackendKind::FunctionCallInText);
        assert_eq!(registry.lookup("mistral-small-fc").backend, BackendKind::FunctionCallInText);
        assert_eq!(registry.lookup("davinci-002").backend, BackendKind::Generic);
    }

    #[test]
    fn unknown_model_falls_back_to_generic() {
        let entry = CapabilityRegistry::builtin().lookup("llama-local");

        assert_eq!(entry.model_id, "llama-local");
        assert_eq!(entry.backend, BackendKind::Generic);
        assert!(entry.requires_normalization);
        assert!(!entry.supports_native_tools);
    }

    #[test]
    fn exact_override_changes_only_set_fields() {
        let mut overrides = CapabilityOverrides::new();
        overrides.insert(
            "gpt-4o".to_owned(),
            CapabilityOverride {
                default_max_tokens: Some(123),
                ..CapabilityOverride::default()
            },
        );

        let entry = CapabilityRegistry::with_overrides(&overrides).lookup("gpt-4o");
        assert_eq!(entry.default_max_tokens, 123);
        assert_eq!(entry.backend, BackendKind::NativePassthrough);
        assert_eq!(entry.upstream, ProviderKind::Openai);
    }

    #[test]
    fn override_for_unknown_model_starts_from_fallback() {
        let mut overrides = CapabilityOverrides::new();
        overrides.insert("my-model".to_owned(), over(Some(BackendKind::FunctionCallInText)));

        let registry = CapabilityRegistry::with_overrides(&overrides);
        let entry = registry.lookup("my-model");
        assert_eq!(entry.backend, BackendKind::FunctionCallInText);
        assert_eq!(entry.upstream, ProviderKind::Text);
        assert!(registry.known_models().contains(&"my-model".to_owned()));
    }

    #[test]
    fn prefix_override_beats_builtin_pattern() {
        let mut overrides = CapabilityOverrides::new();
        overrides.insert("gpt-*".to_owned(), over(Some(BackendKind::Generic)));
        overrides.insert("gpt-oss*".to_owned(), over(Some(BackendKind::FunctionCallInText)));

        let registry = CapabilityRegistry::with_overrides(&overrides);
        assert_eq!(registry.lookup("gpt-3.5-turbo").backend, BackendKind::Generic);
        assert_eq!(registry.lookup("gpt-oss-120b").backend, BackendKind::FunctionCallInText);
        assert_eq!(registry.lookup("gpt-oss-120b").model_id, "gpt-oss-120b");
        assert_eq!(registry.lookup("gpt-4o").backend, BackendKind::Generic);
    }

    #[test]
    fn exact_override_beats_prefix_override() {
        let mut overrides = CapabilityOverrides::new();
        overrides.insert("acme-*".to_owned(), over(Some(BackendKind::Generic)));
        overrides.insert("acme-tools".to_owned(), over(Some(BackendKind::FunctionCallInText)));

        let registry = CapabilityRegistry::with_overrides(&overrides);
        assert_eq!(registry.lookup("acme-tools").backend, BackendKind::FunctionCallInText);
        assert_eq!(registry.lookup("acme-chat").backend, BackendKind::Generic);
    }

    #[test]
    fn override_key_order_does_not_matter() {
        let pattern = ("acme-*".to_owned(), over(Some(BackendKind::FunctionCallInText)));
        let exact = (
            "acme-tools".to_owned(),
            CapabilityOverride {
                default_max_tokens: Some(99),
                ..CapabilityOverride::default()
            },
        );
        let broad = ("acme-pro*".to_owned(), over(None));

        let forward: CapabilityOverrides = [pattern.clone(), exact.clone(), broad.clone()].into_iter().collect();
        let backward: CapabilityOverrides = [exact, broad, pattern].into_iter().collect();

        let forward = CapabilityRegistry::with_overrides(&forward);
        let backward = CapabilityRegistry::with_overrides(&backward);
        for model in ["acme-tools", "acme-pro-max", "acme-chat"] {
            assert_eq!(forward.lookup(model), backward.lookup(model), "{model}");
        }

        let entry = backward.lookup("acme-tools");
        assert_eq!(entry.backend, BackendKind::FunctionCallInText);
        assert_eq!(entry.default_max_tokens, 99);
        // Nested pattern inherits from the broader one
        assert_eq!(backward.lookup("acme-pro-max").backend, BackendKind::FunctionCallInText);
    }

    #[test]
    fn source_errors_propagate() {
        struct Broken;

        impl CapabilitySource for Broken {
            fn capabilities(&self) -> anyhow::Result<CapabilityOverrides> {
                anyhow::bail!("unreadable")
            }
        }

        assert!(CapabilityRegistry::from_source(&Broken).is_err());
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CapabilityRegistry>();
    }
}
