use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no upstream is configured, a duration is
    /// invalid or zero, a capability override key is empty, or the health
    /// path cannot be mounted
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.health.validate()?;
        self.validate_upstreams()?;
        self.validate_streaming()?;
        self.validate_capabilities()?;
        Ok(())
    }

    fn validate_upstreams(&self) -> anyhow::Result<()> {
        if self.llm.upstreams.is_empty() {
            anyhow::bail!("at least one upstream must be configured under [llm.upstreams]");
        }

        for (kind, upstream) in self.llm.upstreams.iter() {
            let timeout = upstream
                .timeout()
                .map_err(|e| anyhow::anyhow!("upstream '{}': {e}", kind.as_str()))?;

            if timeout.is_zero() {
                anyhow::bail!("upstream '{}': timeout must be greater than 0", kind.as_str());
            }
        }

        Ok(())
    }

    fn validate_streaming(&self) -> anyhow::Result<()> {
        let streaming = &self.llm.streaming;

        if streaming.heartbeat_interval()?.is_zero() {
            anyhow::bail!("llm.streaming.heartbeat_interval must be greater than 0");
        }

        if streaming.text_chunk_chars == 0 {
            anyhow::bail!("llm.streaming.text_chunk_chars must be greater than 0");
        }

        Ok(())
    }

    fn validate_capabilities(&self) -> anyhow::Result<()> {
        if self
            .llm
            .capabilities
            .models
            .keys()
            .any(|model| model.trim().trim_end_matches('*').is_empty())
        {
            anyhow::bail!("capability override keys must name a model or a model prefix");
        }

        Ok(())
    }
}
