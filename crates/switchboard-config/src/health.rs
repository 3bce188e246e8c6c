use serde::Deserialize;

/// Paths owned by the API surfaces; the health probe cannot shadow them
const RESERVED_PREFIX: &str = "/v1/";

/// Liveness probe served by the gateway itself
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the probe route is mounted
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Route path, answered with `200 ok`
    #[serde(default = "default_path")]
    pub path: String,
}

impl HealthConfig {
    /// Check the probe path can be mounted next to the API routes
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or lies under `/v1/`
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if !self.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/', got '{}'", self.path);
        }

        if self.path.starts_with(RESERVED_PREFIX) {
            anyhow::bail!("server.health.path '{}' collides with the API routes", self.path);
        }

        Ok(())
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_path(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "/health".to_owned()
}
