use serde::Deserialize;

/// CORS configuration for browser-based SDK clients
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; a single `"*"` entry allows any origin
    #[serde(default = "any_origin")]
    pub origins: Vec<String>,
    /// Preflight cache lifetime in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
}

impl CorsConfig {
    /// Whether every origin is allowed
    pub fn allows_any_origin(&self) -> bool {
        self.origins.iter().any(|origin| origin == "*")
    }
}

fn any_origin() -> Vec<String> {
    vec!["*".to_owned()]
}
