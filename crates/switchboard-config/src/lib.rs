#![allow(clippy::must_use_candidate)]

pub mod capability;
pub mod cors;
mod env;
pub mod health;
pub mod llm;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use capability::*;
pub use cors::*;
pub use env::ExpandError;
pub use health::*;
pub use llm::*;
pub use server::*;
pub use telemetry::*;

/// Top-level switchboard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream providers, streaming and capability configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
