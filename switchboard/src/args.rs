use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Switchboard LLM gateway
#[derive(Debug, Parser)]
#[command(
    name = "switchboard",
    about = "OpenAI and Anthropic compatible gateway with tool-call normalization"
)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "SWITCHBOARD_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Capability overrides as JSON, ranked above every other source
    #[arg(long, env = "SWITCHBOARD_CAPABILITIES")]
    pub capabilities_json: Option<String>,
}
