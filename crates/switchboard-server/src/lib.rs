//! HTTP application assembly for switchboard

mod cors;

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use switchboard_config::{Config, ServerConfig};
use switchboard_llm::LlmState;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the capability registry or an upstream client
    /// cannot be built
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let llm_state = LlmState::from_config(&config.llm)?;

        tracing::info!(
            upstreams = ?config.llm.upstreams.iter().map(|(kind, _)| kind.as_str()).collect::<Vec<_>>(),
            models = llm_state.registry().known_models().len(),
            "llm state initialized"
        );

        Ok(Self::with_state(&config.server, llm_state))
    }

    /// Build the server around an already constructed LLM state
    pub fn with_state(config: &ServerConfig, llm_state: LlmState) -> Self {
        let listen_address = config
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let mut app = Router::new();

        if config.health.enabled {
            app = app.route(&config.health.path, get(health));
        }

        app = app.merge(switchboard_llm::llm_router(llm_state));

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        // CORS
        if let Some(ref cors_config) = config.cors {
            app = app.layer(cors::cors_layer(cors_config));
        }

        Self {
            router: app,
            listen_address,
        }
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

async fn health() -> &'static str {
    "ok"
}
