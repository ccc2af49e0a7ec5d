//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::error::Result;
use tokio::net::TcpListener;
use xform_core::Dispatcher;

/// xform HTTP server
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Bind the listener and serve until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        let addr = self.config.server.listen_addr;

        let dispatcher = Dispatcher::new().with_max_depth(self.config.engine.max_depth);
        let app = create_router(AppState::new(dispatcher), &self.config)?;

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("xform server listening on {}", addr);
        tracing::info!(origins = %self.config.cors.allowed_origins, "CORS allow-list");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("xform server shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
