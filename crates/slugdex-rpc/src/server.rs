//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use slugdex_core::SlugIndex;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers.
pub struct AppState {
    /// Lazily initialized slug index
    pub index: Arc<SlugIndex>,
}

/// Build the router for the given index.
pub fn router(index: Arc<SlugIndex>) -> Router {
    let state = Arc::new(AppState { index });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    index: Arc<SlugIndex>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = router(index);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slugdex_core::IndexSettings;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_server_starts() {
        let temp_dir = TempDir::new().unwrap();
        let index = Arc::new(SlugIndex::new(IndexSettings::new(
            temp_dir.path().join("slugs.db"),
        )));

        let addr = start_server(index, "127.0.0.1", 0).await.unwrap();
        assert!(addr.port() > 0);
    }

    #[tokio::test]
    async fn test_invalid_host_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let index = Arc::new(SlugIndex::new(IndexSettings::new(
            temp_dir.path().join("slugs.db"),
        )));

        assert!(start_server(index, "not a host", 0).await.is_err());
    }
}
