//! HTTP surface for sitemap delivery and run control.
//!
//! Sitemap documents are rebuilt from the route tree on every request;
//! operator endpoints drive the shared [`Scheduler`].

pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use sitemapgen_core::Scheduler;
use sitemapgen_shared::{GenerationConfig, Result, SitemapError};

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GenerationConfig>,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(config: GenerationConfig, scheduler: Arc<Scheduler>) -> Self {
        Self {
            config: Arc::new(config),
            scheduler,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/sitemap-index.xml", get(routes::get_index))
        .route("/sitemap.xml", get(routes::get_index))
        .route("/{file}", get(routes::get_partition))
        .route("/api/sitemap/status", get(routes::get_status))
        .route("/api/sitemap/run", post(routes::post_run))
        .route("/api/sitemap/schedule/start", post(routes::post_schedule_start))
        .route("/api/sitemap/schedule/stop", post(routes::post_schedule_stop))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| SitemapError::config(format!("cannot bind {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| SitemapError::config(format!("cannot read bound address: {e}")))?;
    info!(addr = %local, "sitemap server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| SitemapError::config(format!("server error: {e}")))?;

    info!("sitemap server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
