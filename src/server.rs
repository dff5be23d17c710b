//! HTTP surface for wallet checks
//!
//! routes:
//!   - `POST {route}` form field `address`, answers `WalletStatus` or
//!     `ErrorResult` JSON (HTTP 200 either way)
//!   - `GET /health`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cache::CacheStatsSnapshot;
use crate::error::{Error, Result};
use crate::service::ClassificationService;
use crate::types::CheckResponse;

/// Form body of a check request
#[derive(Debug, Clone, Deserialize)]
pub struct CheckForm {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub cache_backend: String,
    pub cache_stats: CacheStatsSnapshot,
}

/// Build the router for `route`
pub fn router(service: Arc<ClassificationService>, route: &str) -> Router {
    Router::new()
        .route(route, post(check_handler))
        .route("/health", get(health_handler))
        .with_state(service)
}

async fn check_handler(
    State(service): State<Arc<ClassificationService>>,
    Form(form): Form<CheckForm>,
) -> Json<CheckResponse> {
    Json(service.check(&form.address).await)
}

async fn health_handler(State(service): State<Arc<ClassificationService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        cache_backend: service.cache_backend().to_string(),
        cache_stats: service.stats().snapshot(),
    })
}

/// Serve until Ctrl-C
pub async fn serve(service: Arc<ClassificationService>, bind_addr: &str, route: &str) -> Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address {}: {}", bind_addr, e)))?;

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, route, "Starting wallet check server");

    axum::serve(listener, router(service, route))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
