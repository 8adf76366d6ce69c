//! HTTP surface for the operation registry
//!
//! The same router serves the primary service and any remote host
//! service running this registry code; a proxy on one side speaks to
//! these routes on the other.
//!
//! Routes:
//! - `GET  /operations`: list with status/type filters
//! - `GET  /operations/:id`: single record, optional `force_refresh`
//! - `GET  /operations/:id/metrics`: incremental metrics by cursor
//! - `POST /operations/:id/complete` / `fail` / `cancel`: terminal
//!   transitions (idempotent)

mod error;
mod handlers;

pub use error::ApiError;

use crate::registry::OperationsService;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<OperationsService>,
}

/// Build the operations router around a registry
pub fn build_router(registry: Arc<OperationsService>) -> Router {
    let state = AppState { registry };
    Router::new()
        .route("/operations", get(handlers::list_operations))
        .route("/operations/:id", get(handlers::get_operation))
        .route("/operations/:id/metrics", get(handlers::get_metrics))
        .route(
            "/operations/:id/complete",
            post(handlers::complete_operation),
        )
        .route("/operations/:id/fail", post(handlers::fail_operation))
        .route("/operations/:id/cancel", post(handlers::cancel_operation))
        .with_state(state)
}

/// Bind and serve until the task is aborted
pub async fn serve(registry: Arc<OperationsService>, bind_addr: &str) -> anyhow::Result<()> {
    let router = build_router(registry);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Operations API listening");
    axum::serve(listener, router).await?;
    Ok(())
}
