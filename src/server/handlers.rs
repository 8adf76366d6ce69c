//! Handlers for the operations HTTP surface

use super::error::ApiError;
use super::AppState;
use crate::operation::{MetricRecord, Operation, OperationStatus, OperationType};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(super) struct GetOperationQuery {
    #[serde(default)]
    force_refresh: bool,
}

pub(super) async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<GetOperationQuery>,
) -> Result<Json<Operation>, ApiError> {
    let op = state
        .registry
        .get_operation(&id, query.force_refresh)
        .await?;
    Ok(Json(op))
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    status: Option<OperationStatus>,
    #[serde(rename = "type")]
    op_type: Option<OperationType>,
}

#[derive(Debug, Serialize)]
pub(super) struct ListResponse {
    operations: Vec<Operation>,
    total_count: usize,
    /// Operations not yet in a terminal state
    active_count: usize,
}

pub(super) async fn list_operations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<ListResponse> {
    let operations = state
        .registry
        .list_operations(query.status, query.op_type)
        .await;
    let active_count = operations
        .iter()
        .filter(|op| !op.status.is_terminal())
        .count();
    Json(ListResponse {
        total_count: operations.len(),
        active_count,
        operations,
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct MetricsQuery {
    #[serde(default)]
    cursor: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct MetricsResponse {
    metrics: Vec<MetricRecord>,
    new_cursor: usize,
}

pub(super) async fn get_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let (metrics, new_cursor) = state.registry.get_metrics(&id, query.cursor).await?;
    Ok(Json(MetricsResponse {
        metrics,
        new_cursor,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct CompleteBody {
    #[serde(default)]
    results: Option<Value>,
}

pub(super) async fn complete_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<Operation>, ApiError> {
    let op = state.registry.complete_operation(&id, body.results).await?;
    Ok(Json(op))
}

#[derive(Debug, Deserialize)]
pub(super) struct FailBody {
    error: String,
}

pub(super) async fn fail_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FailBody>,
) -> Result<Json<Operation>, ApiError> {
    let op = state.registry.fail_operation(&id, body.error).await?;
    Ok(Json(op))
}

#[derive(Debug, Deserialize)]
pub(super) struct CancelBody {
    #[serde(default = "default_cancel_reason")]
    reason: String,
}

fn default_cancel_reason() -> String {
    "cancelled by client".to_string()
}

pub(super) async fn cancel_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CancelBody>,
) -> Result<Json<Operation>, ApiError> {
    let op = state.registry.cancel_operation(&id, body.reason).await?;
    Ok(Json(op))
}
