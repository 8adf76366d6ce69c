//! HTTP proxy to a remote operation registry
//!
//! Presents the same read contract as a local bridge, implemented over
//! HTTP against another process running this same registry code (e.g. a
//! GPU host service). The local registry's refresh path goes through
//! `ProgressSource` and never branches on locality.
//!
//! The remote registry keeps its own TTL cache, so a multi-hop query is
//! cached independently at every hop.

use crate::operation::{MetricRecord, Operation, OperationStatus, ProgressSnapshot};
use crate::registry::{MetricBatch, ProgressSource, SourceError, SourceSnapshot};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a registry proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Base URL of the remote registry, e.g. `http://gpu-host:8000`
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl ProxyConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for a remote registry's HTTP surface
pub struct OperationProxy {
    config: ProxyConfig,
    client: Client,
}

impl OperationProxy {
    /// Create a proxy for the given base URL with default settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(ProxyConfig::new(base_url))
    }

    /// Create a proxy with custom configuration
    pub fn with_config(config: ProxyConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Fetch the remote record for one operation
    pub async fn get_operation(&self, remote_id: &str) -> Result<Operation, SourceError> {
        let url = format!("{}/operations/{}", self.config.base_url, remote_id);
        tracing::debug!(url = %url, "Fetching remote operation");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Unreachable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(remote_id.to_string())),
            status if status.is_success() => {
                let remote: RemoteOperationBody = response
                    .json()
                    .await
                    .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
                Ok(remote.into_operation(remote_id))
            }
            status => Err(SourceError::Unreachable(format!(
                "remote registry returned {}",
                status
            ))),
        }
    }

    /// Fetch remote metrics appended since the cursor
    pub async fn get_metrics(
        &self,
        remote_id: &str,
        cursor: usize,
    ) -> Result<MetricBatch, SourceError> {
        let url = format!("{}/operations/{}/metrics", self.config.base_url, remote_id);

        let response = self
            .client
            .get(&url)
            .query(&[("cursor", cursor)])
            .send()
            .await
            .map_err(|e| SourceError::Unreachable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(remote_id.to_string())),
            status if status.is_success() => {
                let body: RemoteMetricsBody = response
                    .json()
                    .await
                    .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
                Ok(MetricBatch {
                    records: body.metrics,
                    new_cursor: body.new_cursor,
                })
            }
            status => Err(SourceError::Unreachable(format!(
                "remote registry returned {}",
                status
            ))),
        }
    }

    /// Bind this proxy to one remote operation as a `ProgressSource`
    pub fn source_for(self: &Arc<Self>, remote_id: impl Into<String>) -> Arc<RemoteOperation> {
        Arc::new(RemoteOperation {
            proxy: self.clone(),
            remote_id: remote_id.into(),
        })
    }
}

/// One remote operation viewed through a proxy
pub struct RemoteOperation {
    proxy: Arc<OperationProxy>,
    remote_id: String,
}

#[async_trait]
impl ProgressSource for RemoteOperation {
    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, SourceError> {
        let remote = self.proxy.get_operation(&self.remote_id).await?;
        Ok(SourceSnapshot {
            progress: remote.progress,
            status: Some(remote.status),
            result: remote.result,
            error: remote.error,
        })
    }

    async fn fetch_metrics(&self, cursor: usize) -> Result<MetricBatch, SourceError> {
        self.proxy.get_metrics(&self.remote_id, cursor).await
    }
}

/// Operation record as the remote registry serializes it
#[derive(Debug, Deserialize)]
struct RemoteOperationBody {
    #[serde(rename = "type")]
    op_type: crate::operation::OperationType,
    status: OperationStatus,
    #[serde(default)]
    progress: ProgressSnapshot,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl RemoteOperationBody {
    fn into_operation(self, remote_id: &str) -> Operation {
        Operation {
            id: remote_id.to_string(),
            op_type: self.op_type,
            status: self.status,
            progress: self.progress,
            metrics: Vec::new(),
            metadata: self.metadata,
            result: self.result,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Metrics response from the remote registry
#[derive(Debug, Deserialize)]
struct RemoteMetricsBody {
    metrics: Vec<MetricRecord>,
    new_cursor: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::new("http://gpu-host:8000");
        assert_eq!(config.base_url, "http://gpu-host:8000");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_parse_remote_operation_body() {
        let body: RemoteOperationBody = serde_json::from_value(json!({
            "id": "op-7",
            "type": "training",
            "status": "running",
            "progress": {"percentage": 62.5, "current_step": "epoch 5/8"},
            "metadata": {"session_id": "s-1"},
            "created_at": "2026-01-10T09:00:00Z",
            "updated_at": "2026-01-10T09:05:00Z"
        }))
        .unwrap();

        let op = body.into_operation("op-7");
        assert_eq!(op.id, "op-7");
        assert_eq!(op.status, OperationStatus::Running);
        assert_eq!(op.progress.percentage, 62.5);
        assert_eq!(op.metadata["session_id"], "s-1");
        assert!(op.result.is_none());
    }

    #[test]
    fn test_parse_remote_metrics_body() {
        let body: RemoteMetricsBody = serde_json::from_value(json!({
            "metrics": [
                {"timestamp": "2026-01-10T09:01:00Z", "data": {"epoch": 1, "loss": 0.5}},
                {"timestamp": "2026-01-10T09:02:00Z", "data": {"epoch": 2, "loss": 0.4}}
            ],
            "new_cursor": 2
        }))
        .unwrap();

        assert_eq!(body.metrics.len(), 2);
        assert_eq!(body.new_cursor, 2);
        assert_eq!(body.metrics[1].data["loss"], 0.4);
    }

    #[tokio::test]
    async fn test_unreachable_host_maps_to_source_error() {
        // nothing listens on this port
        let proxy = OperationProxy::with_config(ProxyConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(200),
        });
        let err = proxy.get_operation("op-1").await.unwrap_err();
        assert!(matches!(err, SourceError::Unreachable(_)));
    }
}
