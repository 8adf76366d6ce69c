//! Source binding: where an operation's live state is pulled from
//!
//! A registry binds each operation to exactly one source: a local bridge
//! in this process, or a proxy to a remote registry. Both implement
//! `ProgressSource`, so the refresh path never branches on locality.

use crate::bridge::ProgressBridge;
use crate::operation::{MetricRecord, OperationStatus, ProgressSnapshot};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failures reading from a bound source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Remote registry could not be reached (connect/timeout/5xx)
    #[error("source unreachable: {0}")]
    Unreachable(String),
    /// Remote registry answered but does not know the operation
    #[error("remote operation not found: {0}")]
    NotFound(String),
    /// Remote answered with a body we could not interpret
    #[error("invalid response from source: {0}")]
    InvalidResponse(String),
}

/// Point-in-time view of a source's state
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub progress: ProgressSnapshot,
    /// Lifecycle state as the source knows it. A local bridge reports
    /// `None` (lifecycle lives in the registry); a remote registry
    /// reports its record's status so a remote terminal state can be
    /// mirrored on refresh.
    pub status: Option<OperationStatus>,
    /// Final results, present once a remote source reports completion
    pub result: Option<Value>,
    /// Terminal error message, present once a remote source reports failure
    pub error: Option<String>,
}

/// Metrics appended at the source since a given cursor
#[derive(Debug, Clone)]
pub struct MetricBatch {
    pub records: Vec<MetricRecord>,
    /// Cursor to use on the next fetch. May be lower than the cursor
    /// sent when the source has reset (e.g. a remote process restart);
    /// callers adopt the reported value rather than asserting.
    pub new_cursor: usize,
}

/// Read contract shared by local bridges and remote proxies
#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, SourceError>;
    async fn fetch_metrics(&self, cursor: usize) -> Result<MetricBatch, SourceError>;
}

/// In-process source backed by a worker's bridge. Infallible reads.
pub struct LocalSource {
    bridge: Arc<ProgressBridge>,
}

impl LocalSource {
    pub fn new(bridge: Arc<ProgressBridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Arc<ProgressBridge> {
        &self.bridge
    }
}

#[async_trait]
impl ProgressSource for LocalSource {
    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, SourceError> {
        Ok(SourceSnapshot {
            progress: self.bridge.snapshot(),
            status: None,
            result: None,
            error: None,
        })
    }

    async fn fetch_metrics(&self, cursor: usize) -> Result<MetricBatch, SourceError> {
        let (records, new_cursor) = self.bridge.metrics_since(cursor);
        Ok(MetricBatch {
            records,
            new_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_local_source_snapshot() {
        let bridge = Arc::new(ProgressBridge::new());
        bridge.update_state(30.0, "training epoch 3", Default::default());

        let source = LocalSource::new(bridge);
        let snap = source.fetch_snapshot().await.unwrap();
        assert_eq!(snap.progress.percentage, 30.0);
        assert!(snap.status.is_none());
    }

    #[tokio::test]
    async fn test_local_source_metrics_cursor() {
        let bridge = Arc::new(ProgressBridge::new());
        bridge.append_metric(json!({"epoch": 1}));
        bridge.append_metric(json!({"epoch": 2}));

        let source = LocalSource::new(bridge.clone());
        let batch = source.fetch_metrics(0).await.unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.new_cursor, 2);

        let batch = source.fetch_metrics(2).await.unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.new_cursor, 2);
    }
}
