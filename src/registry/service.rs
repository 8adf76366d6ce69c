//! Registry service implementation

use super::source::{LocalSource, ProgressSource};
use super::{RegistryConfig, RegistryError};
use crate::bridge::ProgressBridge;
use crate::operation::{MetricRecord, Operation, OperationStatus, OperationType};
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Where an operation's live state comes from
///
/// `bridge` is set only for local bindings; it gives the terminal paths
/// direct access for the final metric drain and the cancellation flag.
struct Binding {
    source: Arc<dyn ProgressSource>,
    bridge: Option<Arc<ProgressBridge>>,
}

/// One tracked operation plus its refresh bookkeeping
struct OperationEntry {
    operation: Operation,
    binding: Option<Binding>,
    /// How far into the source's metric log we have already pulled
    cursor: usize,
    /// None until the first refresh, which forces the first query to hit
    /// the source
    last_refresh: Option<Instant>,
}

/// In-memory operation store with on-demand, TTL-gated refresh
///
/// The map itself is guarded by an outer `RwLock`; each entry sits
/// behind its own async mutex so two clients racing to refresh the same
/// stale operation serialize: the second racer blocks briefly and then
/// observes the freshly stamped cache instead of re-fetching.
pub struct OperationsService {
    config: RegistryConfig,
    ops: RwLock<HashMap<String, Arc<Mutex<OperationEntry>>>>,
}

impl OperationsService {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            ops: RwLock::new(HashMap::new()),
        }
    }

    /// Create a fresh Pending record and return a copy of it
    pub async fn create_operation(
        &self,
        op_type: OperationType,
        metadata: Map<String, Value>,
    ) -> Operation {
        let operation = Operation::new(op_type, metadata);
        let copy = operation.clone();
        let entry = OperationEntry {
            operation,
            binding: None,
            cursor: 0,
            last_refresh: None,
        };
        let mut ops = self.ops.write().await;
        ops.insert(copy.id.clone(), Arc::new(Mutex::new(entry)));
        telemetry::set_gauge(GaugeMetric::TrackedOperations, ops.len() as f64);
        tracing::info!(id = %copy.id, op_type = %copy.op_type, "Operation created");
        copy
    }

    /// Bind an operation to a bridge in this process
    ///
    /// Binds exactly once; the operation becomes Running and its cache
    /// entry starts out stale so the first query refreshes.
    pub async fn register_local_source(
        &self,
        id: &str,
        bridge: Arc<ProgressBridge>,
    ) -> Result<(), RegistryError> {
        let binding = Binding {
            source: Arc::new(LocalSource::new(bridge.clone())),
            bridge: Some(bridge),
        };
        self.bind(id, binding, None).await
    }

    /// Bind an operation to a remote registry via a proxy source
    ///
    /// The remote id is recorded in metadata; a binding never changes
    /// kind once made.
    pub async fn register_remote_source(
        &self,
        id: &str,
        source: Arc<dyn ProgressSource>,
        remote_id: &str,
    ) -> Result<(), RegistryError> {
        let binding = Binding {
            source,
            bridge: None,
        };
        self.bind(id, binding, Some(remote_id)).await
    }

    async fn bind(
        &self,
        id: &str,
        binding: Binding,
        remote_id: Option<&str>,
    ) -> Result<(), RegistryError> {
        let entry = self.entry(id).await?;
        let mut guard = entry.lock().await;
        let entry = &mut *guard;
        if entry.operation.status.is_terminal() {
            tracing::debug!(id, "Ignoring source registration for terminal operation");
            return Ok(());
        }
        if entry.binding.is_some() {
            return Err(RegistryError::AlreadyBound(id.to_string()));
        }
        if let Some(remote_id) = remote_id {
            entry
                .operation
                .metadata
                .insert("remote_operation_id".to_string(), Value::from(remote_id));
        }
        entry.binding = Some(binding);
        entry.operation.status = OperationStatus::Running;
        entry.operation.updated_at = Utc::now();
        entry.last_refresh = None;
        tracing::info!(id, remote = remote_id.is_some(), "Operation bound and running");
        Ok(())
    }

    /// Current record, refreshed from its source if the cache is stale
    /// or `force_refresh` is set. Terminal records return straight from
    /// memory with no source read.
    pub async fn get_operation(
        &self,
        id: &str,
        force_refresh: bool,
    ) -> Result<Operation, RegistryError> {
        let entry = self.entry(id).await?;
        let mut guard = entry.lock().await;
        self.refresh_if_stale(&mut guard, force_refresh).await;
        Ok(guard.operation.clone())
    }

    /// All records matching the filters
    ///
    /// Running operations get the same refresh-if-stale treatment as a
    /// direct query, so a listing is as fresh as the TTL allows.
    pub async fn list_operations(
        &self,
        status: Option<OperationStatus>,
        op_type: Option<OperationType>,
    ) -> Vec<Operation> {
        let entries: Vec<Arc<Mutex<OperationEntry>>> =
            self.ops.read().await.values().cloned().collect();

        let mut out = Vec::new();
        for entry in entries {
            let mut guard = entry.lock().await;
            self.refresh_if_stale(&mut guard, false).await;
            let op = &guard.operation;
            if status.is_some_and(|s| op.status != s) {
                continue;
            }
            if op_type.as_ref().is_some_and(|t| op.op_type != *t) {
                continue;
            }
            out.push(op.clone());
        }
        out
    }

    /// Metric records with index >= cursor, plus the caller's next cursor
    ///
    /// The cursor belongs to the caller: concurrent consumers each hold
    /// their own and observe the same append order independently. A
    /// local binding reads the bridge directly (cursoring is itself the
    /// freshness mechanism, no TTL involved); a remote binding pulls new
    /// records through the proxy into the stored record first.
    pub async fn get_metrics(
        &self,
        id: &str,
        cursor: usize,
    ) -> Result<(Vec<MetricRecord>, usize), RegistryError> {
        let entry = self.entry(id).await?;
        let mut guard = entry.lock().await;

        if let Some(bridge) = guard.binding.as_ref().and_then(|b| b.bridge.clone()) {
            return Ok(bridge.metrics_since(cursor));
        }

        let remote = guard
            .binding
            .as_ref()
            .filter(|b| b.bridge.is_none())
            .map(|b| b.source.clone());
        if let Some(source) = remote {
            let stored = guard.cursor;
            match source.fetch_metrics(stored).await {
                Ok(batch) => {
                    Self::apply_metric_batch(&mut guard, batch.records, batch.new_cursor);
                }
                Err(e) => {
                    // Degrade to whatever is already stored; the health
                    // monitor owns turning sustained failure into FAILED.
                    telemetry::increment(CounterMetric::SourceErrors);
                    tracing::warn!(id, error = %e, "Metric pull failed, serving stored records");
                }
            }
        }

        let records: Vec<MetricRecord> = guard
            .operation
            .metrics
            .iter()
            .skip(cursor)
            .cloned()
            .collect();
        let new_cursor = cursor + records.len();
        Ok((records, new_cursor))
    }

    /// Idempotent terminal transition to Completed
    pub async fn complete_operation(
        &self,
        id: &str,
        results: Option<Value>,
    ) -> Result<Operation, RegistryError> {
        self.finalize(id, OperationStatus::Completed, results, None)
            .await
    }

    /// Idempotent terminal transition to Failed
    pub async fn fail_operation(
        &self,
        id: &str,
        error: impl Into<String>,
    ) -> Result<Operation, RegistryError> {
        self.finalize(id, OperationStatus::Failed, None, Some(error.into()))
            .await
    }

    /// Idempotent terminal transition to Cancelled
    ///
    /// For a locally bound operation this also raises the bridge's
    /// cancellation flag; the worker stops at its own next checkpoint.
    pub async fn cancel_operation(
        &self,
        id: &str,
        reason: impl Into<String>,
    ) -> Result<Operation, RegistryError> {
        self.finalize(id, OperationStatus::Cancelled, None, Some(reason.into()))
            .await
    }

    async fn finalize(
        &self,
        id: &str,
        status: OperationStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<Operation, RegistryError> {
        let entry = self.entry(id).await?;
        let mut guard = entry.lock().await;
        let entry = &mut *guard;

        if entry.operation.status.is_terminal() {
            tracing::debug!(
                id,
                current = ?entry.operation.status,
                attempted = ?status,
                "Ignoring transition on terminal operation"
            );
            return Ok(entry.operation.clone());
        }

        let bridge = entry.binding.as_ref().and_then(|b| b.bridge.clone());
        if let Some(bridge) = bridge {
            if status == OperationStatus::Cancelled {
                bridge.request_cancel();
            }
            // Drain whatever the worker wrote since the last refresh so
            // the stored record is complete before the binding goes away.
            let (records, new_cursor) = bridge.metrics_since(entry.cursor);
            entry.operation.progress = bridge.snapshot();
            Self::apply_metric_batch(entry, records, new_cursor);
        }

        entry.operation.status = status;
        entry.operation.result = result;
        entry.operation.error = error;
        if status == OperationStatus::Completed {
            entry.operation.progress.percentage = 100.0;
        }
        entry.operation.updated_at = Utc::now();
        entry.binding = None;
        tracing::info!(id, status = ?status, "Operation finalized");
        Ok(entry.operation.clone())
    }

    async fn entry(&self, id: &str) -> Result<Arc<Mutex<OperationEntry>>, RegistryError> {
        self.ops
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    async fn refresh_if_stale(&self, entry: &mut OperationEntry, force: bool) {
        if entry.operation.status.is_terminal() || entry.binding.is_none() {
            return;
        }
        let stale = force
            || entry
                .last_refresh
                .map_or(true, |t| t.elapsed() >= self.config.cache_ttl);
        if stale {
            self.refresh(entry).await;
        }
    }

    /// Pull the current snapshot and unseen metrics from the bound
    /// source into the record. The only path state moves from producer
    /// to consumer.
    async fn refresh(&self, entry: &mut OperationEntry) {
        let Some(source) = entry.binding.as_ref().map(|b| b.source.clone()) else {
            return;
        };

        let snapshot = match source.fetch_snapshot().await {
            Ok(s) => s,
            Err(e) => {
                // Serve the last good record; stamping last_refresh means
                // a dead source is retried at TTL cadence, not per query.
                telemetry::increment(CounterMetric::SourceErrors);
                tracing::warn!(
                    id = %entry.operation.id,
                    error = %e,
                    "Refresh failed, serving cached state"
                );
                entry.last_refresh = Some(Instant::now());
                return;
            }
        };
        let metrics = source.fetch_metrics(entry.cursor).await;

        entry.operation.progress = snapshot.progress;
        match metrics {
            Ok(batch) => Self::apply_metric_batch(entry, batch.records, batch.new_cursor),
            Err(e) => {
                telemetry::increment(CounterMetric::SourceErrors);
                tracing::warn!(
                    id = %entry.operation.id,
                    error = %e,
                    "Metric pull failed during refresh"
                );
            }
        }
        entry.operation.updated_at = Utc::now();
        entry.last_refresh = Some(Instant::now());
        telemetry::increment(CounterMetric::Refreshes);

        // A remote registry owns the lifecycle of a remote-bound
        // operation; mirror a terminal state it reports.
        if let Some(status) = snapshot.status.filter(|s| s.is_terminal()) {
            entry.operation.status = status;
            entry.operation.result = snapshot.result;
            entry.operation.error = snapshot.error;
            entry.binding = None;
            tracing::info!(
                id = %entry.operation.id,
                status = ?status,
                "Mirrored terminal state from remote source"
            );
        }
    }

    fn apply_metric_batch(
        entry: &mut OperationEntry,
        records: Vec<MetricRecord>,
        new_cursor: usize,
    ) {
        if new_cursor < entry.cursor {
            // Source reset (e.g. a remote process restart): adopt its
            // cursor rather than asserting monotonicity.
            tracing::warn!(
                id = %entry.operation.id,
                stored = entry.cursor,
                reported = new_cursor,
                "Source metric cursor went backwards, resetting"
            );
        }
        entry.operation.metrics.extend(records);
        entry.cursor = new_cursor;
    }
}
