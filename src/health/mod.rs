//! Health monitoring for running operations
//!
//! The only background-scheduled actor in the system. Every tick it
//! lists running operations through the registry's own query path
//! (which refreshes them as a side effect) and force-fails any whose
//! record has gone too long without an update. A worker that stopped
//! reporting, or a remote host that stayed unreachable past the
//! threshold, surfaces to clients as FAILED on their next query.
//!
//! The monitor never interrupts the underlying worker; it only marks
//! the tracking record.

use crate::operation::OperationStatus;
use crate::registry::OperationsService;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Health monitor thresholds
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Time between health passes
    pub check_interval: Duration,
    /// Running operations whose record is older than this are failed
    pub operation_timeout: Duration,
    /// Consecutive passes with unchanged progress before a stuck warning
    pub stuck_intervals: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            operation_timeout: Duration::from_secs(30 * 60),
            stuck_intervals: 3,
        }
    }
}

/// Periodic watchdog over the registry's running operations
pub struct HealthMonitor {
    registry: Arc<OperationsService>,
    config: HealthConfig,
    /// Per-operation progress seen on previous passes, for stuck detection
    progress_seen: HashMap<String, StuckTracker>,
}

struct StuckTracker {
    percentage: f64,
    unchanged_passes: u32,
}

impl HealthMonitor {
    pub fn new(registry: Arc<OperationsService>, config: HealthConfig) -> Self {
        Self {
            registry,
            config,
            progress_seen: HashMap::new(),
        }
    }

    /// Run on the configured interval until the task is aborted
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_once().await;
            }
        })
    }

    /// One health pass over all running operations
    pub async fn check_once(&mut self) {
        let running = self
            .registry
            .list_operations(Some(OperationStatus::Running), None)
            .await;
        telemetry::set_gauge(GaugeMetric::RunningOperations, running.len() as f64);

        let now = chrono::Utc::now();
        let mut still_running = Vec::with_capacity(running.len());

        for op in running {
            let age = (now - op.updated_at).to_std().unwrap_or_default();
            if age >= self.config.operation_timeout {
                let message = format!(
                    "operation timed out: no update for {}s (threshold {}s)",
                    age.as_secs(),
                    self.config.operation_timeout.as_secs()
                );
                tracing::error!(id = %op.id, age_secs = age.as_secs(), "Failing timed-out operation");
                telemetry::increment(CounterMetric::TimeoutFailures);
                if let Err(e) = self.registry.fail_operation(&op.id, message).await {
                    tracing::warn!(id = %op.id, error = %e, "Timeout fail did not apply");
                }
                continue;
            }

            self.track_stuck(&op.id, op.progress.percentage);
            still_running.push(op.id);
        }

        self.progress_seen.retain(|id, _| still_running.contains(id));
    }

    /// Warn-only: unchanged progress is suspicious but not fatal
    /// (a long epoch looks exactly like a hang from out here).
    fn track_stuck(&mut self, id: &str, percentage: f64) {
        use std::collections::hash_map::Entry;

        match self.progress_seen.entry(id.to_string()) {
            Entry::Vacant(v) => {
                v.insert(StuckTracker {
                    percentage,
                    unchanged_passes: 0,
                });
            }
            Entry::Occupied(mut o) => {
                let tracker = o.get_mut();
                if tracker.percentage == percentage {
                    tracker.unchanged_passes += 1;
                    if tracker.unchanged_passes >= self.config.stuck_intervals {
                        tracing::warn!(
                            id,
                            percentage,
                            passes = tracker.unchanged_passes,
                            "Operation progress appears stuck"
                        );
                    }
                } else {
                    tracker.percentage = percentage;
                    tracker.unchanged_passes = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ProgressBridge;
    use crate::operation::OperationType;
    use crate::registry::RegistryConfig;
    use serde_json::Map;

    fn registry() -> Arc<OperationsService> {
        Arc::new(OperationsService::new(RegistryConfig {
            cache_ttl: Duration::ZERO,
        }))
    }

    #[tokio::test]
    async fn test_timed_out_operation_is_failed() {
        let registry = registry();
        let op = registry
            .create_operation(OperationType::Training, Map::new())
            .await;
        let bridge = Arc::new(ProgressBridge::new());
        registry
            .register_local_source(&op.id, bridge)
            .await
            .unwrap();

        let mut monitor = HealthMonitor::new(
            registry.clone(),
            HealthConfig {
                check_interval: Duration::from_secs(60),
                operation_timeout: Duration::ZERO,
                stuck_intervals: 3,
            },
        );
        monitor.check_once().await;

        let failed = registry.get_operation(&op.id, true).await.unwrap();
        assert_eq!(failed.status, OperationStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("timed out"));

        // stays failed even under forced refresh
        let again = registry.get_operation(&op.id, true).await.unwrap();
        assert_eq!(again.status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_fresh_operation_survives_pass() {
        let registry = registry();
        let op = registry
            .create_operation(OperationType::DataLoad, Map::new())
            .await;
        let bridge = Arc::new(ProgressBridge::new());
        registry
            .register_local_source(&op.id, bridge.clone())
            .await
            .unwrap();
        bridge.update_state(50.0, "halfway", Map::new());

        let mut monitor = HealthMonitor::new(registry.clone(), HealthConfig::default());
        monitor.check_once().await;

        let still = registry.get_operation(&op.id, false).await.unwrap();
        assert_eq!(still.status, OperationStatus::Running);
    }

    #[tokio::test]
    async fn test_stuck_tracking_does_not_fail_operation() {
        let registry = registry();
        let op = registry
            .create_operation(OperationType::Training, Map::new())
            .await;
        let bridge = Arc::new(ProgressBridge::new());
        registry
            .register_local_source(&op.id, bridge.clone())
            .await
            .unwrap();
        bridge.update_state(42.0, "epoch 3", Map::new());

        let mut monitor = HealthMonitor::new(
            registry.clone(),
            HealthConfig {
                check_interval: Duration::from_secs(60),
                operation_timeout: Duration::from_secs(3600),
                stuck_intervals: 2,
            },
        );
        // several passes with frozen progress: warns, never fails
        for _ in 0..4 {
            monitor.check_once().await;
        }

        let still = registry.get_operation(&op.id, false).await.unwrap();
        assert_eq!(still.status, OperationStatus::Running);
    }

    #[tokio::test]
    async fn test_terminal_operations_ignored() {
        let registry = registry();
        let op = registry
            .create_operation(OperationType::Backtest, Map::new())
            .await;
        registry
            .register_local_source(&op.id, Arc::new(ProgressBridge::new()))
            .await
            .unwrap();
        registry.complete_operation(&op.id, None).await.unwrap();

        let mut monitor = HealthMonitor::new(
            registry.clone(),
            HealthConfig {
                check_interval: Duration::from_secs(60),
                operation_timeout: Duration::ZERO,
                stuck_intervals: 3,
            },
        );
        monitor.check_once().await;

        let done = registry.get_operation(&op.id, false).await.unwrap();
        assert_eq!(done.status, OperationStatus::Completed);
    }
}
