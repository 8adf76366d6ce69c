//! Serve command implementation

use crate::config::Config;
use crate::health::{HealthConfig, HealthMonitor};
use crate::registry::{OperationsService, RegistryConfig};
use crate::server;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override the configured bind address
    #[arg(short, long)]
    pub bind: Option<String>,
}

impl ServeArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let registry = Arc::new(OperationsService::new(RegistryConfig {
            cache_ttl: config.cache.ttl(),
        }));

        let monitor = HealthMonitor::new(
            registry.clone(),
            HealthConfig {
                check_interval: Duration::from_secs(config.health.check_interval_secs),
                operation_timeout: Duration::from_secs(config.health.operation_timeout_secs),
                stuck_intervals: config.health.stuck_intervals,
            },
        );
        let monitor_handle = monitor.spawn();

        let bind_addr = self.bind.as_deref().unwrap_or(&config.server.bind_addr);
        tracing::info!(
            bind_addr,
            cache_ttl_secs = config.cache.ttl_secs,
            "Starting operations service"
        );
        let result = server::serve(registry, bind_addr).await;

        monitor_handle.abort();
        result
    }
}
