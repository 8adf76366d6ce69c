//! Prometheus metrics

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Successful source refreshes
    Refreshes,
    /// Source reads that failed (unreachable, bad body)
    SourceErrors,
    /// Operations force-failed by the health monitor
    TimeoutFailures,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Operations held in the registry map
    TrackedOperations,
    /// Operations currently in the Running state
    RunningOperations,
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    let name = match metric {
        CounterMetric::Refreshes => "optrack_refreshes_total",
        CounterMetric::SourceErrors => "optrack_source_errors_total",
        CounterMetric::TimeoutFailures => "optrack_timeout_failures_total",
    };
    metrics::counter!(name).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let name = match metric {
        GaugeMetric::TrackedOperations => "optrack_tracked_operations",
        GaugeMetric::RunningOperations => "optrack_running_operations",
    };
    metrics::gauge!(name).set(value);
}
