//! Operation registry
//!
//! Authoritative in-memory store of `Operation` records. Mediates every
//! refresh from a bound source (local bridge or remote proxy), gated by
//! a TTL cache. Refresh happens exclusively as a side effect of a
//! client-initiated query; no background task polls sources on a timer,
//! so source I/O cost is proportional to client demand, not wall-clock
//! time.

mod service;
mod source;

pub use service::OperationsService;
pub use source::{LocalSource, MetricBatch, ProgressSource, SourceError, SourceSnapshot};

use std::time::Duration;
use thiserror::Error;

/// Registry errors surfaced to callers
///
/// Mutations of terminal operations are deliberately absent here: they
/// are no-ops (logged at debug), so duplicate completion signals stay
/// idempotent. Source failures are also absent: a failed refresh
/// degrades to serving the last good snapshot, never a query error.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Unknown operation id
    #[error("operation not found: {0}")]
    NotFound(String),
    /// Attempt to register a second source for one operation
    #[error("operation {0} is already bound to a source")]
    AlreadyBound(String),
}

/// Tuning knobs for the registry's refresh cache
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum age of cached state before a query triggers a refresh
    pub cache_ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(1),
        }
    }
}
