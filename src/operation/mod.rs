//! Shared operation data model
//!
//! The `Operation` record is the unit of trackable work: a training run,
//! a data load, a backtest. Records live in the registry's in-memory map
//! for the lifetime of the process; there is no persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state of an operation
///
/// Transitions: Pending → Running → {Completed, Failed, Cancelled}.
/// Terminal states are final; mutations of a terminal record are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Category of an operation
///
/// Open set: unknown categories round-trip as `Other` so a newer remote
/// registry can report types this build does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    Training,
    DataLoad,
    Backtest,
    Other(String),
}

impl From<String> for OperationType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "training" => Self::Training,
            "data_load" => Self::DataLoad,
            "backtest" => Self::Backtest,
            _ => Self::Other(s),
        }
    }
}

impl From<OperationType> for String {
    fn from(t: OperationType) -> Self {
        match t {
            OperationType::Training => "training".to_string(),
            OperationType::DataLoad => "data_load".to_string(),
            OperationType::Backtest => "backtest".to_string(),
            OperationType::Other(s) => s,
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: String = self.clone().into();
        write!(f, "{}", s)
    }
}

/// Latest progress written by a worker
///
/// A value-type copy with no history; each `update_state` call on a
/// bridge overwrites the previous snapshot whole. Percentage is clamped
/// to [0, 100] by convention of the source, not validated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub percentage: f64,
    pub current_step: String,
    /// Domain-specific fields (symbols, epochs, bar counts); stored as-is
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

/// One timestamped, domain-defined measurement
///
/// Append-only; never mutated or deleted once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl MetricRecord {
    pub fn now(data: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            data,
        }
    }
}

/// The unit of trackable long-running work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Opaque unique id, assigned at creation, immutable
    pub id: String,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub status: OperationStatus,
    pub progress: ProgressSnapshot,
    /// Full metric history pulled from the source so far
    #[serde(default, skip_serializing)]
    pub metrics: Vec<MetricRecord>,
    /// Cross-cutting bookkeeping: session ids, host URLs, etc.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Final results, set on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Terminal error or cancellation reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Operation {
    /// Create a fresh Pending record with a v4 uuid
    pub fn new(op_type: OperationType, metadata: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            op_type,
            status: OperationStatus::Pending,
            progress: ProgressSnapshot::default(),
            metrics: Vec::new(),
            metadata,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
