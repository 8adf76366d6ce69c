//! optrack: pull-based operations tracking for long-running research jobs
//!
//! This library provides the core components for:
//! - Synchronous progress bridges shared with worker threads
//! - An in-memory operation registry with TTL-gated, on-demand refresh
//! - Location-transparent sources: local bridge or remote HTTP proxy
//! - The operations HTTP API (same shape on primary and host services)
//! - Health monitoring that force-fails stalled operations
//! - Structured logging and Prometheus metrics
//!
//! Workers never touch async machinery: they write to a `ProgressBridge`
//! with plain, lock-scoped memory operations. All I/O lives on the
//! consumer side and runs only when a client asks.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod health;
pub mod operation;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod telemetry;
