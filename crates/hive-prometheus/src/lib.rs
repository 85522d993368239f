//! Prometheus backend for the agent's [`hive_core::AgentMetrics`].
//!
//! ## Metrics
//! - `hive_agent_passes_total` - Counter
//! - `hive_agent_passes_skipped_total` - Counter
//! - `hive_agent_pass_duration_seconds` - Histogram
//! - `hive_agent_supervisor_actions_total{action}` - Counter
//! - `hive_agent_live_supervisors` - Gauge
//!
//! ## HTTP Server
//! This crate does NOT serve `/metrics`; `hive-api` exposes [`PrometheusMetrics::encode`].

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
