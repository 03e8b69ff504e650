// SPDX-License-Identifier: MIT
//! Observability utilities.
//!
//! Structured logging helpers and the health check payload.

use std::time::Instant;
use tracing::{debug, info};

/// Track latency of an operation and emit a structured log event.
pub struct LatencyTracker {
    operation: String,
    start: Instant,
}

impl LatencyTracker {
    /// Start tracking latency for an operation.
    ///
    /// Examples:
    ///   let tracker = LatencyTracker::start("snapshot.load");
    pub fn start(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            start: Instant::now(),
        }
    }

    /// Finish tracking and emit a log event with the elapsed time.
    pub fn finish(self) {
        let elapsed_ms = self.start.elapsed().as_millis();
        if elapsed_ms > 1000 {
            // Slow operation — log at info level
            info!(
                operation = %self.operation,
                elapsed_ms = elapsed_ms,
                "slow operation"
            );
        } else {
            debug!(
                operation = %self.operation,
                elapsed_ms = elapsed_ms,
                "operation complete"
            );
        }
    }
}

/// Health check status.
#[derive(Debug, serde::Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    /// Whether the broker connection is currently up.
    pub broker_ok: bool,
    pub entities: usize,
}

impl HealthStatus {
    pub fn ok(uptime_secs: u64, broker_ok: bool, entities: usize) -> Self {
        Self {
            status: if broker_ok { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs,
            broker_ok,
            entities,
        }
    }
}
