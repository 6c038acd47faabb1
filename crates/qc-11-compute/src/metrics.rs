//! # Compute Metrics
//!
//! Prometheus metrics for contract invocation.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-11-compute = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `compute_keeper_call_seconds{kind}` - Histogram of keeper call latency
//! - `compute_query_gas_used` - Histogram of engine gas used per smart query
//! - `compute_out_of_gas_total` - Counter of transactions aborted by gas exhaustion

#![allow(missing_docs)]

use std::time::Instant;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, Histogram, HistogramVec,
    IntCounter,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Keeper call latency, labeled by call kind
    pub static ref KEEPER_CALL_SECONDS: HistogramVec = register_histogram_vec!(
        "compute_keeper_call_seconds",
        "Latency of keeper instantiate/execute/query/reply calls",
        &["kind"]
    )
    .expect("Failed to create KEEPER_CALL_SECONDS metric");

    /// Engine gas used per smart query
    pub static ref QUERY_GAS_USED: Histogram = register_histogram!(
        "compute_query_gas_used",
        "Engine gas used by a smart query",
        vec![1e5, 1e6, 5e6, 1e7, 5e7, 1e8, 5e8, 1e9, 3e9]
    )
    .expect("Failed to create QUERY_GAS_USED metric");

    /// Transactions aborted by gas exhaustion
    pub static ref OUT_OF_GAS_TOTAL: IntCounter = register_int_counter!(
        "compute_out_of_gas_total",
        "Total number of transactions aborted by gas exhaustion"
    )
    .expect("Failed to create OUT_OF_GAS_TOTAL metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record the latency of a keeper call started at `started`
#[cfg(feature = "metrics")]
pub fn observe_call(kind: &str, started: Instant) {
    KEEPER_CALL_SECONDS
        .with_label_values(&[kind])
        .observe(started.elapsed().as_secs_f64());
}

/// Record engine gas used by a query
#[cfg(feature = "metrics")]
#[allow(clippy::cast_precision_loss)]
pub fn observe_query_gas(gas_used: u64) {
    QUERY_GAS_USED.observe(gas_used as f64);
}

/// Record a transaction aborted by gas exhaustion
#[cfg(feature = "metrics")]
pub fn record_out_of_gas() {
    OUT_OF_GAS_TOTAL.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn observe_call(_kind: &str, _started: Instant) {}

#[cfg(not(feature = "metrics"))]
pub fn observe_query_gas(_gas_used: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_out_of_gas() {}

// =============================================================================
// CALL TIMER
// =============================================================================

/// Records the latency of a keeper call when dropped.
#[derive(Debug)]
pub struct CallTimer {
    kind: &'static str,
    started: Instant,
}

impl CallTimer {
    /// Starts timing a call of `kind`.
    #[must_use]
    pub fn start(kind: &'static str) -> Self {
        Self {
            kind,
            started: Instant::now(),
        }
    }
}

impl Drop for CallTimer {
    fn drop(&mut self) {
        observe_call(self.kind, self.started);
    }
}
