//! Prometheus metrics for the group administration service.
//!
//! All metrics follow the naming convention: `fg_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., mutations_committed_total)
//! - **Gauge**: Value that can go up or down (e.g., servers_in_transition)
//! - **Histogram**: Distribution of values (e.g., mutation_commit_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // MUTATION METRICS
    // =========================================================================

    /// Mutations durably committed and applied
    pub static ref MUTATIONS_COMMITTED: CounterVec = CounterVec::new(
        Opts::new("fg_groups_mutations_committed_total", "Mutations committed to the log and applied"),
        &["kind"]  // kind: add_group/remove_group/move_servers/move_tables
    ).expect("metric creation failed");

    /// Mutations rejected before reaching the log
    pub static ref MUTATIONS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("fg_groups_mutations_rejected_total", "Mutations rejected by validation"),
        &["reason"]
    ).expect("metric creation failed");

    /// Mutations whose caller gave up waiting
    pub static ref MUTATION_TIMEOUTS: Counter = Counter::new(
        "fg_groups_mutation_timeouts_total",
        "Mutations that exceeded the caller's timeout (outcome unknown to the caller)"
    ).expect("metric creation failed");

    /// Validate + persist + apply duration
    pub static ref MUTATION_COMMIT_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "fg_groups_mutation_commit_duration_seconds",
            "Time from validation start to in-memory apply"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).unwrap())
    ).expect("metric creation failed");

    // =========================================================================
    // PERSISTENCE METRICS
    // =========================================================================

    /// Commit attempts retried after a transient store failure
    pub static ref PERSISTENCE_RETRIES: Counter = Counter::new(
        "fg_store_commit_retries_total",
        "Mutation log commits retried after a transient failure"
    ).expect("metric creation failed");

    /// Records replayed at startup
    pub static ref RECORDS_REPLAYED: Counter = Counter::new(
        "fg_store_records_replayed_total",
        "Mutation log records replayed into the registry"
    ).expect("metric creation failed");

    // =========================================================================
    // BALANCER NOTIFICATION METRICS
    // =========================================================================

    /// Membership notifications delivered to the balancer
    pub static ref NOTIFICATIONS_DELIVERED: Counter = Counter::new(
        "fg_coordinator_notifications_delivered_total",
        "Membership change notifications delivered"
    ).expect("metric creation failed");

    /// Membership notifications dropped after exhausting retries
    pub static ref NOTIFICATIONS_ABANDONED: Counter = Counter::new(
        "fg_coordinator_notifications_abandoned_total",
        "Membership change notifications abandoned after the final retry"
    ).expect("metric creation failed");

    /// Servers moved but not yet acknowledged by the balancer
    pub static ref SERVERS_IN_TRANSITION: Gauge = Gauge::new(
        "fg_coordinator_servers_in_transition",
        "Servers whose group change has not been delivered to the balancer"
    ).expect("metric creation failed");
}

/// Handle returned once metrics are registered.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Mutations
        Box::new(MUTATIONS_COMMITTED.clone()),
        Box::new(MUTATIONS_REJECTED.clone()),
        Box::new(MUTATION_TIMEOUTS.clone()),
        Box::new(MUTATION_COMMIT_DURATION.clone()),
        // Persistence
        Box::new(PERSISTENCE_RETRIES.clone()),
        Box::new(RECORDS_REPLAYED.clone()),
        // Coordinator
        Box::new(NOTIFICATIONS_DELIVERED.clone()),
        Box::new(NOTIFICATIONS_ABANDONED.clone()),
        Box::new(SERVERS_IN_TRANSITION.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
