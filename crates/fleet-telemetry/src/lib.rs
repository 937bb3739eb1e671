//! # Fleet Telemetry
//!
//! Logging and metrics for the fleet group services.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter`, pretty or JSON
//! - **Metrics**: Prometheus statics registered in one global registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleet_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `fleet-groups` | Service name in logs |
//! | `FG_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honored) |
//! | `FG_JSON_LOGS` | `false` | JSON output (defaults on in containers) |
//! | `FG_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, MUTATIONS_COMMITTED,
    MUTATIONS_REJECTED, MUTATION_COMMIT_DURATION, MUTATION_TIMEOUTS, NOTIFICATIONS_ABANDONED,
    NOTIFICATIONS_DELIVERED, PERSISTENCE_RETRIES, RECORDS_REPLAYED, SERVERS_IN_TRANSITION,
};
pub use tracing_setup::init_subscriber;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed, or the layer failed.
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    /// Registering or encoding metrics failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Configuration could not be interpreted.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so that anything logged during setup is already counted.
    let metrics_handle = register_metrics()?;

    init_subscriber(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    _metrics: MetricsHandle,
}

impl TelemetryGuard {
    /// Service name the guard was initialized with.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
