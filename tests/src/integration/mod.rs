//! # Integration Tests
//!
//! Flows that cross crate boundaries: the group admin service driving the
//! shared event bus, the file-backed mutation log, and telemetry.

mod admin_flows;
mod concurrency;
mod recovery;

/// Install telemetry once per test binary. Failures (a subscriber already
/// set by another harness) are ignored.
pub fn init_test_telemetry() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if let Ok(guard) =
            fleet_telemetry::init_telemetry(fleet_telemetry::TelemetryConfig::for_testing())
        {
            std::mem::forget(guard);
        }
    });
}
