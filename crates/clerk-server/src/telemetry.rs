//! Logging and metrics setup plus the metric names clerk reports.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const REGISTRATIONS: &str = "clerk_registrations_total";
pub const REGISTRATION_FAILURES: &str = "clerk_registration_failures_total";
pub const DEREGISTRATIONS: &str = "clerk_deregistrations_total";
pub const SYNC_PASSES: &str = "clerk_sync_passes_total";
pub const SYNC_FAILURES: &str = "clerk_sync_failures_total";
pub const TRACKED_SERVICES: &str = "clerk_tracked_services";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Installs the Prometheus recorder. Returns `None` if another recorder is already set.
pub fn install_metrics() -> Option<PrometheusHandle> {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).ok()?;
    Some(handle)
}

pub(crate) fn increment(name: &'static str) {
    metrics::counter!(name).increment(1);
}

pub(crate) fn tracked_services(count: usize) {
    metrics::gauge!(TRACKED_SERVICES).set(count as f64);
}
