//! Metrics collection and exposition.
//!
//! # Metrics
//! - `control_plane_service_available` (gauge): 1=available, 0=unavailable
//! - `control_plane_service_transitions_total` (counter): by service, cause
//! - `control_plane_health_check_duration_seconds` (histogram)
//! - `control_plane_health_check_failures_total` (counter)
//! - `control_plane_gate_rejections_total` (counter)
//! - `control_plane_hook_duration_seconds` (histogram): by hook, kind, outcome
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::HookKind;

/// Install the Prometheus exporter and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_service_available(service: &'static str, available: bool) {
    gauge!("control_plane_service_available", "service" => service)
        .set(if available { 1.0 } else { 0.0 });
}

pub fn record_transition(service: &'static str, cause: &'static str, available: bool) {
    counter!(
        "control_plane_service_transitions_total",
        "service" => service,
        "cause" => cause,
        "available" => if available { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_health_check(service: &'static str, healthy: bool, duration: Duration) {
    histogram!("control_plane_health_check_duration_seconds", "service" => service)
        .record(duration.as_secs_f64());
    if !healthy {
        counter!("control_plane_health_check_failures_total", "service" => service).increment(1);
    }
}

pub fn record_gate_rejection(service: &'static str) {
    counter!("control_plane_gate_rejections_total", "service" => service).increment(1);
}

pub fn record_hook(name: &str, kind: HookKind, outcome: &'static str, started: Instant) {
    let kind = match kind {
        HookKind::Startup => "startup",
        HookKind::Shutdown => "shutdown",
    };
    histogram!(
        "control_plane_hook_duration_seconds",
        "hook" => name.to_string(),
        "kind" => kind,
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}
