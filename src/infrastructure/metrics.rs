//! Metrics sink consumed by every component.
//!
//! Thin wrappers over the `metrics` facade keep the label families
//! consistent everywhere: `a2a_requests_total{agent,skill,status}`,
//! `a2a_request_duration_seconds{agent,skill}`, `a2a_active_tasks{agent}`,
//! `a2a_errors_total{agent,error_type}`, `a2a_agent_uptime_seconds{agent}`.
//! Exposition is Prometheus text on an auxiliary HTTP port.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given auxiliary port.
///
/// Must be called from within a tokio runtime; the exporter serves
/// `/metrics` on `0.0.0.0:port` for the process lifetime.
pub fn install_prometheus(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus metrics exporter")?;
    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

/// Count one processed request.
pub fn record_request(agent: &str, skill: &str, status: &str) {
    counter!(
        "a2a_requests_total",
        "agent" => agent.to_string(),
        "skill" => skill.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Observe one request duration in seconds.
pub fn observe_request_duration(agent: &str, skill: &str, seconds: f64) {
    histogram!(
        "a2a_request_duration_seconds",
        "agent" => agent.to_string(),
        "skill" => skill.to_string(),
    )
    .record(seconds);
}

/// Track the number of currently active tasks.
pub fn adjust_active_tasks(agent: &str, delta: f64) {
    gauge!("a2a_active_tasks", "agent" => agent.to_string()).increment(delta);
}

/// Count one error by type.
pub fn record_error(agent: &str, error_type: &str) {
    counter!(
        "a2a_errors_total",
        "agent" => agent.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Publish agent uptime in seconds.
pub fn set_agent_uptime(agent: &str, seconds: f64) {
    gauge!("a2a_agent_uptime_seconds", "agent" => agent.to_string()).set(seconds);
}
