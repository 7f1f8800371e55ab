//! Scoped health checking.
//!
//! Named async probes run with a per-probe timeout; the aggregate is
//! the worst individual status. Results are cached until the next
//! explicit `check_health` call, so the `/health` endpoint can answer
//! from the last snapshot between probe sweeps.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::domain::models::HealthStatus;

/// Per-probe timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeReport {
    pub fn healthy() -> Self {
        Self { status: HealthStatus::Healthy, detail: None }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self { status: HealthStatus::Degraded, detail: Some(detail.into()) }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self { status: HealthStatus::Unhealthy, detail: Some(detail.into()) }
    }
}

/// Aggregated result of one `check_health` sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, ProbeReport>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl HealthSnapshot {
    fn empty() -> Self {
        Self {
            status: HealthStatus::Healthy,
            checks: BTreeMap::new(),
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }
}

type ProbeFn = Arc<dyn Fn() -> BoxFuture<'static, ProbeReport> + Send + Sync>;

/// Health checker holding named probes for one component.
pub struct HealthChecker {
    name: String,
    probes: Vec<(String, ProbeFn)>,
    last: RwLock<Option<HealthSnapshot>>,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probes: Vec::new(),
            last: RwLock::new(None),
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Register a named probe.
    pub fn register<F, Fut>(mut self, name: impl Into<String>, probe: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ProbeReport> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(component = %self.name, probe = %name, "registered health probe");
        self.probes.push((name, Arc::new(move || Box::pin(probe()))));
        self
    }

    /// Run every probe and cache the aggregate snapshot.
    pub async fn check_health(&self) -> HealthSnapshot {
        let started = Instant::now();
        let mut snapshot = HealthSnapshot::empty();

        for (name, probe) in &self.probes {
            let report = match tokio::time::timeout(self.probe_timeout, probe()).await {
                Ok(report) => report,
                Err(_) => ProbeReport::unhealthy("health check timeout"),
            };
            snapshot.status = snapshot.status.worst(report.status);
            snapshot.checks.insert(name.clone(), report);
        }

        snapshot.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        snapshot.timestamp = Utc::now();

        tracing::debug!(
            component = %self.name,
            status = %snapshot.status,
            checks = snapshot.checks.len(),
            "health check completed"
        );

        let mut last = self.last.write().await;
        *last = Some(snapshot.clone());
        snapshot
    }

    /// Last cached snapshot, if any sweep has run.
    pub async fn last_snapshot(&self) -> Option<HealthSnapshot> {
        self.last.read().await.clone()
    }
}
