//! Typed configuration model.
//!
//! Loaded hierarchically (defaults, YAML file, environment) by
//! `infrastructure::config::ConfigLoader` and validated before use.

use serde::{Deserialize, Serialize};

/// One configured agent endpoint. Declaration order is the catalog
/// order and breaks fallback-routing ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEndpoint {
    pub id: String,
    pub base_url: String,
}

/// Planner operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerMode {
    /// Always use the LLM; fail when it is unavailable.
    Llm,
    /// Always use the deterministic keyword fallback.
    Fallback,
    /// Try the LLM, fall back on error or invalid output.
    Auto,
}

/// Circuit breaker settings, shared by every breaker scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout_s")]
    pub recovery_timeout_s: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_s() -> u64 {
    60
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout_s: 60 }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SchedulerSettings {
    /// Maximum in-flight steps. Defaults to the number of agents.
    pub max_parallel: Option<usize>,
    /// Global deadline per run, seconds. Unbounded when absent.
    pub run_deadline_s: Option<u64>,
    /// Reserved: per-step retry is intentionally not implemented.
    #[serde(default)]
    pub retry_steps: bool,
}

/// Planner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerSettings {
    #[serde(default = "default_planner_mode")]
    pub mode: PlannerMode,
    /// Agent the fallback planner targets when no keyword matches.
    #[serde(default = "default_base_agent")]
    pub base_agent: String,
}

fn default_planner_mode() -> PlannerMode {
    PlannerMode::Auto
}

fn default_base_agent() -> String {
    "base".into()
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self { mode: PlannerMode::Auto, base_agent: "base".into() }
    }
}

/// LLM backend settings. Required iff the planner may use the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub api_version: String,
    #[serde(default = "default_llm_timeout_s")]
    pub timeout_s: u64,
}

fn default_llm_timeout_s() -> u64 {
    60
}

fn default_discovery_timeout_s() -> u64 {
    10
}

fn default_call_timeout_s() -> u64 {
    30
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// One of: debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// One of: json, pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".into(), format: "pretty".into() }
    }
}

/// Metrics exposition settings. Exposition is disabled when no port is
/// configured; the port choice is a deployment concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MetricsSettings {
    pub port: Option<u16>,
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Agent catalog, in declaration order.
    #[serde(default)]
    pub agents: Vec<AgentEndpoint>,
    /// Agent card discovery timeout, seconds.
    #[serde(default = "default_discovery_timeout_s")]
    pub discovery_timeout_s: u64,
    /// Per-call transport timeout, seconds.
    #[serde(default = "default_call_timeout_s")]
    pub call_timeout_s: u64,
    /// Optional bearer token attached to outbound calls.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub planner: PlannerSettings,
    #[serde(default)]
    pub llm: Option<LlmSettings>,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agents: vec![],
            discovery_timeout_s: 10,
            call_timeout_s: 30,
            auth_token: None,
            breaker: BreakerSettings::default(),
            scheduler: SchedulerSettings::default(),
            planner: PlannerSettings::default(),
            llm: None,
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl Config {
    /// Effective in-flight step cap: configured value or agent count.
    pub fn max_parallel(&self) -> usize {
        self.scheduler.max_parallel.unwrap_or_else(|| self.agents.len().max(1))
    }
}
