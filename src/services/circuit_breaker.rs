//! Circuit breakers for outbound dependencies.
//!
//! One breaker per logical scope (the LLM backend, each remote agent).
//! A breaker in `open` rejects calls without invoking transport; after
//! the recovery timeout the next call transitions it to `half_open` and
//! executes as a probe. Which failures count is the caller's decision:
//! timeouts and transport errors do, planned cancellations do not.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::domain::models::BreakerSettings;

/// Breaker tuning shared by every scope.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive counted failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before probing.
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout: Duration::from_secs(60) }
    }
}

impl From<&BreakerSettings> for BreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_secs(settings.recovery_timeout_s),
        }
    }
}

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Logical dependency a breaker protects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BreakerScope {
    /// The LLM backend used by planner and synthesizer.
    Llm,
    /// One remote agent, by catalog id.
    Agent(String),
}

impl BreakerScope {
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(id.into())
    }
}

impl std::fmt::Display for BreakerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Llm => f.write_str("llm"),
            Self::Agent(id) => write!(f, "agent:{id}"),
        }
    }
}

/// Single breaker state machine.
#[derive(Debug, Clone)]
struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

impl CircuitBreaker {
    fn new() -> Self {
        Self { state: CircuitState::Closed, failure_count: 0, last_failure_at: None }
    }

    /// Whether a call may proceed now; open circuits past their
    /// recovery timeout transition to half-open and admit one probe.
    fn try_acquire(&mut self, config: &BreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = self
                    .last_failure_at
                    .is_none_or(|at| at.elapsed() >= config.recovery_timeout);
                if recovered {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn on_success(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
    }

    fn on_failure(&mut self, config: &BreakerConfig) {
        self.last_failure_at = Some(Instant::now());
        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
            }
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= config.failure_threshold {
                    self.state = CircuitState::Open;
                }
            }
            CircuitState::Open => {}
        }
    }
}

/// Point-in-time view of one breaker, for metrics and diagnostics.
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub scope: String,
    pub state: CircuitState,
    pub failure_count: u32,
}

/// Process-wide breaker registry. One instance per orchestrator; tests
/// inject fresh instances.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: RwLock<HashMap<BreakerScope, CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, breakers: RwLock::new(HashMap::new()) }
    }

    pub fn with_defaults() -> Self {
        Self::new(BreakerConfig::default())
    }

    /// Whether a call through this scope may proceed now.
    pub async fn try_acquire(&self, scope: &BreakerScope) -> bool {
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(scope.clone())
            .or_insert_with(CircuitBreaker::new)
            .try_acquire(&self.config)
    }

    /// Record a successful call.
    pub async fn record_success(&self, scope: &BreakerScope) {
        let mut breakers = self.breakers.write().await;
        if let Some(breaker) = breakers.get_mut(scope) {
            breaker.on_success();
        }
    }

    /// Record a counted failure.
    pub async fn record_failure(&self, scope: &BreakerScope) {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers.entry(scope.clone()).or_insert_with(CircuitBreaker::new);
        let was_open = breaker.state == CircuitState::Open;
        breaker.on_failure(&self.config);
        if breaker.state == CircuitState::Open && !was_open {
            tracing::warn!(scope = %scope, failures = breaker.failure_count, "circuit opened");
        }
    }

    /// Current state, if the scope has been seen.
    pub async fn state(&self, scope: &BreakerScope) -> Option<CircuitState> {
        let breakers = self.breakers.read().await;
        breakers.get(scope).map(|b| b.state)
    }

    /// Snapshot of every breaker.
    pub async fn stats(&self) -> Vec<BreakerStats> {
        let breakers = self.breakers.read().await;
        breakers
            .iter()
            .map(|(scope, b)| BreakerStats {
                scope: scope.to_string(),
                state: b.state,
                failure_count: b.failure_count,
            })
            .collect()
    }
}
