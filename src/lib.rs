//! Overture - multi-agent orchestration runtime.
//!
//! Speaks the A2A (Agent-to-Agent) JSON-RPC protocol end to end:
//! - Planner: LLM-backed query decomposition with a deterministic
//!   keyword fallback
//! - Scheduler: sequential / parallel / hybrid DAG execution with
//!   dependency-aware context threading
//! - Task runtime: streaming lifecycle state machine with artifacts
//! - Reliability: per-scope circuit breakers and scoped health checks
//! - Agent skeleton: executor contract, capability registry, and the
//!   A2A HTTP surface

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;
