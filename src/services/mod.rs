//! Service layer: the orchestration engine and its reliability
//! primitives.

pub mod catalog;
pub mod circuit_breaker;
pub mod context;
pub mod health;
pub mod orchestrator;
pub mod planner;
pub mod scheduler;
pub mod synthesizer;

pub use catalog::AgentCatalog;
pub use circuit_breaker::{BreakerConfig, BreakerRegistry, BreakerScope, CircuitState};
pub use health::{HealthChecker, HealthSnapshot, ProbeReport};
pub use orchestrator::{ExecutionReport, Orchestrator};
pub use planner::Planner;
pub use scheduler::{RunOutcome, Scheduler, SchedulerConfig};
pub use synthesizer::Synthesizer;

/// Extract a JSON object from an LLM reply, tolerating markdown fences
/// and surrounding prose.
pub fn extract_json_from_response(response: &str) -> String {
    let trimmed = response.trim();

    // Handle ```json ... ``` blocks
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
    }

    // Handle ``` ... ``` blocks
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
    }

    // If it already looks like a JSON object, use it directly
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed.to_string();
    }

    // Try to find a JSON object embedded in text
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plain_json() {
        assert_eq!(extract_json_from_response(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn extract_fenced_json() {
        assert_eq!(
            extract_json_from_response("```json\n{\"a\": 1}\n```"),
            r#"{"a": 1}"#
        );
        assert_eq!(extract_json_from_response("```\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
    }

    #[test]
    fn extract_embedded_json() {
        assert_eq!(
            extract_json_from_response("Here is the plan: {\"a\": 1} as requested."),
            r#"{"a": 1}"#
        );
    }

    #[test]
    fn extract_leaves_non_json_alone() {
        assert_eq!(extract_json_from_response("  no json here  "), "no json here");
    }
}
