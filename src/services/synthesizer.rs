//! Response synthesis: step results in, one coherent answer out.
//!
//! Single-step runs pass the text through verbatim. Multi-step runs are
//! reduced by the LLM; when it is unavailable the fallback concatenates
//! the results per agent, preserving step declaration order. Failed
//! steps appear inline with an error marker; steps canceled by the
//! caller are left out.

use std::sync::Arc;

use crate::domain::models::{StepOutcome, StepResult};
use crate::domain::ports::LlmClient;
use crate::services::circuit_breaker::{BreakerRegistry, BreakerScope};
use crate::services::context::excerpt;

/// Reduces heterogeneous step outputs to one response string. Always
/// produces a string for any run that reached scheduling.
pub struct Synthesizer {
    llm: Option<Arc<dyn LlmClient>>,
    breakers: Arc<BreakerRegistry>,
}

impl Synthesizer {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, breakers: Arc<BreakerRegistry>) -> Self {
        Self { llm, breakers }
    }

    pub async fn synthesize(&self, query: &str, results: &[StepResult]) -> String {
        if results.is_empty() {
            return "No steps were executed for this request.".to_string();
        }
        if results.len() == 1 {
            return single_step_response(&results[0]);
        }

        if let Some(ref llm) = self.llm {
            if self.breakers.try_acquire(&BreakerScope::Llm).await {
                let prompt = build_synthesis_prompt(query, results);
                match llm.complete(&prompt).await {
                    Ok(text) => {
                        self.breakers.record_success(&BreakerScope::Llm).await;
                        return text;
                    }
                    Err(err) => {
                        if err.is_transient() {
                            self.breakers.record_failure(&BreakerScope::Llm).await;
                        }
                        tracing::warn!(error = %err, "LLM synthesis failed; using concatenation");
                    }
                }
            }
        }

        concatenate_results(results)
    }
}

fn single_step_response(result: &StepResult) -> String {
    match &result.outcome {
        StepOutcome::Success { text } => text.clone(),
        StepOutcome::Failed { error, .. } => {
            format!("The {} agent could not complete the request: {}", result.agent_id, error)
        }
        StepOutcome::Skipped { .. } => format!(
            "The {} agent was skipped because an earlier step failed.",
            result.agent_id
        ),
        StepOutcome::Canceled => "The request was canceled before completion.".to_string(),
    }
}

/// Deterministic fallback: `**{agent}**: {text}` blocks joined by blank
/// lines, in declaration order.
fn concatenate_results(results: &[StepResult]) -> String {
    let blocks: Vec<String> = results
        .iter()
        .filter_map(|result| match &result.outcome {
            StepOutcome::Success { text } => {
                Some(format!("**{}**: {}", result.agent_id, text))
            }
            StepOutcome::Failed { error, .. } => {
                Some(format!("**{}**: error: {}", result.agent_id, error))
            }
            StepOutcome::Skipped { .. } => {
                Some(format!("**{}**: error: dependency_failed", result.agent_id))
            }
            StepOutcome::Canceled => None,
        })
        .collect();

    if blocks.is_empty() {
        "The request was canceled before completion.".to_string()
    } else {
        blocks.join("\n\n")
    }
}

fn build_synthesis_prompt(query: &str, results: &[StepResult]) -> String {
    let mut sections = Vec::new();
    for result in results {
        match &result.outcome {
            StepOutcome::Success { text } => {
                sections.push(format!("- {}: {}", result.agent_id, excerpt(text)));
            }
            StepOutcome::Failed { error, .. } => {
                sections.push(format!("- {}: FAILED ({})", result.agent_id, error));
            }
            StepOutcome::Skipped { .. } => {
                sections.push(format!("- {}: SKIPPED (dependency failed)", result.agent_id));
            }
            StepOutcome::Canceled => {}
        }
    }

    format!(
        r#"You are composing the final answer for a multi-agent request.

## Original Query
"{query}"

## Agent Results
{results}

## Instructions
Produce one coherent response that answers the original query using the
agent results above. Mention failures briefly only when they affect the
answer. Respond with plain text, no preamble."#,
        query = query,
        results = sections.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{LlmError, StepError, TransportError};
    use async_trait::async_trait;

    struct FixedLlm(Result<String, LlmError>);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.0.clone()
        }
    }

    fn synthesizer(llm: Option<Result<String, LlmError>>) -> Synthesizer {
        Synthesizer::new(
            llm.map(|r| Arc::new(FixedLlm(r)) as Arc<dyn LlmClient>),
            Arc::new(BreakerRegistry::with_defaults()),
        )
    }

    #[tokio::test]
    async fn single_step_passthrough() {
        let results = vec![StepResult::success(0, "calculator", "15 + 27 = 42", 3)];
        let response = synthesizer(None).synthesize("What is 15 + 27?", &results).await;
        assert_eq!(response, "15 + 27 = 42");
    }

    #[tokio::test]
    async fn single_failed_step_is_shaped() {
        let error = StepError::Transport(TransportError::Timeout { seconds: 30 });
        let results = vec![StepResult::failed(0, "weather", &error, 30_000)];
        let response = synthesizer(None).synthesize("weather?", &results).await;
        assert!(response.contains("weather"));
        assert!(response.contains("could not complete"));
    }

    #[tokio::test]
    async fn multi_step_uses_llm_when_available() {
        let results = vec![
            StepResult::success(0, "weather", "Paris: 18C, sunny", 10),
            StepResult::success(1, "calculator", "100 * 50 = 5000", 5),
        ];
        let response = synthesizer(Some(Ok("It is sunny in Paris and the product is 5000.".into())))
            .synthesize("Weather in Paris and calculate 100 * 50", &results)
            .await;
        assert_eq!(response, "It is sunny in Paris and the product is 5000.");
    }

    #[tokio::test]
    async fn multi_step_fallback_preserves_order() {
        let results = vec![
            StepResult::success(0, "weather", "Paris: 18C", 10),
            StepResult::success(1, "calculator", "5000", 5),
        ];
        let response = synthesizer(Some(Err(LlmError::Request("down".into()))))
            .synthesize("q", &results)
            .await;
        assert_eq!(response, "**weather**: Paris: 18C\n\n**calculator**: 5000");
    }

    #[tokio::test]
    async fn fallback_marks_failures_and_skips() {
        let error = StepError::Transport(TransportError::Unreachable("refused".into()));
        let results = vec![
            StepResult::failed(0, "research", &error, 2),
            StepResult::skipped(1, "weather", 0),
        ];
        let response = synthesizer(None).synthesize("q", &results).await;
        assert!(response.contains("**research**: error:"));
        assert!(response.contains("**weather**: error: dependency_failed"));
    }

    #[tokio::test]
    async fn canceled_steps_are_elided() {
        let results = vec![
            StepResult::success(0, "calculator", "4", 1),
            StepResult::canceled(1, "weather", 0),
            StepResult::canceled(2, "research", 0),
        ];
        let response = synthesizer(None).synthesize("q", &results).await;
        assert_eq!(response, "**calculator**: 4");
    }

    #[tokio::test]
    async fn all_canceled_run_still_produces_a_string() {
        let results =
            vec![StepResult::canceled(0, "a", 0), StepResult::canceled(1, "b", 0)];
        let response = synthesizer(None).synthesize("q", &results).await;
        assert!(response.contains("canceled"));
    }
}
