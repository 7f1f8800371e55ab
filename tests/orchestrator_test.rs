//! End-to-end scenarios: real agent servers over HTTP, scripted
//! planner, full plan → schedule → synthesize pipeline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{config_for, spawn_agent, FixedExecutor, RecordingExecutor, ScriptedLlm, SlowExecutor};
use overture::domain::errors::OrchestratorError;
use overture::domain::models::{ExecutionType, PlannerMode};
use overture::domain::ports::LlmClient;
use overture::infrastructure::rpc::HttpAgentTransport;
use overture::services::Orchestrator;

fn http_transport() -> Arc<HttpAgentTransport> {
    Arc::new(HttpAgentTransport::new(
        std::time::Duration::from_secs(5),
        std::time::Duration::from_secs(5),
    ))
}

#[tokio::test]
async fn simple_routing_answers_via_single_step() {
    let calc_url =
        spawn_agent("calculator", &["math", "calculate"], Arc::new(FixedExecutor::new("15 + 27 = 42")))
            .await;

    let mut config = config_for(&[("calculator", &calc_url)]);
    config.planner.mode = PlannerMode::Llm;

    let plan_reply = json!({
        "execution_type": "sequential",
        "steps": [{"agent": "calculator", "task": "What is 15 + 27?"}]
    })
    .to_string();
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![Ok(plan_reply)]));

    let orchestrator = Orchestrator::with_components(&config, http_transport(), Some(llm));
    let report = orchestrator
        .execute("What is 15 + 27?", None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].is_success());
    assert!(report.results[0].text().unwrap().contains("42"));
    // Single-step synthesis is verbatim passthrough.
    assert_eq!(report.response, report.results[0].text().unwrap());
}

#[tokio::test]
async fn parallel_fan_out_mentions_both_results() {
    let weather_url =
        spawn_agent("weather", &["weather"], Arc::new(FixedExecutor::new("Paris: 18C, sunny")))
            .await;
    let calc_url =
        spawn_agent("calculator", &["math"], Arc::new(FixedExecutor::new("100 * 50 = 5000")))
            .await;

    let mut config = config_for(&[("weather", &weather_url), ("calculator", &calc_url)]);
    config.planner.mode = PlannerMode::Llm;

    let plan_reply = json!({
        "execution_type": "parallel",
        "steps": [
            {"agent": "weather", "task": "Weather in Paris"},
            {"agent": "calculator", "task": "calculate 100 * 50"}
        ]
    })
    .to_string();
    // One scripted reply: the synthesis call falls back to concatenation.
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![Ok(plan_reply)]));

    let orchestrator = Orchestrator::with_components(&config, http_transport(), Some(llm));
    let report = orchestrator
        .execute("Weather in Paris and calculate 100 * 50", None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.plan.execution_type, ExecutionType::Parallel);
    assert_eq!(report.results.len(), 2);
    assert!(report.results.iter().all(overture::domain::models::StepResult::is_success));
    assert!(report.response.contains("Paris"));
    assert!(report.response.contains("5000"));
}

#[tokio::test]
async fn sequential_plan_threads_research_into_weather_step() {
    let research_executor =
        Arc::new(RecordingExecutor::new("Tokyo has a population of 37 million people"));
    let weather_executor = Arc::new(RecordingExecutor::new("Tokyo: rainy, 22C"));
    let research_url = spawn_agent("research", &["research"], research_executor.clone()).await;
    let weather_url = spawn_agent("weather", &["weather"], weather_executor.clone()).await;

    let mut config = config_for(&[("research", &research_url), ("weather", &weather_url)]);
    config.planner.mode = PlannerMode::Llm;

    let plan_reply = json!({
        "execution_type": "sequential",
        "steps": [
            {"agent": "research", "task": "Research the population of Tokyo"},
            {"agent": "weather", "task": "Tell me the weather there", "dependencies": [0]}
        ]
    })
    .to_string();
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![Ok(plan_reply)]));

    let orchestrator = Orchestrator::with_components(&config, http_transport(), Some(llm));
    let report = orchestrator
        .execute(
            "Research the population of Tokyo and tell me the weather there",
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.results.iter().all(overture::domain::models::StepResult::is_success));

    // The weather step's dispatched text carries the research excerpt.
    let weather_queries = weather_executor.received.lock().unwrap().clone();
    assert_eq!(weather_queries.len(), 1);
    assert!(weather_queries[0].starts_with("Tell me the weather there"));
    assert!(weather_queries[0]
        .contains("research_result: Tokyo has a population of 37 million people"));
}

#[tokio::test]
async fn invalid_llm_plan_aborts_before_any_dispatch() {
    let recording = Arc::new(RecordingExecutor::new("untouched"));
    let url = spawn_agent("calculator", &["math"], recording.clone()).await;

    let mut config = config_for(&[("calculator", &url)]);
    config.planner.mode = PlannerMode::Llm;

    let plan_reply = json!({
        "execution_type": "sequential",
        "steps": [{"agent": "astrologer", "task": "read the stars"}]
    })
    .to_string();
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![Ok(plan_reply)]));

    let orchestrator = Orchestrator::with_components(&config, http_transport(), Some(llm));
    let err = orchestrator
        .execute("read the stars", None, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Plan(_)));
    assert!(recording.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fallback_planner_routes_by_keyword_without_llm() {
    let calc_url = spawn_agent(
        "calculator",
        &["math", "calculate"],
        Arc::new(FixedExecutor::new("100 * 50 = 5000")),
    )
    .await;
    let weather_url =
        spawn_agent("weather", &["weather"], Arc::new(FixedExecutor::new("sunny"))).await;

    let mut config = config_for(&[("weather", &weather_url), ("calculator", &calc_url)]);
    config.planner.mode = PlannerMode::Fallback;

    let orchestrator = Orchestrator::with_components(&config, http_transport(), None);
    let report = orchestrator
        .execute("please calculate 100 * 50", None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].agent_id, "calculator");
    assert_eq!(report.response, "100 * 50 = 5000");
}

#[tokio::test]
async fn mid_run_cancellation_is_the_runs_overall_error() {
    let url = spawn_agent(
        "base",
        &["general"],
        Arc::new(SlowExecutor { delay: Duration::from_millis(400), reply: "too late".into() }),
    )
    .await;

    let mut config = config_for(&[("base", &url)]);
    config.planner.mode = PlannerMode::Fallback;
    let orchestrator = Orchestrator::with_components(&config, http_transport(), None);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = orchestrator
        .execute("do the slow thing", None, cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Canceled));
}

#[tokio::test]
async fn auto_mode_survives_a_dead_llm() {
    let url = spawn_agent("base", &["general"], Arc::new(FixedExecutor::new("handled"))).await;

    let mut config = config_for(&[("base", &url)]);
    config.planner.mode = PlannerMode::Auto;

    // The script is empty, so every LLM call errors; planning falls
    // back and single-step synthesis never needs the LLM.
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(vec![]));
    let orchestrator = Orchestrator::with_components(&config, http_transport(), Some(llm));

    let report = orchestrator
        .execute("do something nice", None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.response, "handled");
}
