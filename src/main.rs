//! Overture CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use overture::adapters::agent::{AgentRegistration, AgentServer, EchoExecutor};
use overture::domain::models::{Config, Skill};
use overture::infrastructure::config::{ConfigError, ConfigLoader};
use overture::infrastructure::{logging, metrics};
use overture::services::Orchestrator;

#[derive(Parser)]
#[command(name = "overture", version, about = "Multi-agent orchestration over the A2A protocol")]
struct Cli {
    /// Path to the configuration file (default: ./overture.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query across the configured agents
    Run {
        /// The natural-language request
        query: String,
        /// Conversation context handle, passed through to agents
        #[arg(long)]
        context_id: Option<String>,
    },
    /// Discover agents and print their cards
    Discover,
    /// Probe every configured agent's health endpoint
    Health,
    /// Serve a demo echo agent (local smoke testing)
    Serve {
        /// Agent id for the demo agent
        #[arg(long, default_value = "base")]
        id: String,
        /// Port to listen on
        #[arg(long, default_value_t = 9100)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The demo agent needs no orchestrator configuration.
    if let Commands::Serve { id, port } = &cli.command {
        return serve_demo_agent(id.clone(), *port).await;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            if err.downcast_ref::<ConfigError>().is_some() {
                eprintln!("Configuration invalid: {err:#}");
                return ExitCode::from(2);
            }
            eprintln!("Failed to load configuration: {err:#}");
            return ExitCode::from(1);
        }
    };

    if logging::init(&config.logging).is_err() {
        eprintln!("Failed to initialize logging");
        return ExitCode::from(1);
    }
    if let Some(port) = config.metrics.port {
        if let Err(err) = metrics::install_prometheus(port) {
            eprintln!("Failed to start metrics exporter: {err:#}");
            return ExitCode::from(1);
        }
    }

    match cli.command {
        Commands::Run { query, context_id } => run_query(&config, &query, context_id).await,
        Commands::Discover => discover(&config).await,
        Commands::Health => health(&config).await,
        Commands::Serve { .. } => unreachable!("handled above"),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

async fn run_query(config: &Config, query: &str, context_id: Option<String>) -> ExitCode {
    let orchestrator = Orchestrator::from_config(config);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; canceling run");
            ctrl_c_token.cancel();
        }
    });

    match orchestrator.execute(query, context_id.as_deref(), cancel).await {
        Ok(report) => {
            println!("{}", report.response);
            println!();
            print_results_table(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Run failed: {err}");
            ExitCode::from(1)
        }
    }
}

fn print_results_table(report: &overture::services::ExecutionReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Agent", "Outcome", "Duration"]);
    for result in &report.results {
        let outcome = if result.is_success() {
            "success".to_string()
        } else {
            result.error_message().unwrap_or_else(|| "error".into())
        };
        table.add_row(vec![
            result.step_index.to_string(),
            result.agent_id.clone(),
            outcome,
            format!("{}ms", result.duration_ms),
        ]);
    }
    println!("{table}");
    println!(
        "plan: {} | {} step(s) in {}ms",
        report.plan.execution_type,
        report.results.len(),
        report.duration_ms,
    );
}

async fn discover(config: &Config) -> ExitCode {
    let orchestrator = Orchestrator::from_config(config);
    let agents = orchestrator.catalog().refresh().await;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Agent", "Available", "Name", "Skills", "URL"]);
    for agent in &agents {
        let skills =
            agent.skills.iter().map(|s| s.id.clone()).collect::<Vec<_>>().join(", ");
        table.add_row(vec![
            agent.id.clone(),
            agent.available.to_string(),
            agent.name.clone(),
            skills,
            agent.base_url.clone(),
        ]);
    }
    println!("{table}");

    if agents.iter().any(|a| !a.available) {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

async fn health(config: &Config) -> ExitCode {
    use overture::domain::ports::AgentTransport;
    use overture::infrastructure::rpc::HttpAgentTransport;
    use std::time::Duration;

    let transport = HttpAgentTransport::new(
        Duration::from_secs(config.call_timeout_s),
        Duration::from_secs(config.discovery_timeout_s),
    )
    .with_bearer_token(config.auth_token.clone());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Agent", "Status", "Version"]);
    let mut all_live = true;
    for endpoint in &config.agents {
        match transport.health(&endpoint.base_url).await {
            Ok(report) => {
                table.add_row(vec![
                    endpoint.id.clone(),
                    report.status.to_string(),
                    report.version,
                ]);
            }
            Err(err) => {
                all_live = false;
                table.add_row(vec![endpoint.id.clone(), format!("unreachable ({err})"), "-".into()]);
            }
        }
    }
    println!("{table}");

    if all_live { ExitCode::SUCCESS } else { ExitCode::from(1) }
}

async fn serve_demo_agent(id: String, port: u16) -> ExitCode {
    if logging::init(&overture::domain::models::LoggingSettings::default()).is_err() {
        eprintln!("Failed to initialize logging");
        return ExitCode::from(1);
    }

    let registration = AgentRegistration::new(id.clone(), format!("{id} agent"))
        .with_description("Demo echo agent")
        .with_url(format!("http://localhost:{port}"))
        .with_skill(Skill::new("echo", "Echo").with_tag("general"));
    let server = AgentServer::new(registration, Arc::new(EchoExecutor::new(id)));

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Failed to bind port {port}: {err}");
            return ExitCode::from(1);
        }
    };

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    match server.serve(listener, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Agent server failed: {err:#}");
            ExitCode::from(1)
        }
    }
}
