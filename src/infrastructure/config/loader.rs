use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::{Config, PlannerMode};

/// Configuration validation errors. Startup maps these to exit code 2.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no agents configured")]
    NoAgents,

    #[error("duplicate agent id: {0}")]
    DuplicateAgentId(String),

    #[error("agent {0} has an empty base_url")]
    EmptyBaseUrl(String),

    #[error("invalid {name}: {value}. Must be positive")]
    NonPositive { name: &'static str, value: u64 },

    #[error("invalid max_parallel: 0. Must be at least 1")]
    InvalidMaxParallel,

    #[error("invalid log level: {0}. Must be one of: debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("planner mode {0:?} requires an [llm] section with endpoint, api_key, model, api_version")]
    LlmRequired(PlannerMode),

    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `overture.yaml` in the working directory
    /// 3. Environment variables (`OVERTURE_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("overture.yaml"))
            .merge(Env::prefixed("OVERTURE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("OVERTURE_").split("__"))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }

        let mut seen = HashSet::new();
        for agent in &config.agents {
            if !seen.insert(agent.id.as_str()) {
                return Err(ConfigError::DuplicateAgentId(agent.id.clone()));
            }
            if agent.base_url.is_empty() {
                return Err(ConfigError::EmptyBaseUrl(agent.id.clone()));
            }
        }

        if config.discovery_timeout_s == 0 {
            return Err(ConfigError::NonPositive { name: "discovery_timeout_s", value: 0 });
        }
        if config.call_timeout_s == 0 {
            return Err(ConfigError::NonPositive { name: "call_timeout_s", value: 0 });
        }
        if config.breaker.failure_threshold == 0 {
            return Err(ConfigError::NonPositive { name: "breaker.failure_threshold", value: 0 });
        }
        if config.breaker.recovery_timeout_s == 0 {
            return Err(ConfigError::NonPositive { name: "breaker.recovery_timeout_s", value: 0 });
        }
        if config.scheduler.max_parallel == Some(0) {
            return Err(ConfigError::InvalidMaxParallel);
        }

        let valid_log_levels = ["debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        // The LLM section is required whenever the planner may call it.
        if matches!(config.planner.mode, PlannerMode::Llm) {
            match &config.llm {
                None => return Err(ConfigError::LlmRequired(config.planner.mode)),
                Some(llm) => {
                    if llm.endpoint.is_empty()
                        || llm.api_key.is_empty()
                        || llm.model.is_empty()
                        || llm.api_version.is_empty()
                    {
                        return Err(ConfigError::LlmRequired(config.planner.mode));
                    }
                }
            }
        }

        Ok(())
    }
}
