//! Agent capability registry.
//!
//! Collects the identity, skills, and capability flags an agent
//! declares, and renders the agent card served at
//! `/.well-known/agent-card.json`.

use crate::domain::models::{AgentCapabilities, AgentCard, Skill};

/// Declarative registration for one agent process.
#[derive(Debug, Clone)]
pub struct AgentRegistration {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub url: String,
    pub skills: Vec<Skill>,
    pub capabilities: AgentCapabilities,
}

impl AgentRegistration {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            url: String::new(),
            skills: vec![],
            capabilities: AgentCapabilities {
                streaming: true,
                push_notifications: false,
                state_transition_history: false,
            },
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Render the discovery card.
    pub fn card(&self) -> AgentCard {
        AgentCard {
            name: self.name.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            version: self.version.clone(),
            default_input_modes: vec!["text/plain".into()],
            default_output_modes: vec!["text/plain".into()],
            capabilities: self.capabilities,
            skills: self.skills.clone(),
        }
    }
}
