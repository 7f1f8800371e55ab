//! Agent card and catalog domain models.
//!
//! Agent cards are the self-describing discovery documents each agent
//! publishes at `/.well-known/agent-card.json`. Descriptors are the
//! orchestrator's cached view of an agent: card content plus the
//! configured id and availability.

use serde::{Deserialize, Serialize};

/// Capability flags advertised on an agent card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub streaming: bool,
    #[serde(rename = "pushNotifications")]
    pub push_notifications: bool,
    #[serde(rename = "stateTransitionHistory")]
    pub state_transition_history: bool,
}

/// A declared skill. Purely declarative; the planner uses tags and
/// examples as routing hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl Skill {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tags: vec![],
            examples: vec![],
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

/// The discovery document an agent publishes.
///
/// Every field here is required by the protocol; a card missing any of
/// them fails deserialization and the agent is marked unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    #[serde(rename = "defaultInputModes")]
    pub default_input_modes: Vec<String>,
    #[serde(rename = "defaultOutputModes")]
    pub default_output_modes: Vec<String>,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<Skill>,
}

/// The orchestrator's cached view of one configured agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDescriptor {
    /// Catalog id from configuration (not the card's display name).
    pub id: String,
    /// Base URL the agent is served at.
    pub base_url: String,
    pub name: String,
    pub description: String,
    pub skills: Vec<Skill>,
    pub capabilities: AgentCapabilities,
    /// False when discovery failed or the card was invalid.
    pub available: bool,
}

impl AgentDescriptor {
    /// Build a descriptor from a fetched card.
    pub fn from_card(id: impl Into<String>, base_url: impl Into<String>, card: AgentCard) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            name: card.name,
            description: card.description,
            skills: card.skills,
            capabilities: card.capabilities,
            available: true,
        }
    }

    /// Placeholder descriptor for an agent whose card could not be
    /// fetched or validated.
    pub fn unavailable(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            base_url: base_url.into(),
            description: String::new(),
            skills: vec![],
            capabilities: AgentCapabilities::default(),
            available: false,
        }
    }

    /// Lowercased specialty vocabulary used by the fallback planner:
    /// skill tags, skill ids/names, and the catalog id.
    pub fn specialty_terms(&self) -> Vec<String> {
        let mut terms = vec![self.id.to_lowercase()];
        for skill in &self.skills {
            terms.push(skill.id.to_lowercase());
            terms.push(skill.name.to_lowercase());
            terms.extend(skill.tags.iter().map(|t| t.to_lowercase()));
        }
        terms.retain(|t| !t.is_empty());
        terms.dedup();
        terms
    }

    /// Keyword match against the specialty vocabulary.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.specialty_terms().iter().any(|term| query.contains(term.as_str()))
    }
}
