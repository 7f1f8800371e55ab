//! Agent catalog: discovery cache over the configured endpoints.
//!
//! Cards are fetched once and cached for the process lifetime;
//! `refresh` re-fetches on demand under a single writer. An endpoint
//! whose card cannot be fetched or fails validation stays in the
//! catalog marked unavailable, so the planner can skip it and `health`
//! can still report it.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::models::{AgentDescriptor, AgentEndpoint};
use crate::domain::ports::AgentTransport;

/// Read-mostly discovery cache, in catalog declaration order.
pub struct AgentCatalog {
    endpoints: Vec<AgentEndpoint>,
    transport: Arc<dyn AgentTransport>,
    agents: RwLock<Option<Vec<AgentDescriptor>>>,
}

impl AgentCatalog {
    pub fn new(endpoints: Vec<AgentEndpoint>, transport: Arc<dyn AgentTransport>) -> Self {
        Self { endpoints, transport, agents: RwLock::new(None) }
    }

    /// Number of configured endpoints (available or not).
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Re-fetch every agent card, replacing the cache.
    pub async fn refresh(&self) -> Vec<AgentDescriptor> {
        // Take the write lock for the whole refresh so concurrent
        // readers never observe a partially rebuilt catalog.
        let mut cache = self.agents.write().await;

        let fetches = self.endpoints.iter().map(|endpoint| {
            let transport = Arc::clone(&self.transport);
            async move {
                match transport.fetch_card(&endpoint.base_url).await {
                    Ok(card) => {
                        tracing::info!(agent = %endpoint.id, url = %endpoint.base_url, "discovered agent");
                        AgentDescriptor::from_card(&endpoint.id, &endpoint.base_url, card)
                    }
                    Err(err) => {
                        tracing::warn!(
                            agent = %endpoint.id,
                            url = %endpoint.base_url,
                            error = %err,
                            "agent discovery failed; marking unavailable"
                        );
                        AgentDescriptor::unavailable(&endpoint.id, &endpoint.base_url)
                    }
                }
            }
        });

        let descriptors = futures::future::join_all(fetches).await;
        *cache = Some(descriptors.clone());
        descriptors
    }

    /// Cached descriptors, discovering lazily on first use.
    pub async fn agents(&self) -> Vec<AgentDescriptor> {
        {
            let cache = self.agents.read().await;
            if let Some(ref agents) = *cache {
                return agents.clone();
            }
        }
        self.refresh().await
    }

    /// Available descriptors only, in declaration order.
    pub async fn available_agents(&self) -> Vec<AgentDescriptor> {
        self.agents().await.into_iter().filter(|a| a.available).collect()
    }

    /// Look up one agent by catalog id.
    pub async fn get(&self, id: &str) -> Option<AgentDescriptor> {
        self.agents().await.into_iter().find(|a| a.id == id)
    }

    /// Whether the catalog knows this id (available or not).
    pub async fn contains(&self, id: &str) -> bool {
        self.get(id).await.is_some()
    }
}
