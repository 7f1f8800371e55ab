//! Azure-OpenAI-style chat completions client.
//!
//! Implements the [`LlmClient`] port over the deployments REST API:
//! `{endpoint}/openai/deployments/{model}/chat/completions` with an
//! `api-key` header and an `api-version` query parameter.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::errors::LlmError;
use crate::domain::models::LlmSettings;
use crate::domain::ports::LlmClient;

const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Chat-completions client for planning and synthesis prompts.
pub struct AzureChatClient {
    settings: LlmSettings,
    http_client: reqwest::Client,
}

impl AzureChatClient {
    pub fn new(settings: LlmSettings) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_s))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { settings, http_client }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model,
        )
    }
}

#[async_trait]
impl LlmClient for AzureChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if self.settings.endpoint.is_empty() || self.settings.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let body = json!({
            "messages": [{"role": "user", "content": prompt}],
            "temperature": DEFAULT_TEMPERATURE,
            "max_tokens": DEFAULT_MAX_TOKENS,
        });

        let response = self
            .http_client
            .post(self.completions_url())
            .query(&[("api-version", self.settings.api_version.as_str())])
            .header("api-key", &self.settings.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let payload: Value =
            response.json().await.map_err(|e| LlmError::Malformed(e.to_string()))?;
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}
