// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text generation over an OpenAI-compatible chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use herald_config::model::ScorerConfig;
use herald_core::{GenerationOptions, HeraldError, TextGenerator};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Client for `POST {endpoint}/chat/completions` (OpenAI, Ollama, and the like).
pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, HeraldError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeraldError::Scorer(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    /// Build from `[scorer]`. The key comes from `api_key`, else from the
    /// environment variable named by `api_key_env`.
    pub fn from_config(config: &ScorerConfig) -> Result<Self, HeraldError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| {
                config
                    .api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
            })
            .filter(|key| !key.is_empty())
            .map(SecretString::from);
        Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, HeraldError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| HeraldError::Scorer(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(256).collect();
            return Err(HeraldError::Scorer(format!("{url} returned {status}: {excerpt}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| HeraldError::Scorer(format!("malformed completion response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| HeraldError::Scorer("completion response has no content".to_string()))?;
        debug!(model = %self.model, chars = content.len(), "completion received");
        Ok(content)
    }
}
