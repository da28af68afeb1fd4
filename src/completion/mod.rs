//! Completion-model client over the Ollama generate endpoint.
//!
//! The synthesis stage makes exactly one non-streaming call per query; a
//! failure here is propagated as a typed error by the caller, never patched
//! over with a default answer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default completion model tag
pub const DEFAULT_COMPLETION_MODEL: &str = "qwen2.5:7b-instruct";

/// Request timeout for a single generation call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A text completion service consumed by the synthesis stage
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Model tag reported in error messages and attribution
    fn model_name(&self) -> &str;

    /// Produce a completion for one system/user prompt pair
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Completion client backed by POST /api/generate
#[derive(Debug, Clone)]
pub struct OllamaCompletion {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaCompletion {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Ollama generate request (non-streaming)
#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl CompletionModel for OllamaCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: &self.model,
            system: system_prompt,
            prompt: user_prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach generate endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Generate endpoint returned HTTP {}: {}", status, body);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse generate response")?;

        Ok(parsed.response)
    }
}
