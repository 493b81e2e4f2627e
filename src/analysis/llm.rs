use crate::config::LlmSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for an Ollama-compatible generation endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl LlmClient {
    pub fn new(settings: &LlmSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model_name.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// One non-streaming completion.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "llm generate");
        let response: GenerateResponse = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.temperature,
                    num_predict: self.max_tokens,
                },
            })
            .send()
            .await
            .context("Error reaching the LLM endpoint")?
            .error_for_status()
            .context("LLM endpoint returned an error status")?
            .json()
            .await
            .context("Error decoding LLM response")?;
        Ok(response.response)
    }

    pub async fn available_models(&self) -> Result<Vec<String>> {
        let response: TagsResponse = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .context("Error listing LLM models")?
            .error_for_status()
            .context("LLM model listing returned an error status")?
            .json()
            .await
            .context("Error decoding LLM model listing")?;
        Ok(response.models.into_iter().map(|m| m.name).collect())
    }

    pub async fn is_available(&self) -> bool {
        self.available_models().await.is_ok()
    }
}
