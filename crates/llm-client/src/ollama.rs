//! Local Ollama backend (`/api/generate`, non-streaming).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{LlmError, LlmResult};
use crate::provider::{Generation, GenerationProvider, GenerationRequest};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    model: Option<String>,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaProvider {
    async fn generate(&self, request: &GenerationRequest) -> LlmResult<Generation> {
        let start = Instant::now();
        let url = format!("{}/api/generate", self.base_url);
        tracing::debug!("Calling Ollama with model={}", self.model);

        let body = GenerateRequest {
            model: &self.model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            format: request.json_output.then_some("json"),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("ollama generate: {}", e)))?;
        if parsed.response.trim().is_empty() {
            return Err(LlmError::InvalidResponse("empty generation".to_string()));
        }

        Ok(Generation {
            text: parsed.response,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn backend_name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
