use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LlmResult;

/// One text-generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    /// Ask the backend to constrain output to a JSON object
    #[serde(default)]
    pub json_output: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Model that actually served the request
    pub model: String,
    pub latency_ms: u64,
}

/// Backend-agnostic interface for narrative generation.
///
/// Implemented by the OpenAI-compatible chat client and the Ollama client;
/// tests substitute scripted providers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> LlmResult<Generation>;

    fn backend_name(&self) -> &'static str;

    fn model(&self) -> &str;
}

/// Which backend serves generation requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Ollama => "http://127.0.0.1:11434",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!("unknown provider {:?} (expected openai or ollama)", other)),
        }
    }
}

/// Local model selection for the Ollama backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProfile {
    #[default]
    Finance,
    General,
}

impl LlmProfile {
    pub fn ollama_model(&self) -> &'static str {
        match self {
            LlmProfile::Finance => "qwen2.5:7b",
            LlmProfile::General => "llama3.1:8b",
        }
    }
}

impl FromStr for LlmProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finance" => Ok(LlmProfile::Finance),
            "general" => Ok(LlmProfile::General),
            other => Err(format!("unknown LLM profile {:?} (expected finance or general)", other)),
        }
    }
}
