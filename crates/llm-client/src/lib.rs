//! Text-generation backends used for narrative reports.

pub mod error;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use error::{LlmError, LlmResult};
pub use ollama::OllamaProvider;
pub use openai::{OpenAiProvider, DEFAULT_OPENAI_MODEL};
pub use provider::{Generation, GenerationProvider, GenerationRequest, LlmProfile, ProviderKind};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Settings needed to build a provider.
#[derive(Clone)]
pub struct LlmConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub profile: LlmProfile,
    pub timeout: Duration,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("kind", &self.kind)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("profile", &self.profile)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlmConfig {
    /// Model the configured backend will request.
    pub fn resolved_model(&self) -> String {
        match (&self.model, self.kind) {
            (Some(model), _) => model.clone(),
            (None, ProviderKind::OpenAi) => DEFAULT_OPENAI_MODEL.to_string(),
            (None, ProviderKind::Ollama) => self.profile.ollama_model().to_string(),
        }
    }
}

/// Build the configured backend.
pub fn build_provider(config: &LlmConfig) -> LlmResult<Arc<dyn GenerationProvider>> {
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| config.kind.default_base_url().to_string());
    let model = config.resolved_model();

    tracing::info!("LLM provider: {} (model {}, base {})", config.kind, model, base_url);

    Ok(match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(&config.api_key, base_url, model, config.timeout)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(base_url, model, config.timeout)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: ProviderKind) -> LlmConfig {
        LlmConfig {
            kind,
            api_key: "sk-test".to_string(),
            base_url: None,
            model: None,
            profile: LlmProfile::General,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_resolved_model_defaults() {
        assert_eq!(config(ProviderKind::OpenAi).resolved_model(), "gpt-4o-mini");
        assert_eq!(config(ProviderKind::Ollama).resolved_model(), "llama3.1:8b");

        let mut explicit = config(ProviderKind::Ollama);
        explicit.model = Some("mistral".to_string());
        assert_eq!(explicit.resolved_model(), "mistral");
    }

    #[test]
    fn test_build_provider_selects_backend() {
        let provider = build_provider(&config(ProviderKind::Ollama)).unwrap();
        assert_eq!(provider.backend_name(), "ollama");
        let provider = build_provider(&config(ProviderKind::OpenAi)).unwrap();
        assert_eq!(provider.backend_name(), "openai");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_debug_hides_credential() {
        let rendered = format!("{:?}", config(ProviderKind::OpenAi));
        assert!(!rendered.contains("sk-test"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert!("anthropic".parse::<ProviderKind>().is_err());
        assert!("quant".parse::<LlmProfile>().is_err());
    }
}
