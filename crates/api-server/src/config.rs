use analysis_core::validate::MAX_HORIZON;
use analysis_core::{MetricProfile, OutputLanguage};
use llm_client::{LlmConfig, LlmProfile, ProviderKind};
use sec_client::SecClientConfig;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration, read once at startup. Nothing reads the
/// environment after this is built.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub sec: SecClientConfig,
    pub output_lang: OutputLanguage,
    pub metric_profile: MetricProfile,
    pub forecast_horizon: usize,
    pub bind_addr: SocketAddr,
    /// Send Strict-Transport-Security (only behind TLS termination)
    pub enable_hsts: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let forecast_horizon: usize = parse_or(&get, "FORECAST_HORIZON", 1)?;
        if forecast_horizon == 0 || forecast_horizon > MAX_HORIZON as usize {
            return Err(ConfigError::Invalid {
                name: "FORECAST_HORIZON",
                value: forecast_horizon.to_string(),
                reason: format!("must be between 1 and {}", MAX_HORIZON),
            });
        }

        let requests_per_second: usize = parse_or(&get, "SEC_RATE_LIMIT", 10)?;
        if requests_per_second == 0 {
            return Err(ConfigError::Invalid {
                name: "SEC_RATE_LIMIT",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let timeout_secs: u64 = parse_or(&get, "LLM_TIMEOUT_SECS", 120)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "LLM_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let sec_defaults = SecClientConfig::default();
        let sec = SecClientConfig {
            user_agent: get("SEC_USER_AGENT").unwrap_or(sec_defaults.user_agent),
            data_base_url: get("SEC_DATA_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(sec_defaults.data_base_url),
            www_base_url: get("SEC_WWW_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(sec_defaults.www_base_url),
            requests_per_second,
            cache_ttl: Duration::from_secs(parse_or(&get, "FACTS_CACHE_TTL_SECS", 86_400)?),
            ..sec_defaults
        };

        let llm = LlmConfig {
            kind: parse_or(&get, "LLM_PROVIDER", ProviderKind::default())?,
            api_key,
            base_url: get("LLM_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            model: get("LLM_MODEL"),
            profile: parse_or(&get, "LLM_PROFILE", LlmProfile::default())?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let enable_hsts = get("ENABLE_HSTS")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Ok(Self {
            llm,
            sec,
            output_lang: parse_or(&get, "OUTPUT_LANG", OutputLanguage::default())?,
            metric_profile: parse_or(&get, "METRIC_PROFILE", MetricProfile::default())?,
            forecast_horizon,
            bind_addr: parse_or(&get, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 8000)))?,
            enable_hsts,
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_missing_key_is_fatal() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("OPENAI_API_KEY"));
        assert_eq!(
            load(&[("OPENAI_API_KEY", "   ")]).unwrap_err(),
            ConfigError::Missing("OPENAI_API_KEY")
        );
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("OPENAI_API_KEY", "sk-live")]).unwrap();
        assert_eq!(config.llm.kind, ProviderKind::OpenAi);
        assert_eq!(config.llm.api_key, "sk-live");
        assert_eq!(config.llm.timeout, Duration::from_secs(120));
        assert_eq!(config.output_lang, OutputLanguage::En);
        assert_eq!(config.metric_profile, MetricProfile::Standard);
        assert_eq!(config.forecast_horizon, 1);
        assert_eq!(config.sec.requests_per_second, 10);
        assert_eq!(config.sec.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.sec.data_base_url, "https://data.sec.gov");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8000");
        assert!(!config.enable_hsts);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("OPENAI_API_KEY", "sk-live"),
            ("LLM_PROVIDER", "ollama"),
            ("LLM_PROFILE", "general"),
            ("OUTPUT_LANG", "JA"),
            ("METRIC_PROFILE", "extended"),
            ("FORECAST_HORIZON", "3"),
            ("FACTS_CACHE_TTL_SECS", "0"),
            ("SEC_DATA_BASE_URL", "http://localhost:9000/"),
            ("BIND_ADDR", "0.0.0.0:9100"),
            ("ENABLE_HSTS", "true"),
        ])
        .unwrap();
        assert_eq!(config.llm.kind, ProviderKind::Ollama);
        assert_eq!(config.llm.profile, LlmProfile::General);
        assert_eq!(config.output_lang, OutputLanguage::Ja);
        assert_eq!(config.metric_profile, MetricProfile::Extended);
        assert_eq!(config.forecast_horizon, 3);
        assert!(config.sec.cache_ttl.is_zero());
        assert_eq!(config.sec.data_base_url, "http://localhost:9000");
        assert_eq!(config.bind_addr.port(), 9100);
        assert!(config.enable_hsts);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let key = ("OPENAI_API_KEY", "sk-live");
        for bad in [
            ("OUTPUT_LANG", "fr"),
            ("LLM_PROVIDER", "anthropic"),
            ("FORECAST_HORIZON", "9"),
            ("FORECAST_HORIZON", "zero"),
            ("SEC_RATE_LIMIT", "0"),
            ("LLM_TIMEOUT_SECS", "0"),
            ("BIND_ADDR", "localhost"),
        ] {
            let err = load(&[key, bad]).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { name, .. } if name == bad.0),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
