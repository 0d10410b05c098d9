//! Provider call with graceful degradation.
//!
//! Exactly one provider call per report, bounded by a timeout. Any provider
//! failure turns into a rule-based report tagged with a
//! [`DegradationReason`]; it never fails the request.

use analysis_core::text::truncate_chars;
use analysis_core::{AiReport, DegradationReason};
use llm_client::{GenerationProvider, LlmError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::narrative::{rule_based, Narrative};
use crate::prompt::{build_request, ReportInput};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);
/// Unparsable replies are kept verbatim up to this many characters.
pub const MAX_RAW_SUMMARY_CHARS: usize = 600;

pub struct AiOrchestrator {
    provider: Option<Arc<dyn GenerationProvider>>,
    timeout: Duration,
}

impl AiOrchestrator {
    pub fn new(provider: Option<Arc<dyn GenerationProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.backend_name())
    }

    /// Report written by the provider, or the rule-based fallback with the
    /// reason the provider could not be used.
    pub async fn generate_report(&self, input: &ReportInput<'_>) -> AiReport {
        let Some(provider) = &self.provider else {
            tracing::warn!("AI degraded for {}: no provider configured", input.ticker);
            return degraded(input, DegradationReason::MissingKey, None);
        };

        let request = build_request(input);
        tracing::debug!("Prompt for {}: {} chars", input.ticker, request.prompt.chars().count());

        let outcome = match tokio::time::timeout(self.timeout, provider.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout),
        };

        match outcome {
            Ok(generation) => {
                tracing::info!(
                    "AI report for {} from {} ({}) in {}ms",
                    input.ticker,
                    provider.backend_name(),
                    generation.model,
                    generation.latency_ms
                );
                let mut report = from_reply(&generation.text, input);
                report.provider = Some(provider.backend_name().to_string());
                report.model = Some(generation.model);
                report
            }
            Err(e) => {
                let reason = degradation_reason(&e);
                tracing::warn!("AI degraded for {} ({}): {}", input.ticker, reason, e);
                degraded(input, reason, Some(provider.as_ref()))
            }
        }
    }

    /// Rule-based report without touching the provider (AI switched off by
    /// the caller). Not a degradation.
    pub fn rule_based_report(&self, input: &ReportInput<'_>) -> AiReport {
        to_report(rule_based(input), false, None)
    }
}

pub fn degradation_reason(error: &LlmError) -> DegradationReason {
    match error {
        LlmError::QuotaExceeded { .. } => DegradationReason::QuotaExceeded,
        LlmError::Timeout => DegradationReason::Timeout,
        LlmError::Unauthorized(_)
        | LlmError::Http { .. }
        | LlmError::Transport(_)
        | LlmError::InvalidResponse(_) => DegradationReason::ProviderError,
    }
}

fn to_report(narrative: Narrative, ai_used: bool, reason: Option<DegradationReason>) -> AiReport {
    AiReport {
        executive_summary: narrative.executive_summary,
        key_metrics_commentary: narrative.key_metrics_commentary,
        risks_summary: narrative.risks_summary,
        growth_drivers: Some(narrative.growth_drivers),
        red_flags: Some(narrative.red_flags),
        ai_used,
        degradation_reason: reason,
        provider: None,
        model: None,
    }
}

fn degraded(
    input: &ReportInput<'_>,
    reason: DegradationReason,
    provider: Option<&dyn GenerationProvider>,
) -> AiReport {
    let mut report = to_report(rule_based(input), false, Some(reason));
    if let Some(provider) = provider {
        report.provider = Some(provider.backend_name().to_string());
        report.model = Some(provider.model().to_string());
    }
    report
}

/// Section text from a JSON value: strings as-is, lists one item per line.
fn section_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| section_text(Some(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// The JSON object between the first `{` and the last `}` of the reply.
fn reply_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Build a report from a provider reply. Sections the provider left out are
/// filled from the rule-based narrative; a reply with no usable JSON keeps
/// its raw text as the executive summary.
fn from_reply(text: &str, input: &ReportInput<'_>) -> AiReport {
    let fallback = rule_based(input);

    let Some(object) = reply_object(text).filter(|o| section_text(o.get("executive_summary")).is_some()) else {
        tracing::warn!("Provider reply for {} is not the expected JSON, keeping raw text", input.ticker);
        return to_report(
            Narrative {
                executive_summary: truncate_chars(text.trim(), MAX_RAW_SUMMARY_CHARS).to_string(),
                ..fallback
            },
            true,
            None,
        );
    };

    let field = |key: &str, default: String| section_text(object.get(key)).unwrap_or(default);
    to_report(
        Narrative {
            executive_summary: field("executive_summary", String::new()),
            key_metrics_commentary: field("key_metrics_commentary", fallback.key_metrics_commentary),
            risks_summary: field("risks_summary", fallback.risks_summary),
            growth_drivers: field("growth_drivers", fallback.growth_drivers),
            red_flags: field("red_flags", fallback.red_flags),
        },
        true,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Metric, MetricPoint, MetricSeries, OutputLanguage};
    use async_trait::async_trait;
    use llm_client::{Generation, GenerationRequest, LlmResult};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    enum Script {
        Reply(&'static str),
        Fail(fn() -> LlmError),
        Hang,
    }

    struct ScriptedProvider {
        script: Script,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        async fn generate(&self, request: &GenerationRequest) -> LlmResult<Generation> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            match &self.script {
                Script::Reply(text) => Ok(Generation {
                    text: text.to_string(),
                    model: "scripted-1".to_string(),
                    latency_ms: 1,
                }),
                Script::Fail(make) => Err(make()),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("timeout fires first")
                }
            }
        }

        fn backend_name(&self) -> &'static str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }
    }

    fn metrics() -> MetricSeries {
        let mut series = BTreeMap::new();
        series.insert(
            Metric::Revenue,
            vec![
                MetricPoint { fiscal_year: 2022, value: Some(100.0) },
                MetricPoint { fiscal_year: 2023, value: Some(110.0) },
            ],
        );
        MetricSeries {
            years: vec![2022, 2023],
            series,
            revenue_cagr: Some(0.1),
        }
    }

    fn input(metrics: &MetricSeries) -> ReportInput<'_> {
        ReportInput {
            ticker: "ACME",
            entity_name: None,
            question: Some("How is growth?"),
            metrics,
            forecast: None,
            filing_excerpt: None,
            lang: OutputLanguage::En,
        }
    }

    fn orchestrator(provider: Arc<ScriptedProvider>, timeout: Duration) -> AiOrchestrator {
        AiOrchestrator::new(Some(provider as Arc<dyn GenerationProvider>), timeout)
    }

    #[tokio::test]
    async fn test_success_uses_provider_sections() {
        let provider = ScriptedProvider::new(Script::Reply(
            "Here you go:\n```json\n{\"executive_summary\": \"Strong year.\", \"key_metrics_commentary\": \"Margins up.\", \
             \"risks_summary\": \"FX.\", \"growth_drivers\": [\"Services\", \"Wearables\"], \"red_flags\": null}\n```",
        ));
        let m = metrics();
        let report = orchestrator(provider.clone(), DEFAULT_PROVIDER_TIMEOUT)
            .generate_report(&input(&m))
            .await;

        assert!(report.ai_used);
        assert_eq!(report.degradation_reason, None);
        assert_eq!(report.executive_summary, "Strong year.");
        assert_eq!(report.growth_drivers.as_deref(), Some("Services\nWearables"));
        // Null section falls back to the rule-based text
        assert!(report.red_flags.is_some_and(|r| !r.is_empty()));
        assert_eq!(report.provider.as_deref(), Some("scripted"));
        assert_eq!(report.model.as_deref(), Some("scripted-1"));

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("How is growth?"));
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_still_success() {
        let long = "plain prose ".repeat(100);
        let leaked: &'static str = Box::leak(long.into_boxed_str());
        let provider = ScriptedProvider::new(Script::Reply(leaked));
        let m = metrics();
        let report = orchestrator(provider, DEFAULT_PROVIDER_TIMEOUT)
            .generate_report(&input(&m))
            .await;

        assert!(report.ai_used);
        assert_eq!(report.degradation_reason, None);
        assert_eq!(report.executive_summary.chars().count(), MAX_RAW_SUMMARY_CHARS);
        assert!(report.executive_summary.starts_with("plain prose"));
    }

    #[tokio::test]
    async fn test_quota_exceeded_degrades() {
        let provider = ScriptedProvider::new(Script::Fail(|| LlmError::QuotaExceeded {
            status: 429,
            body: "insufficient_quota".to_string(),
        }));
        let m = metrics();
        let report = orchestrator(provider, DEFAULT_PROVIDER_TIMEOUT)
            .generate_report(&input(&m))
            .await;

        assert!(!report.ai_used);
        assert_eq!(report.degradation_reason, Some(DegradationReason::QuotaExceeded));
        assert!(!report.executive_summary.is_empty());
        assert_eq!(report.provider.as_deref(), Some("scripted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_times_out() {
        let provider = ScriptedProvider::new(Script::Hang);
        let m = metrics();
        let report = orchestrator(provider, Duration::from_secs(120))
            .generate_report(&input(&m))
            .await;

        assert!(!report.ai_used);
        assert_eq!(report.degradation_reason, Some(DegradationReason::Timeout));
        assert!(!report.executive_summary.is_empty());
    }

    #[tokio::test]
    async fn test_other_failures_are_provider_errors() {
        for make in [
            (|| LlmError::Unauthorized(401)) as fn() -> LlmError,
            || LlmError::Http { status: 500, body: String::new() },
            || LlmError::Transport("connection refused".to_string()),
            || LlmError::InvalidResponse("no content".to_string()),
        ] {
            let provider = ScriptedProvider::new(Script::Fail(make));
            let m = metrics();
            let report = orchestrator(provider, DEFAULT_PROVIDER_TIMEOUT)
                .generate_report(&input(&m))
                .await;
            assert_eq!(report.degradation_reason, Some(DegradationReason::ProviderError));
            assert!(!report.ai_used);
        }
    }

    #[tokio::test]
    async fn test_missing_provider_is_missing_key() {
        let m = metrics();
        let report = AiOrchestrator::new(None, DEFAULT_PROVIDER_TIMEOUT)
            .generate_report(&input(&m))
            .await;
        assert_eq!(report.degradation_reason, Some(DegradationReason::MissingKey));
        assert_eq!(report.provider, None);
    }

    #[test]
    fn test_rule_based_report_is_not_degraded() {
        let m = metrics();
        let report = AiOrchestrator::new(None, DEFAULT_PROVIDER_TIMEOUT).rule_based_report(&input(&m));
        assert!(!report.ai_used);
        assert_eq!(report.degradation_reason, None);
    }
}
