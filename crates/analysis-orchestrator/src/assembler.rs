use analysis_core::{AiReport, AnalysisResult, ForecastResult, MetricSeries};
use chrono::Utc;

/// Identity of the analyzed company as resolved by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyIdentity {
    pub ticker: String,
    pub cik: String,
    pub entity_name: Option<String>,
}

/// Merge the engine outputs into the response unit.
pub fn assemble(
    company: CompanyIdentity,
    metrics: MetricSeries,
    forecast: Option<ForecastResult>,
    report: AiReport,
) -> AnalysisResult {
    let degraded = !report.ai_used && report.degradation_reason.is_some();
    AnalysisResult {
        ticker: company.ticker,
        cik: company.cik,
        entity_name: company.entity_name,
        currency: "USD".to_string(),
        metrics,
        forecast,
        report,
        degraded,
        generated_at: Utc::now(),
    }
}
