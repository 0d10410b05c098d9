//! End-to-end analysis pipeline: registry facts → normalized table →
//! metrics → {forecast, narrative} → [`AnalysisResult`].

use analysis_core::text::truncate_chars;
use analysis_core::{
    AnalysisError, AnalysisResult, FactSource, FilingDocument, FilingSource, FilingSummary, MetricProfile,
    MetricSeries, OutputLanguage,
};
use fundamental_analysis::{compute_metrics, normalize, project_revenue, DEFAULT_HORIZON};
use sec_client::extract_risk_section;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod ai;
pub mod assembler;
pub mod format;
pub mod narrative;
pub mod prompt;

pub use ai::{AiOrchestrator, DEFAULT_PROVIDER_TIMEOUT};
pub use assembler::{assemble, CompanyIdentity};
pub use prompt::{ReportInput, MAX_FILING_EXCERPT_CHARS};

/// Characters of filing text returned by the filing preview.
const PREVIEW_CHARS: usize = 5_000;

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub metric_profile: MetricProfile,
    pub forecast_horizon: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            metric_profile: MetricProfile::Standard,
            forecast_horizon: DEFAULT_HORIZON,
        }
    }
}

/// Data source for `/ask`: XBRL metrics only, or metrics plus the annual
/// report's risk factors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AskMode {
    #[default]
    #[serde(rename = "xbrl")]
    Xbrl,
    #[serde(rename = "10k")]
    TenK,
}

impl AskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AskMode::Xbrl => "xbrl",
            AskMode::TenK => "10k",
        }
    }
}

impl fmt::Display for AskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AskMode {
    type Err = analysis_core::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xbrl" => Ok(AskMode::Xbrl),
            "10k" | "10-k" => Ok(AskMode::TenK),
            other => Err(analysis_core::ValidationError::InvalidParameter {
                name: "mode",
                reason: format!("unknown mode {:?} (expected xbrl or 10k)", other),
            }),
        }
    }
}

/// One validated analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub years: usize,
    pub lang: OutputLanguage,
    /// None uses the configured default
    pub horizon: Option<usize>,
    pub question: Option<String>,
    pub use_ai: bool,
}

impl AnalysisRequest {
    pub fn new(ticker: impl Into<String>, years: usize) -> Self {
        Self {
            ticker: ticker.into(),
            years,
            lang: OutputLanguage::default(),
            horizon: None,
            question: None,
            use_ai: true,
        }
    }
}

/// Metrics without narrative.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyMetrics {
    pub ticker: String,
    pub cik: String,
    pub entity_name: Option<String>,
    pub metrics: MetricSeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilingPreview {
    pub ticker: String,
    pub cik: String,
    pub filing: FilingSummary,
    pub excerpt: String,
    pub risk_excerpt: String,
}

#[derive(Debug, Clone)]
pub struct FilingAnalysis {
    pub analysis: AnalysisResult,
    pub filing: FilingSummary,
}

#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub analysis: AnalysisResult,
    /// Present in `10k` mode
    pub filing: Option<FilingSummary>,
}

pub struct AnalysisOrchestrator {
    facts: Arc<dyn FactSource>,
    filings: Arc<dyn FilingSource>,
    ai: AiOrchestrator,
    settings: PipelineSettings,
}

impl AnalysisOrchestrator {
    pub fn new(
        facts: Arc<dyn FactSource>,
        filings: Arc<dyn FilingSource>,
        ai: AiOrchestrator,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            facts,
            filings,
            ai,
            settings,
        }
    }

    pub fn ai(&self) -> &AiOrchestrator {
        &self.ai
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    async fn load_metrics(&self, ticker: &str, years: usize) -> Result<(CompanyIdentity, MetricSeries), AnalysisError> {
        let company = self.facts.company_facts(ticker).await?;
        let table = normalize(&company, years)?;
        let metrics = compute_metrics(&table, self.settings.metric_profile);

        tracing::info!(
            "{}: {} selected facts over FY{}-FY{}",
            company.ticker,
            table.len(),
            metrics.years.first().copied().unwrap_or_default(),
            metrics.years.last().copied().unwrap_or_default()
        );

        let identity = CompanyIdentity {
            ticker: company.ticker,
            cik: company.cik,
            entity_name: company.entity_name,
        };
        Ok((identity, metrics))
    }

    /// Normalized metric series for the most recent `years` fiscal years.
    pub async fn metrics_only(&self, ticker: &str, years: usize) -> Result<CompanyMetrics, AnalysisError> {
        let (company, metrics) = self.load_metrics(ticker, years).await?;
        Ok(CompanyMetrics {
            ticker: company.ticker,
            cik: company.cik,
            entity_name: company.entity_name,
            metrics,
        })
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        company: CompanyIdentity,
        metrics: MetricSeries,
        filing_excerpt: Option<&str>,
    ) -> AnalysisResult {
        let horizon = request.horizon.unwrap_or(self.settings.forecast_horizon);
        let forecast = project_revenue(&metrics, horizon);

        let input = ReportInput {
            ticker: &company.ticker,
            entity_name: company.entity_name.as_deref(),
            question: request.question.as_deref(),
            metrics: &metrics,
            forecast: forecast.as_ref(),
            filing_excerpt,
            lang: request.lang,
        };
        let report = if request.use_ai {
            self.ai.generate_report(&input).await
        } else {
            self.ai.rule_based_report(&input)
        };

        assemble(company, metrics, forecast, report)
    }

    /// Full XBRL analysis with narrative. Provider failures degrade the
    /// narrative; only registry and data errors fail the call.
    pub async fn analyze_xbrl(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let (company, metrics) = self.load_metrics(&request.ticker, request.years).await?;
        let result = self.run(request, company, metrics, None).await;
        if result.degraded {
            tracing::warn!(
                "Analysis for {} served degraded ({:?})",
                result.ticker,
                result.report.degradation_reason
            );
        }
        Ok(result)
    }

    /// Latest annual report: metadata, the opening text and the risk factor
    /// section.
    pub async fn latest_filing(&self, ticker: &str) -> Result<FilingPreview, AnalysisError> {
        let doc = self.filings.latest_annual_filing(ticker).await?;
        Ok(FilingPreview {
            filing: FilingSummary::from(&doc),
            excerpt: truncate_chars(&doc.text, PREVIEW_CHARS).to_string(),
            risk_excerpt: risk_excerpt(&doc).to_string(),
            ticker: doc.ticker,
            cik: doc.cik,
        })
    }

    /// Analysis whose narrative also draws on the annual report's risk
    /// factors.
    pub async fn analyze_filing(&self, request: &AnalysisRequest) -> Result<FilingAnalysis, AnalysisError> {
        let (metrics, filing) = tokio::join!(
            self.load_metrics(&request.ticker, request.years),
            self.filings.latest_annual_filing(&request.ticker)
        );
        let (company, metrics) = metrics?;
        let doc = filing?;

        let analysis = self.run(request, company, metrics, Some(risk_excerpt(&doc))).await;
        Ok(FilingAnalysis {
            analysis,
            filing: FilingSummary::from(&doc),
        })
    }

    /// Answer a free-form question from the chosen data source.
    pub async fn ask(&self, request: &AnalysisRequest, mode: AskMode) -> Result<AskOutcome, AnalysisError> {
        tracing::info!("Ask {} ({} mode, use_ai={})", request.ticker, mode, request.use_ai);
        Ok(match mode {
            AskMode::Xbrl => AskOutcome {
                analysis: self.analyze_xbrl(request).await?,
                filing: None,
            },
            AskMode::TenK => {
                let FilingAnalysis { analysis, filing } = self.analyze_filing(request).await?;
                AskOutcome {
                    analysis,
                    filing: Some(filing),
                }
            }
        })
    }
}

fn risk_excerpt(doc: &FilingDocument) -> &str {
    truncate_chars(extract_risk_section(&doc.text), MAX_FILING_EXCERPT_CHARS)
}
