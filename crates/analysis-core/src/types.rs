use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{Concept, ValidationError};

/// One reported XBRL value, flattened out of the registry's company-facts
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub concept: Concept,
    /// Raw tag the filer used, e.g. `RevenueFromContractWithCustomerExcludingAssessedTax`
    pub tag: String,
    pub tag_rank: u8,
    pub unit: String,
    pub value: f64,
    /// None for instant (balance sheet) facts
    pub period_start: Option<NaiveDate>,
    pub period_end: NaiveDate,
    /// Fiscal year of the filing the fact was reported in (`fy`)
    pub fiscal_year: Option<i32>,
    /// Fiscal period label of the filing (`fp`: FY, Q1..Q4)
    pub fiscal_period: Option<String>,
    pub form: String,
    pub filed: NaiveDate,
    /// Registry frame label, e.g. `CY2023` or `CY2023Q4I`
    pub frame: Option<String>,
    /// Accession number of the source filing
    pub accession: String,
}

impl Fact {
    pub fn is_instant(&self) -> bool {
        self.period_start.is_none()
    }

    pub fn duration_days(&self) -> Option<i64> {
        self.period_start
            .map(|start| self.period_end.signed_duration_since(start).num_days())
    }

    /// Year of the calendar-year frame, when the fact carries an annual one.
    ///
    /// Durations are framed `CY2023`; year-end instants are framed `CY2023Q4I`.
    /// Quarterly frames (`CY2023Q2`) are not annual and yield None.
    pub fn annual_frame_year(&self) -> Option<i32> {
        let rest = self.frame.as_deref()?.strip_prefix("CY")?;
        let year: i32 = rest.get(..4)?.parse().ok()?;
        match (rest.get(4..)?, self.is_instant()) {
            ("", false) => Some(year),
            ("Q4I", true) => Some(year),
            _ => None,
        }
    }

    /// Whether the fact describes a full fiscal year (or a fiscal year end).
    pub fn is_annual(&self) -> bool {
        if self.annual_frame_year().is_some() {
            return true;
        }
        match self.duration_days() {
            Some(days) => (330..=400).contains(&days),
            None => self.fiscal_period.as_deref() == Some("FY"),
        }
    }

    /// Fiscal year the fact belongs to for normalization purposes.
    pub fn normalized_year(&self) -> i32 {
        self.annual_frame_year()
            .unwrap_or_else(|| self.period_end.year())
    }

    /// Annual report forms (amendments included) rank above quarterlies.
    /// Among annual forms the filed date decides, so a later restatement wins.
    pub fn form_priority(&self) -> u8 {
        match self.form.as_str() {
            "10-K" | "20-F" | "40-F" | "10-KT" | "10-K/A" | "20-F/A" | "40-F/A" | "10-KT/A" => 2,
            "10-Q" | "10-Q/A" => 1,
            _ => 0,
        }
    }
}

/// Raw facts for one company as returned by the ingestion adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyFacts {
    pub ticker: String,
    pub cik: String,
    pub entity_name: Option<String>,
    pub facts: Vec<Fact>,
}

/// Latest annual report text for the text-filing variant of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingDocument {
    pub ticker: String,
    pub cik: String,
    pub accession: String,
    pub form: String,
    pub report_date: Option<String>,
    pub filing_date: Option<String>,
    pub url: String,
    pub text: String,
}

/// Filing metadata returned alongside text-filing analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FilingSummary {
    pub accession: String,
    pub form: String,
    pub report_date: Option<String>,
    pub filing_date: Option<String>,
    pub url: String,
    pub text_chars: usize,
}

impl From<&FilingDocument> for FilingSummary {
    fn from(doc: &FilingDocument) -> Self {
        Self {
            accession: doc.accession.clone(),
            form: doc.form.clone(),
            report_date: doc.report_date.clone(),
            filing_date: doc.filing_date.clone(),
            url: doc.url.clone(),
            text_chars: doc.text.chars().count(),
        }
    }
}

/// Derived metric names. Serialized names are the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    NetIncome,
    OperatingCashFlow,
    Capex,
    StockholdersEquity,
    #[serde(rename = "fcf")]
    FreeCashFlow,
    NetMargin,
    RevenueGrowth,
    Roe,
    GrossProfit,
    OperatingIncome,
    TotalAssets,
    GrossMargin,
    OperatingMargin,
    Roa,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Revenue => "Revenue",
            Metric::NetIncome => "Net Income",
            Metric::OperatingCashFlow => "Operating Cash Flow",
            Metric::Capex => "Capex",
            Metric::StockholdersEquity => "Equity",
            Metric::FreeCashFlow => "FCF",
            Metric::NetMargin => "Net Margin",
            Metric::RevenueGrowth => "Revenue Growth",
            Metric::Roe => "ROE",
            Metric::GrossProfit => "Gross Profit",
            Metric::OperatingIncome => "Operating Income",
            Metric::TotalAssets => "Total Assets",
            Metric::GrossMargin => "Gross Margin",
            Metric::OperatingMargin => "Operating Margin",
            Metric::Roa => "ROA",
        }
    }

    /// Ratios are rendered as percentages, everything else as money.
    pub fn is_ratio(&self) -> bool {
        matches!(
            self,
            Metric::NetMargin
                | Metric::RevenueGrowth
                | Metric::Roe
                | Metric::GrossMargin
                | Metric::OperatingMargin
                | Metric::Roa
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MetricPoint {
    pub fiscal_year: i32,
    pub value: Option<f64>,
}

/// Per-year metric table. Every series has exactly one point per entry of
/// `years`, in the same (ascending) order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MetricSeries {
    pub years: Vec<i32>,
    pub series: BTreeMap<Metric, Vec<MetricPoint>>,
    pub revenue_cagr: Option<f64>,
}

impl MetricSeries {
    pub fn get(&self, metric: Metric) -> Option<&[MetricPoint]> {
        self.series.get(&metric).map(|v| v.as_slice())
    }

    pub fn values(&self, metric: Metric) -> Vec<Option<f64>> {
        self.get(metric)
            .map(|points| points.iter().map(|p| p.value).collect())
            .unwrap_or_default()
    }

    /// Value for the newest year of the window.
    pub fn latest(&self, metric: Metric) -> Option<f64> {
        self.get(metric).and_then(|p| p.last()).and_then(|p| p.value)
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Projection {
    pub fiscal_year: i32,
    pub value: f64,
}

/// Linear revenue projection. A coarse trend, not a statistical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ForecastResult {
    pub method: String,
    pub base_year: i32,
    pub slope: f64,
    pub intercept: f64,
    pub points_used: usize,
    pub projections: Vec<Projection>,
}

/// Why the narrative came from the rule-based fallback instead of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    QuotaExceeded,
    Timeout,
    ProviderError,
    MissingKey,
}

impl DegradationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationReason::QuotaExceeded => "quota_exceeded",
            DegradationReason::Timeout => "timeout",
            DegradationReason::ProviderError => "provider_error",
            DegradationReason::MissingKey => "missing_key",
        }
    }
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AiReport {
    pub executive_summary: String,
    pub key_metrics_commentary: String,
    pub risks_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_drivers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_flags: Option<String>,
    pub ai_used: bool,
    pub degradation_reason: Option<DegradationReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The unit returned to external callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalysisResult {
    pub ticker: String,
    pub cik: String,
    pub entity_name: Option<String>,
    pub currency: String,
    pub metrics: MetricSeries,
    pub forecast: Option<ForecastResult>,
    pub report: AiReport,
    /// True when a provider failure forced the fallback narrative
    pub degraded: bool,
    pub generated_at: DateTime<Utc>,
}

/// Narrative output language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum OutputLanguage {
    #[default]
    En,
    Ja,
}

impl OutputLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLanguage::En => "en",
            OutputLanguage::Ja => "ja",
        }
    }
}

impl FromStr for OutputLanguage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(OutputLanguage::En),
            "ja" => Ok(OutputLanguage::Ja),
            other => Err(ValidationError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Which metric set the calculator emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricProfile {
    #[default]
    Standard,
    /// Adds gross margin, operating margin and return on assets
    Extended,
}

impl FromStr for MetricProfile {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(MetricProfile::Standard),
            "extended" => Ok(MetricProfile::Extended),
            other => Err(ValidationError::InvalidParameter {
                name: "metric_profile",
                reason: format!("unknown profile {:?}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(start: Option<&str>, end: &str, frame: Option<&str>, fp: Option<&str>) -> Fact {
        Fact {
            concept: Concept::Revenue,
            tag: "Revenues".to_string(),
            tag_rank: 0,
            unit: "USD".to_string(),
            value: 1.0,
            period_start: start.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()),
            period_end: NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
            fiscal_year: Some(2023),
            fiscal_period: fp.map(String::from),
            form: "10-K".to_string(),
            filed: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            frame: frame.map(String::from),
            accession: "0000000000-24-000001".to_string(),
        }
    }

    #[test]
    fn test_annual_frame_year_for_duration_and_instant() {
        let duration = fact(Some("2023-01-01"), "2023-12-31", Some("CY2023"), Some("FY"));
        assert_eq!(duration.annual_frame_year(), Some(2023));

        let instant = fact(None, "2023-12-31", Some("CY2023Q4I"), Some("FY"));
        assert_eq!(instant.annual_frame_year(), Some(2023));

        // Instant frame on a duration fact is not an annual frame
        let mismatched = fact(Some("2023-01-01"), "2023-12-31", Some("CY2023Q4I"), None);
        assert_eq!(mismatched.annual_frame_year(), None);

        let quarterly = fact(Some("2023-04-01"), "2023-06-30", Some("CY2023Q2"), Some("Q2"));
        assert_eq!(quarterly.annual_frame_year(), None);
        assert!(!quarterly.is_annual());
    }

    #[test]
    fn test_unframed_fiscal_year_uses_period_end() {
        // Fiscal year ending in September, reported without frame
        let f = fact(Some("2022-09-25"), "2023-09-30", None, Some("FY"));
        assert!(f.is_annual());
        assert_eq!(f.normalized_year(), 2023);
    }

    #[test]
    fn test_form_priority() {
        let mut f = fact(None, "2023-12-31", None, Some("FY"));
        assert_eq!(f.form_priority(), 2);
        f.form = "10-K/A".to_string();
        assert_eq!(f.form_priority(), 2);
        f.form = "20-F/A".to_string();
        assert_eq!(f.form_priority(), 2);
        f.form = "10-Q".to_string();
        assert_eq!(f.form_priority(), 1);
        f.form = "8-K".to_string();
        assert_eq!(f.form_priority(), 0);
    }

    #[test]
    fn test_metric_serialized_names() {
        assert_eq!(serde_json::to_string(&Metric::FreeCashFlow).unwrap(), "\"fcf\"");
        assert_eq!(serde_json::to_string(&Metric::NetMargin).unwrap(), "\"net_margin\"");
        assert_eq!(
            serde_json::to_string(&DegradationReason::QuotaExceeded).unwrap(),
            "\"quota_exceeded\""
        );
    }

    #[test]
    fn test_output_language_parse() {
        assert_eq!("JA".parse::<OutputLanguage>().unwrap(), OutputLanguage::Ja);
        assert_eq!(" en ".parse::<OutputLanguage>().unwrap(), OutputLanguage::En);
        assert!(matches!(
            "fr".parse::<OutputLanguage>(),
            Err(ValidationError::UnsupportedLanguage(_))
        ));
    }
}
