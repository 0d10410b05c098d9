//! Prompt construction for narrative generation.

use analysis_core::text::truncate_chars;
use analysis_core::{ForecastResult, Metric, MetricSeries, OutputLanguage};
use llm_client::GenerationRequest;
use std::fmt::Write;

use crate::format::{pct, usd};

/// Upper bound on the context block sent to the provider.
pub const MAX_CONTEXT_CHARS: usize = 6_000;
/// Upper bound on the filing excerpt embedded in the context.
pub const MAX_FILING_EXCERPT_CHARS: usize = 3_000;

pub const TRUNCATION_MARKER: &str = "[context truncated]";
pub const EMPTY_METRICS_NOTE: &str = "No metric data available.";

const DEFAULT_QUESTION: &str =
    "Assess the company's recent financial performance, profitability, cash generation and growth outlook.";

/// Inputs for one narrative.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub ticker: &'a str,
    pub entity_name: Option<&'a str>,
    pub question: Option<&'a str>,
    pub metrics: &'a MetricSeries,
    pub forecast: Option<&'a ForecastResult>,
    /// Risk-factor text of the latest annual report (text-filing variant)
    pub filing_excerpt: Option<&'a str>,
    pub lang: OutputLanguage,
}

fn cell(metric: Metric, value: Option<f64>) -> String {
    match value {
        Some(v) if metric.is_ratio() => pct(v),
        Some(v) => usd(v),
        None => "n/a".to_string(),
    }
}

/// Per-year table: one row per metric, one column per fiscal year.
pub fn render_metrics_table(metrics: &MetricSeries) -> String {
    if metrics.is_empty() || metrics.series.is_empty() {
        return EMPTY_METRICS_NOTE.to_string();
    }

    let mut out = String::from("Metric");
    for year in &metrics.years {
        let _ = write!(out, " | FY{}", year);
    }
    out.push('\n');

    for (metric, points) in &metrics.series {
        out.push_str(metric.label());
        for point in points {
            let _ = write!(out, " | {}", cell(*metric, point.value));
        }
        out.push('\n');
    }

    let cagr = metrics.revenue_cagr.map(pct).unwrap_or_else(|| "n/a".to_string());
    match (metrics.years.first(), metrics.years.last()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(out, "Revenue CAGR (FY{}-FY{}): {}", first, last, cagr);
        }
        _ => {
            let _ = writeln!(out, "Revenue CAGR: {}", cagr);
        }
    }
    out
}

fn render_forecast(forecast: Option<&ForecastResult>) -> String {
    let Some(forecast) = forecast else {
        return "Revenue projection: n/a (fewer than two revenue points)".to_string();
    };
    let projections: Vec<String> = forecast
        .projections
        .iter()
        .map(|p| format!("FY{} {}", p.fiscal_year, usd(p.value)))
        .collect();
    format!(
        "Revenue projection ({} trend over {} points): {}",
        forecast.method,
        forecast.points_used,
        projections.join(", ")
    )
}

/// Context block: metric table, CAGR and projection lines, optional filing
/// excerpt. Bounded by [`MAX_CONTEXT_CHARS`].
pub fn build_context(input: &ReportInput<'_>) -> String {
    let mut context = format!(
        "Company: {} ({})\nAll amounts in USD, fiscal years from annual XBRL filings.\n\n",
        input.entity_name.unwrap_or(input.ticker),
        input.ticker
    );
    context.push_str(&render_metrics_table(input.metrics));
    context.push_str(&render_forecast(input.forecast));
    context.push('\n');

    if let Some(excerpt) = input.filing_excerpt {
        let excerpt = truncate_chars(excerpt.trim(), MAX_FILING_EXCERPT_CHARS);
        if !excerpt.is_empty() {
            context.push_str("\nRisk factors excerpt from the latest annual report:\n");
            context.push_str(excerpt);
            context.push('\n');
        }
    }

    bound_context(context)
}

fn bound_context(context: String) -> String {
    if context.chars().count() <= MAX_CONTEXT_CHARS {
        return context;
    }
    // Room for the newline and the marker
    let keep = MAX_CONTEXT_CHARS - TRUNCATION_MARKER.chars().count() - 1;
    format!("{}\n{}", truncate_chars(&context, keep), TRUNCATION_MARKER)
}

fn language_instruction(lang: OutputLanguage) -> &'static str {
    match lang {
        OutputLanguage::En => "Write every value in English.",
        OutputLanguage::Ja => "Write every value in Japanese (日本語で回答してください).",
    }
}

const SYSTEM_PROMPT: &str = "You are a senior equity analyst. Base every statement on the \
provided figures and excerpts; do not invent numbers. Respond with a single JSON object with \
the string keys executive_summary, key_metrics_commentary, risks_summary, growth_drivers and \
red_flags. No markdown fences.";

/// Full provider request for one narrative.
pub fn build_request(input: &ReportInput<'_>) -> GenerationRequest {
    let question = input
        .question
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(DEFAULT_QUESTION);

    let prompt = format!(
        "{}\nQuestion: {}\n\n{}",
        build_context(input),
        question,
        language_instruction(input.lang)
    );

    GenerationRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        json_output: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{MetricPoint, Projection};
    use std::collections::BTreeMap;

    fn metrics() -> MetricSeries {
        let mut series = BTreeMap::new();
        series.insert(
            Metric::Revenue,
            vec![
                MetricPoint { fiscal_year: 2022, value: Some(100e9) },
                MetricPoint { fiscal_year: 2023, value: Some(110e9) },
            ],
        );
        series.insert(
            Metric::NetMargin,
            vec![
                MetricPoint { fiscal_year: 2022, value: None },
                MetricPoint { fiscal_year: 2023, value: Some(0.25) },
            ],
        );
        MetricSeries {
            years: vec![2022, 2023],
            series,
            revenue_cagr: Some(0.1),
        }
    }

    fn input<'a>(metrics: &'a MetricSeries, excerpt: Option<&'a str>) -> ReportInput<'a> {
        ReportInput {
            ticker: "AAPL",
            entity_name: Some("Apple Inc."),
            question: None,
            metrics,
            forecast: None,
            filing_excerpt: excerpt,
            lang: OutputLanguage::En,
        }
    }

    #[test]
    fn test_table_renders_nulls_as_na() {
        let table = render_metrics_table(&metrics());
        assert!(table.starts_with("Metric | FY2022 | FY2023\n"));
        assert!(table.contains("Revenue | $100.00B | $110.00B"));
        assert!(table.contains("Net Margin | n/a | 25.0%"));
        assert!(table.contains("Revenue CAGR (FY2022-FY2023): 10.0%"));
    }

    #[test]
    fn test_empty_series_is_annotated() {
        let empty = MetricSeries::default();
        let context = build_context(&input(&empty, None));
        assert!(context.contains(EMPTY_METRICS_NOTE));
    }

    #[test]
    fn test_forecast_line() {
        let m = metrics();
        let forecast = ForecastResult {
            method: "linear".to_string(),
            base_year: 2022,
            slope: 10e9,
            intercept: 100e9,
            points_used: 2,
            projections: vec![Projection { fiscal_year: 2024, value: 120e9 }],
        };
        let mut i = input(&m, None);
        i.forecast = Some(&forecast);
        assert!(build_context(&i).contains("FY2024 $120.00B"));
    }

    #[test]
    fn test_long_context_is_truncated_with_marker() {
        let m = metrics();
        let excerpt = "risk ".repeat(2_000);
        let context = build_context(&input(&m, Some(&excerpt)));
        // The excerpt alone is capped, so this fits
        assert!(context.chars().count() <= MAX_CONTEXT_CHARS);

        let bounded = bound_context("界".repeat(MAX_CONTEXT_CHARS + 10));
        assert_eq!(bounded.chars().count(), MAX_CONTEXT_CHARS);
        assert!(bounded.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_request_carries_question_and_language() {
        let m = metrics();
        let mut i = input(&m, None);
        i.question = Some("  Is the margin sustainable?  ");
        i.lang = OutputLanguage::Ja;
        let request = build_request(&i);
        assert!(request.json_output);
        assert!(request.prompt.contains("Question: Is the margin sustainable?"));
        assert!(request.prompt.contains("Japanese"));
        assert!(request.system.contains("executive_summary"));
    }
}
