//! Rule-based narrative synthesized from the metric series alone.

use analysis_core::{ForecastResult, Metric, MetricSeries, OutputLanguage};

use crate::format::{pct, usd};
use crate::prompt::ReportInput;

/// Net margin moves smaller than this (absolute) count as flat.
const FLAT_MARGIN_BAND: f64 = 0.005;

/// The five report sections, before provenance is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub executive_summary: String,
    pub key_metrics_commentary: String,
    pub risks_summary: String,
    pub growth_drivers: String,
    pub red_flags: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Improving,
    Declining,
    Flat,
    Unknown,
}

fn first_and_last(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let mut present = values.iter().flatten();
    let first = *present.next()?;
    let last = *present.last()?;
    Some((first, last))
}

fn margin_trend(metrics: &MetricSeries) -> Trend {
    match first_and_last(&metrics.values(Metric::NetMargin)) {
        Some((first, last)) if last - first > FLAT_MARGIN_BAND => Trend::Improving,
        Some((first, last)) if first - last > FLAT_MARGIN_BAND => Trend::Declining,
        Some(_) => Trend::Flat,
        None => Trend::Unknown,
    }
}

fn latest_point(metrics: &MetricSeries, metric: Metric) -> Option<(i32, f64)> {
    metrics
        .get(metric)?
        .iter()
        .rev()
        .find_map(|p| p.value.map(|v| (p.fiscal_year, v)))
}

struct Facts {
    revenue: Option<(i32, f64)>,
    net_margin: Option<f64>,
    fcf: Option<f64>,
    roe: Option<f64>,
    cagr: Option<f64>,
    trend: Trend,
    equity: Option<f64>,
}

impl Facts {
    fn gather(metrics: &MetricSeries) -> Self {
        Self {
            revenue: latest_point(metrics, Metric::Revenue),
            net_margin: metrics.latest(Metric::NetMargin),
            fcf: metrics.latest(Metric::FreeCashFlow),
            roe: metrics.latest(Metric::Roe),
            cagr: metrics.revenue_cagr,
            trend: margin_trend(metrics),
            equity: metrics.latest(Metric::StockholdersEquity),
        }
    }
}

fn na(lang: OutputLanguage) -> &'static str {
    match lang {
        OutputLanguage::En => "n/a",
        OutputLanguage::Ja => "データなし",
    }
}

fn or_na(value: Option<String>, lang: OutputLanguage) -> String {
    value.unwrap_or_else(|| na(lang).to_string())
}

fn projection_text(forecast: Option<&ForecastResult>) -> Option<String> {
    let next = forecast?.projections.first()?;
    Some(format!("FY{} {}", next.fiscal_year, usd(next.value)))
}

/// Narrative for when no provider output is available (or AI is switched
/// off). Always fills every section.
pub fn rule_based(input: &ReportInput<'_>) -> Narrative {
    let f = Facts::gather(input.metrics);
    match input.lang {
        OutputLanguage::En => english(input, &f),
        OutputLanguage::Ja => japanese(input, &f),
    }
}

fn english(input: &ReportInput<'_>, f: &Facts) -> Narrative {
    let lang = OutputLanguage::En;
    let name = input.entity_name.unwrap_or(input.ticker);

    let executive_summary = match f.revenue {
        Some((year, revenue)) => format!(
            "{} ({}) reported revenue of {} in FY{} with a net margin of {}. Revenue CAGR over the analysis window: {}.",
            name,
            input.ticker,
            usd(revenue),
            year,
            or_na(f.net_margin.map(pct), lang),
            or_na(f.cagr.map(pct), lang),
        ),
        None => format!(
            "{} ({}): no annual revenue figures were available in the XBRL filings for the requested window.",
            name, input.ticker
        ),
    };

    let trend = match f.trend {
        Trend::Improving => "Net margin improved over the window.",
        Trend::Declining => "Net margin declined over the window.",
        Trend::Flat => "Net margin was broadly stable over the window.",
        Trend::Unknown => "Net margin trend cannot be determined from the available data.",
    };
    let fcf = match f.fcf {
        Some(v) if v >= 0.0 => format!("Latest free cash flow was positive at {}.", usd(v)),
        Some(v) => format!("Latest free cash flow was negative at {}.", usd(v)),
        None => "Latest free cash flow is not available.".to_string(),
    };
    let roe = format!("Latest ROE: {}.", or_na(f.roe.map(pct), lang));
    let key_metrics_commentary = format!("{} {} {}", trend, fcf, roe);

    let risks_summary = if input.filing_excerpt.is_some() {
        "AI analysis of the risk factor section is unavailable; review Item 1A of the latest annual report directly. \
         Figures below reflect reported financials only."
            .to_string()
    } else {
        "Filing-specific risk factors were not analyzed. Macroeconomic conditions, competition and regulation \
         remain general considerations."
            .to_string()
    };

    let growth_drivers = match (f.cagr, projection_text(input.forecast)) {
        (Some(cagr), Some(next)) => format!(
            "Revenue compounded at {} per year; a linear trend projects {}.",
            pct(cagr),
            next
        ),
        (Some(cagr), None) => format!("Revenue compounded at {} per year.", pct(cagr)),
        (None, Some(next)) => format!("A linear revenue trend projects {}.", next),
        (None, None) => "Insufficient revenue history to describe growth.".to_string(),
    };

    let mut flags = Vec::new();
    if matches!(f.fcf, Some(v) if v < 0.0) {
        flags.push("negative free cash flow");
    }
    if f.trend == Trend::Declining {
        flags.push("declining net margin");
    }
    if matches!(f.net_margin, Some(v) if v < 0.0) {
        flags.push("net loss in the latest year");
    }
    if matches!(f.equity, Some(v) if v <= 0.0) {
        flags.push("non-positive stockholders' equity");
    }
    let red_flags = if flags.is_empty() {
        "No red flags detected by rule-based checks.".to_string()
    } else {
        format!("Rule-based checks flagged: {}.", flags.join("; "))
    };

    Narrative {
        executive_summary,
        key_metrics_commentary,
        risks_summary,
        growth_drivers,
        red_flags,
    }
}

fn japanese(input: &ReportInput<'_>, f: &Facts) -> Narrative {
    let lang = OutputLanguage::Ja;
    let name = input.entity_name.unwrap_or(input.ticker);

    let executive_summary = match f.revenue {
        Some((year, revenue)) => format!(
            "{}（{}）のFY{}の売上高は{}、純利益率は{}です。分析期間の売上高CAGRは{}です。",
            name,
            input.ticker,
            year,
            usd(revenue),
            or_na(f.net_margin.map(pct), lang),
            or_na(f.cagr.map(pct), lang),
        ),
        None => format!(
            "{}（{}）：指定期間のXBRL年次売上高データが取得できませんでした。",
            name, input.ticker
        ),
    };

    let trend = match f.trend {
        Trend::Improving => "純利益率は期間中に改善しました。",
        Trend::Declining => "純利益率は期間中に低下しました。",
        Trend::Flat => "純利益率は期間中ほぼ横ばいでした。",
        Trend::Unknown => "利用可能なデータから純利益率の傾向は判断できません。",
    };
    let fcf = match f.fcf {
        Some(v) if v >= 0.0 => format!("直近のフリーキャッシュフローは{}のプラスです。", usd(v)),
        Some(v) => format!("直近のフリーキャッシュフローは{}のマイナスです。", usd(v)),
        None => "直近のフリーキャッシュフローは取得できません。".to_string(),
    };
    let roe = format!("直近のROE：{}。", or_na(f.roe.map(pct), lang));
    let key_metrics_commentary = format!("{}{}{}", trend, fcf, roe);

    let risks_summary = if input.filing_excerpt.is_some() {
        "リスク要因のAI分析は利用できません。最新の年次報告書のItem 1Aを直接ご確認ください。".to_string()
    } else {
        "開示書類固有のリスク要因は分析していません。一般的にマクロ経済、競合、規制リスクに注意が必要です。".to_string()
    };

    let growth_drivers = match (f.cagr, projection_text(input.forecast)) {
        (Some(cagr), Some(next)) => format!(
            "売上高は年率{}で成長しました。線形トレンドによる予測は{}です。",
            pct(cagr),
            next
        ),
        (Some(cagr), None) => format!("売上高は年率{}で成長しました。", pct(cagr)),
        (None, Some(next)) => format!("線形トレンドによる売上高予測は{}です。", next),
        (None, None) => "成長を評価するための売上高データが不足しています。".to_string(),
    };

    let mut flags = Vec::new();
    if matches!(f.fcf, Some(v) if v < 0.0) {
        flags.push("フリーキャッシュフローがマイナス");
    }
    if f.trend == Trend::Declining {
        flags.push("純利益率の低下");
    }
    if matches!(f.net_margin, Some(v) if v < 0.0) {
        flags.push("直近年度の純損失");
    }
    if matches!(f.equity, Some(v) if v <= 0.0) {
        flags.push("株主資本がゼロ以下");
    }
    let red_flags = if flags.is_empty() {
        "ルールベースのチェックでは重大な異常は検出されませんでした。".to_string()
    } else {
        format!("ルールベースのチェックで検出：{}。", flags.join("、"))
    };

    Narrative {
        executive_summary,
        key_metrics_commentary,
        risks_summary,
        growth_drivers,
        red_flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::MetricPoint;
    use std::collections::BTreeMap;

    fn series(values: &[(Metric, [Option<f64>; 3])]) -> MetricSeries {
        let years = vec![2021, 2022, 2023];
        let mut map = BTreeMap::new();
        for (metric, vals) in values {
            let points = years
                .iter()
                .zip(vals.iter())
                .map(|(&fiscal_year, &value)| MetricPoint { fiscal_year, value })
                .collect();
            map.insert(*metric, points);
        }
        MetricSeries {
            years,
            series: map,
            revenue_cagr: Some(0.08),
        }
    }

    fn input(metrics: &MetricSeries, lang: OutputLanguage) -> ReportInput<'_> {
        ReportInput {
            ticker: "ACME",
            entity_name: None,
            question: None,
            metrics,
            forecast: None,
            filing_excerpt: None,
            lang,
        }
    }

    #[test]
    fn test_healthy_company_en() {
        let m = series(&[
            (Metric::Revenue, [Some(100e9), Some(108e9), Some(116.64e9)]),
            (Metric::NetMargin, [Some(0.20), Some(0.22), Some(0.25)]),
            (Metric::FreeCashFlow, [Some(10e9), Some(12e9), Some(15e9)]),
            (Metric::Roe, [None, Some(0.3), Some(0.35)]),
        ]);
        let n = rule_based(&input(&m, OutputLanguage::En));
        assert!(n.executive_summary.contains("FY2023"));
        assert!(n.executive_summary.contains("25.0%"));
        assert!(n.executive_summary.contains("8.0%"));
        assert!(n.key_metrics_commentary.contains("improved"));
        assert!(n.key_metrics_commentary.contains("positive"));
        assert!(n.key_metrics_commentary.contains("35.0%"));
        assert!(n.red_flags.starts_with("No red flags"));
    }

    #[test]
    fn test_distressed_company_flags() {
        let m = series(&[
            (Metric::Revenue, [Some(100.0), Some(90.0), Some(80.0)]),
            (Metric::NetMargin, [Some(0.05), Some(0.0), Some(-0.10)]),
            (Metric::FreeCashFlow, [Some(1.0), None, Some(-5.0)]),
            (Metric::StockholdersEquity, [Some(10.0), Some(0.0), Some(-3.0)]),
        ]);
        let n = rule_based(&input(&m, OutputLanguage::En));
        assert!(n.key_metrics_commentary.contains("declined"));
        assert!(n.key_metrics_commentary.contains("negative"));
        assert!(n.red_flags.contains("negative free cash flow"));
        assert!(n.red_flags.contains("net loss"));
        assert!(n.red_flags.contains("stockholders' equity"));
    }

    #[test]
    fn test_japanese_narrative() {
        let m = series(&[(Metric::Revenue, [Some(1e9), Some(1.1e9), Some(1.2e9)])]);
        let n = rule_based(&input(&m, OutputLanguage::Ja));
        assert!(n.executive_summary.contains("売上高"));
        assert!(n.key_metrics_commentary.contains("判断できません"));
        assert!(n.red_flags.contains("検出されませんでした"));
    }

    #[test]
    fn test_empty_metrics_still_produce_every_section() {
        let m = MetricSeries::default();
        let n = rule_based(&input(&m, OutputLanguage::En));
        for section in [
            &n.executive_summary,
            &n.key_metrics_commentary,
            &n.risks_summary,
            &n.growth_drivers,
            &n.red_flags,
        ] {
            assert!(!section.is_empty());
        }
    }
}
