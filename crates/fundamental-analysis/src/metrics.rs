//! Per-year derived metrics over a [`FactTable`].

use crate::normalizer::FactTable;
use analysis_core::{Concept, Metric, MetricPoint, MetricProfile, MetricSeries};
use std::collections::BTreeMap;

const STANDARD_RAW: &[(Metric, Concept)] = &[
    (Metric::Revenue, Concept::Revenue),
    (Metric::NetIncome, Concept::NetIncome),
    (Metric::OperatingCashFlow, Concept::OperatingCashFlow),
    (Metric::Capex, Concept::Capex),
    (Metric::StockholdersEquity, Concept::StockholdersEquity),
];

const EXTENDED_RAW: &[(Metric, Concept)] = &[
    (Metric::GrossProfit, Concept::GrossProfit),
    (Metric::OperatingIncome, Concept::OperatingIncome),
    (Metric::TotalAssets, Concept::TotalAssets),
];

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Ratio that is only meaningful over a positive base (ROE, ROA).
fn ratio_over_positive(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

fn growth(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(c), Some(p)) if p != 0.0 => Some((c - p) / p.abs()),
        _ => None,
    }
}

/// Free cash flow. Capex is stored as a positive outflow but some filers
/// report it signed, so its magnitude is subtracted.
fn free_cash_flow(ocf: Option<f64>, capex: Option<f64>) -> Option<f64> {
    Some(ocf? - capex?.abs())
}

/// Compound annual growth between the first and last year of the window.
pub fn cagr(first: Option<f64>, last: Option<f64>, span_years: i32) -> Option<f64> {
    let (first, last) = (first?, last?);
    if first <= 0.0 || last < 0.0 || span_years < 1 {
        return None;
    }
    let rate = (last / first).powf(1.0 / f64::from(span_years)) - 1.0;
    rate.is_finite().then_some(rate)
}

/// Build the metric series for every year of the table's window.
///
/// Every emitted series has exactly one point per window year; a missing
/// operand makes the point null.
pub fn compute_metrics(table: &FactTable, profile: MetricProfile) -> MetricSeries {
    let years = table.years.clone();
    let mut series: BTreeMap<Metric, Vec<MetricPoint>> = BTreeMap::new();

    let mut push = |metric: Metric, year: i32, value: Option<f64>| {
        series.entry(metric).or_default().push(MetricPoint {
            fiscal_year: year,
            value: value.filter(|v| v.is_finite()),
        });
    };

    let raw: Vec<(Metric, Concept)> = match profile {
        MetricProfile::Standard => STANDARD_RAW.to_vec(),
        MetricProfile::Extended => STANDARD_RAW.iter().chain(EXTENDED_RAW).copied().collect(),
    };

    for &year in years.iter() {
        let value = |concept: Concept| table.value(concept, year);

        for &(metric, concept) in &raw {
            push(metric, year, value(concept));
        }

        let revenue = value(Concept::Revenue);
        let net_income = value(Concept::NetIncome);
        // The table carries revenue for the year before the window too
        let previous_revenue = table.value(Concept::Revenue, year - 1);

        push(Metric::RevenueGrowth, year, growth(revenue, previous_revenue));
        push(Metric::NetMargin, year, ratio(net_income, revenue));
        push(
            Metric::FreeCashFlow,
            year,
            free_cash_flow(value(Concept::OperatingCashFlow), value(Concept::Capex)),
        );
        push(Metric::Roe, year, ratio_over_positive(net_income, value(Concept::StockholdersEquity)));

        if profile == MetricProfile::Extended {
            push(Metric::GrossMargin, year, ratio(value(Concept::GrossProfit), revenue));
            push(Metric::OperatingMargin, year, ratio(value(Concept::OperatingIncome), revenue));
            push(Metric::Roa, year, ratio_over_positive(net_income, value(Concept::TotalAssets)));
        }
    }

    let revenue_cagr = match (years.first(), years.last()) {
        (Some(&first), Some(&last)) => cagr(
            table.value(Concept::Revenue, first),
            table.value(Concept::Revenue, last),
            last - first,
        ),
        _ => None,
    };

    MetricSeries {
        years,
        series,
        revenue_cagr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use analysis_core::{CompanyFacts, Fact};
    use chrono::NaiveDate;

    fn fact(concept: Concept, year: i32, value: f64) -> Fact {
        let instant = concept.is_instant();
        Fact {
            concept,
            tag: concept.label().to_string(),
            tag_rank: 0,
            unit: "USD".to_string(),
            value,
            period_start: (!instant).then(|| NaiveDate::from_ymd_opt(year, 1, 1).unwrap()),
            period_end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            fiscal_year: Some(year),
            fiscal_period: Some("FY".to_string()),
            form: "10-K".to_string(),
            filed: NaiveDate::from_ymd_opt(year + 1, 2, 1).unwrap(),
            frame: Some(if instant { format!("CY{}Q4I", year) } else { format!("CY{}", year) }),
            accession: format!("acc-{}", year),
        }
    }

    fn table(facts: Vec<Fact>, years: usize) -> FactTable {
        let company = CompanyFacts {
            ticker: "TEST".to_string(),
            cik: "0000000001".to_string(),
            entity_name: None,
            facts,
        };
        normalize(&company, years).unwrap()
    }

    fn revenue_table(values: &[f64]) -> FactTable {
        let facts = values
            .iter()
            .enumerate()
            .map(|(i, v)| fact(Concept::Revenue, 2020 + i as i32, *v))
            .collect();
        table(facts, values.len())
    }

    #[test]
    fn test_revenue_cagr_ten_percent() {
        let metrics = compute_metrics(&revenue_table(&[100.0, 110.0, 121.0, 133.1]), MetricProfile::Standard);
        let cagr = metrics.revenue_cagr.unwrap();
        assert!((cagr - 0.10).abs() < 0.0001, "cagr = {}", cagr);
    }

    #[test]
    fn test_every_series_has_one_point_per_year() {
        let mut facts = vec![
            fact(Concept::Revenue, 2021, 100.0),
            fact(Concept::Revenue, 2022, 120.0),
            fact(Concept::Revenue, 2023, 150.0),
        ];
        facts.push(fact(Concept::NetIncome, 2023, 15.0));
        let metrics = compute_metrics(&table(facts, 3), MetricProfile::Extended);

        assert_eq!(metrics.years, vec![2021, 2022, 2023]);
        for (metric, points) in &metrics.series {
            assert_eq!(points.len(), 3, "{:?}", metric);
            let years: Vec<i32> = points.iter().map(|p| p.fiscal_year).collect();
            assert_eq!(years, metrics.years);
        }
        assert!(metrics.get(Metric::GrossMargin).is_some());
        assert_eq!(metrics.values(Metric::NetIncome), vec![None, None, Some(15.0)]);
    }

    #[test]
    fn test_standard_profile_omits_extended_metrics() {
        let metrics = compute_metrics(&revenue_table(&[1.0, 2.0]), MetricProfile::Standard);
        assert!(metrics.get(Metric::Roa).is_none());
        assert!(metrics.get(Metric::GrossProfit).is_none());
        assert!(metrics.get(Metric::Roe).is_some());
    }

    #[test]
    fn test_growth_first_year_and_zero_base_are_null() {
        let metrics = compute_metrics(&revenue_table(&[0.0, 50.0, 75.0]), MetricProfile::Standard);
        assert_eq!(metrics.values(Metric::RevenueGrowth), vec![None, None, Some(0.5)]);
        // CAGR from a zero base is undefined
        assert_eq!(metrics.revenue_cagr, None);
    }

    #[test]
    fn test_first_window_year_growth_uses_earlier_revenue() {
        let facts = [(2018, 50.0), (2019, 100.0), (2020, 150.0), (2021, 180.0), (2022, 198.0), (2023, 217.8)]
            .iter()
            .map(|&(year, v)| fact(Concept::Revenue, year, v))
            .collect();
        let metrics = compute_metrics(&table(facts, 4), MetricProfile::Standard);

        assert_eq!(metrics.years, vec![2020, 2021, 2022, 2023]);
        let growth = metrics.values(Metric::RevenueGrowth);
        assert_eq!(growth.len(), 4);
        assert_eq!(growth[0], Some(0.5));
        assert!((growth[1].unwrap() - 0.2).abs() < 1e-9);
        // Series and CAGR still cover only the window
        assert_eq!(metrics.values(Metric::Revenue)[0], Some(150.0));
    }

    #[test]
    fn test_growth_over_negative_base_uses_magnitude() {
        assert_eq!(growth(Some(-50.0), Some(-100.0)), Some(0.5));
    }

    #[test]
    fn test_fcf_and_roe_rules() {
        let facts = vec![
            fact(Concept::Revenue, 2022, 1000.0),
            fact(Concept::Revenue, 2023, 1100.0),
            fact(Concept::NetIncome, 2022, 100.0),
            fact(Concept::NetIncome, 2023, 120.0),
            fact(Concept::OperatingCashFlow, 2022, 200.0),
            fact(Concept::OperatingCashFlow, 2023, 210.0),
            fact(Concept::Capex, 2022, 50.0),
            // Signed capex still reduces FCF
            fact(Concept::Capex, 2023, -60.0),
            fact(Concept::StockholdersEquity, 2022, -10.0),
            fact(Concept::StockholdersEquity, 2023, 600.0),
        ];
        let metrics = compute_metrics(&table(facts, 2), MetricProfile::Standard);

        assert_eq!(metrics.values(Metric::FreeCashFlow), vec![Some(150.0), Some(150.0)]);
        assert_eq!(metrics.values(Metric::Roe), vec![None, Some(0.2)]);
        assert_eq!(metrics.values(Metric::NetMargin), vec![Some(0.1), Some(120.0 / 1100.0)]);
    }

    #[test]
    fn test_extended_ratios() {
        let facts = vec![
            fact(Concept::Revenue, 2023, 200.0),
            fact(Concept::GrossProfit, 2023, 80.0),
            fact(Concept::OperatingIncome, 2023, 40.0),
            fact(Concept::NetIncome, 2023, 20.0),
            fact(Concept::TotalAssets, 2023, 0.0),
        ];
        let metrics = compute_metrics(&table(facts, 1), MetricProfile::Extended);
        assert_eq!(metrics.latest(Metric::GrossMargin), Some(0.4));
        assert_eq!(metrics.latest(Metric::OperatingMargin), Some(0.2));
        assert_eq!(metrics.latest(Metric::Roa), None);
    }

    #[test]
    fn test_cagr_bounds() {
        assert_eq!(cagr(Some(100.0), Some(100.0), 0), None);
        assert_eq!(cagr(Some(-1.0), Some(100.0), 3), None);
        assert_eq!(cagr(Some(100.0), Some(-5.0), 3), None);
        assert_eq!(cagr(Some(100.0), Some(0.0), 2), Some(-1.0));
        assert_eq!(cagr(None, Some(1.0), 2), None);
    }
}
