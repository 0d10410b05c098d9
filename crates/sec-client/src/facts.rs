//! Flattening of the registry's `companyfacts` document into [`Fact`] records.

use analysis_core::{lookup_tag, mapped_taxonomies, CompanyFacts, Fact, UpstreamDataError};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct CompanyFactsResponse {
    #[serde(rename = "entityName")]
    entity_name: Option<String>,
    #[serde(default)]
    facts: HashMap<String, serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawFact {
    start: Option<String>,
    end: String,
    val: f64,
    #[serde(default)]
    accn: String,
    fy: Option<i32>,
    fp: Option<String>,
    #[serde(default)]
    form: String,
    filed: String,
    frame: Option<String>,
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a `companyfacts` body and keep only facts whose tag is in the
/// concept mapping table. Malformed individual records are skipped.
pub fn parse_company_facts(ticker: &str, cik: &str, body: &str) -> Result<CompanyFacts, UpstreamDataError> {
    let response: CompanyFactsResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamDataError::InvalidPayload(format!("companyfacts for {}: {}", ticker, e)))?;

    let mut facts = Vec::new();
    let mut skipped = 0usize;

    for taxonomy in mapped_taxonomies() {
        let Some(concepts) = response.facts.get(taxonomy) else {
            continue;
        };
        for (tag, concept_data) in concepts {
            let Some(mapping) = lookup_tag(taxonomy, tag) else {
                continue;
            };
            let Some(units) = concept_data.get("units").and_then(|u| u.as_object()) else {
                continue;
            };
            for (unit, records) in units {
                let Some(records) = records.as_array() else {
                    continue;
                };
                for record in records {
                    let parsed = RawFact::deserialize(record).ok().and_then(|raw| {
                        let period_end = parse_date(&raw.end)?;
                        let filed = parse_date(&raw.filed)?;
                        let period_start = match raw.start.as_deref() {
                            Some(s) => Some(parse_date(s)?),
                            None => None,
                        };
                        Some(Fact {
                            concept: mapping.concept,
                            tag: tag.clone(),
                            tag_rank: mapping.rank,
                            unit: unit.clone(),
                            value: raw.val,
                            period_start,
                            period_end,
                            fiscal_year: raw.fy,
                            fiscal_period: raw.fp,
                            form: raw.form,
                            filed,
                            frame: raw.frame,
                            accession: raw.accn,
                        })
                    });
                    match parsed {
                        Some(fact) => facts.push(fact),
                        None => skipped += 1,
                    }
                }
            }
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} malformed fact records for {}", skipped, ticker);
    }

    Ok(CompanyFacts {
        ticker: ticker.to_string(),
        cik: cik.to_string(),
        entity_name: response.entity_name,
        facts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Concept;

    const BODY: &str = r#"{
        "cik": 320193,
        "entityName": "Apple Inc.",
        "facts": {
            "dei": {
                "EntityCommonStockSharesOutstanding": {"units": {"shares": [
                    {"end": "2023-10-20", "val": 15552752000, "accn": "a", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"}
                ]}}
            },
            "us-gaap": {
                "Revenues": {"label": "Revenues", "units": {"USD": [
                    {"start": "2022-09-25", "end": "2023-09-30", "val": 383285000000, "accn": "0000320193-23-000106", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03", "frame": "CY2023"},
                    {"start": "2022-09-25", "end": "not-a-date", "val": 1, "accn": "x", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"},
                    {"end": "2023-09-30", "accn": "missing-val", "form": "10-K", "filed": "2023-11-03"}
                ]}},
                "StockholdersEquity": {"units": {"USD": [
                    {"end": "2023-09-30", "val": 62146000000, "accn": "0000320193-23-000106", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03", "frame": "CY2023Q3I"}
                ]}},
                "Goodwill": {"units": {"USD": [
                    {"end": "2023-09-30", "val": 5, "accn": "z", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"}
                ]}}
            }
        }
    }"#;

    #[test]
    fn test_parse_keeps_only_mapped_well_formed_facts() {
        let cf = parse_company_facts("AAPL", "0000320193", BODY).unwrap();
        assert_eq!(cf.entity_name.as_deref(), Some("Apple Inc."));
        assert_eq!(cf.facts.len(), 2);

        let revenue = cf.facts.iter().find(|f| f.concept == Concept::Revenue).unwrap();
        assert_eq!(revenue.value, 383285000000.0);
        assert_eq!(revenue.frame.as_deref(), Some("CY2023"));
        assert_eq!(revenue.duration_days(), Some(370));

        let equity = cf.facts.iter().find(|f| f.concept == Concept::StockholdersEquity).unwrap();
        assert!(equity.is_instant());
        assert_eq!(equity.unit, "USD");
    }

    #[test]
    fn test_invalid_document_is_upstream_error() {
        let err = parse_company_facts("AAPL", "0000320193", "<html>").unwrap_err();
        assert!(matches!(err, UpstreamDataError::InvalidPayload(_)));
    }
}
