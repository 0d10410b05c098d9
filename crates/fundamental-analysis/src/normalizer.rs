//! Reduces raw company facts to one selected fact per (concept, fiscal year).

use analysis_core::{CompanyFacts, Concept, Fact, UpstreamDataError};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Selected annual facts for the analysis window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactTable {
    /// Ascending, contiguous fiscal years
    pub years: Vec<i32>,
    /// Window facts plus revenue of the year just before the window
    entries: BTreeMap<(Concept, i32), Fact>,
}

impl FactTable {
    pub fn get(&self, concept: Concept, year: i32) -> Option<&Fact> {
        self.entries.get(&(concept, year))
    }

    pub fn value(&self, concept: Concept, year: i32) -> Option<f64> {
        self.get(concept, year).map(|f| f.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(Concept, i32), &Fact)> {
        self.entries.iter()
    }
}

/// Candidate ordering; the first element after sorting is selected.
fn selection_order(a: &Fact, b: &Fact) -> Ordering {
    let framed = |f: &Fact| f.annual_frame_year().is_some();

    framed(b)
        .cmp(&framed(a))
        .then_with(|| b.form_priority().cmp(&a.form_priority()))
        .then_with(|| b.filed.cmp(&a.filed))
        .then_with(|| a.tag_rank.cmp(&b.tag_rank))
        .then_with(|| a.tag.cmp(&b.tag))
        .then_with(|| a.accession.cmp(&b.accession))
        .then_with(|| b.period_end.cmp(&a.period_end))
        .then_with(|| a.value.total_cmp(&b.value))
}

fn is_candidate(fact: &Fact) -> bool {
    fact.unit == fact.concept.unit() && fact.is_annual() && fact.value.is_finite()
}

/// Select the best annual fact per (concept, fiscal year) and keep the
/// `years` most recent fiscal years.
///
/// Revenue of the year preceding the window is kept as well so the first
/// window year has a growth base; it is not listed in `years`.
///
/// The newest year is the newest one with a revenue fact, or the newest of
/// any concept when revenue is never reported. Input order does not matter.
pub fn normalize(company: &CompanyFacts, years: usize) -> Result<FactTable, UpstreamDataError> {
    let mut best: BTreeMap<(Concept, i32), &Fact> = BTreeMap::new();
    let mut discarded = 0usize;

    for fact in &company.facts {
        if !is_candidate(fact) {
            discarded += 1;
            continue;
        }
        let key = (fact.concept, fact.normalized_year());
        match best.get(&key) {
            Some(current) if selection_order(fact, current) != Ordering::Less => {}
            _ => {
                best.insert(key, fact);
            }
        }
    }

    tracing::debug!(
        "{}: {} facts, {} not annual/USD, {} (concept, year) slots",
        company.ticker,
        company.facts.len(),
        discarded,
        best.len()
    );

    let newest_revenue = best
        .keys()
        .filter(|(concept, _)| *concept == Concept::Revenue)
        .map(|(_, year)| *year)
        .max();
    let newest = newest_revenue.or_else(|| best.keys().map(|(_, year)| *year).max());
    let Some(newest) = newest.filter(|_| years > 0) else {
        return Err(UpstreamDataError::NoFinancialData(company.ticker.clone()));
    };

    let span = i32::try_from(years).unwrap_or(i32::MAX);
    let first = newest.saturating_sub(span - 1);
    let window: Vec<i32> = (first..=newest).collect();

    let entries = best
        .into_iter()
        .filter(|((concept, year), _)| {
            (first..=newest).contains(year) || (*concept == Concept::Revenue && *year == first.saturating_sub(1))
        })
        .map(|(key, fact)| (key, fact.clone()))
        .collect();

    Ok(FactTable { years: window, entries })
}
