//! Canonical accounting concepts and the mapping table from raw XBRL tags.
//!
//! Filers tag the same line item with different concepts (`Revenues`,
//! `SalesRevenueNet`, `RevenueFromContractWithCustomer...`). Every raw tag the
//! engine understands is listed exactly once in [`CONCEPT_TAGS`]; anything not
//! in the table is ignored at ingestion time.

use serde::{Deserialize, Serialize};

/// Canonical line item the metrics engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    Revenue,
    NetIncome,
    OperatingCashFlow,
    Capex,
    StockholdersEquity,
    GrossProfit,
    OperatingIncome,
    TotalAssets,
}

impl Concept {
    pub const ALL: [Concept; 8] = [
        Concept::Revenue,
        Concept::NetIncome,
        Concept::OperatingCashFlow,
        Concept::Capex,
        Concept::StockholdersEquity,
        Concept::GrossProfit,
        Concept::OperatingIncome,
        Concept::TotalAssets,
    ];

    /// Unit a fact must be reported in to be considered for this concept.
    pub fn unit(&self) -> &'static str {
        "USD"
    }

    /// Balance sheet items are point-in-time (instant) facts.
    pub fn is_instant(&self) -> bool {
        matches!(self, Concept::StockholdersEquity | Concept::TotalAssets)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Concept::Revenue => "Revenue",
            Concept::NetIncome => "Net Income",
            Concept::OperatingCashFlow => "Operating Cash Flow",
            Concept::Capex => "Capital Expenditure",
            Concept::StockholdersEquity => "Stockholders' Equity",
            Concept::GrossProfit => "Gross Profit",
            Concept::OperatingIncome => "Operating Income",
            Concept::TotalAssets => "Total Assets",
        }
    }
}

/// One row of the raw-tag mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConceptTag {
    pub taxonomy: &'static str,
    pub tag: &'static str,
    pub concept: Concept,
    /// Lower rank wins when two tags report the same year.
    pub rank: u8,
}

const fn gaap(tag: &'static str, concept: Concept, rank: u8) -> ConceptTag {
    ConceptTag { taxonomy: "us-gaap", tag, concept, rank }
}

const fn ifrs(tag: &'static str, concept: Concept, rank: u8) -> ConceptTag {
    ConceptTag { taxonomy: "ifrs-full", tag, concept, rank }
}

pub const CONCEPT_TAGS: &[ConceptTag] = &[
    gaap("Revenues", Concept::Revenue, 0),
    gaap("RevenueFromContractWithCustomerExcludingAssessedTax", Concept::Revenue, 1),
    gaap("RevenueFromContractWithCustomerIncludingAssessedTax", Concept::Revenue, 2),
    gaap("SalesRevenueNet", Concept::Revenue, 3),
    ifrs("Revenue", Concept::Revenue, 4),
    gaap("NetIncomeLoss", Concept::NetIncome, 0),
    gaap("ProfitLoss", Concept::NetIncome, 1),
    ifrs("ProfitLoss", Concept::NetIncome, 2),
    gaap("NetCashProvidedByUsedInOperatingActivities", Concept::OperatingCashFlow, 0),
    ifrs("CashFlowsFromUsedInOperatingActivities", Concept::OperatingCashFlow, 1),
    gaap("PaymentsToAcquirePropertyPlantAndEquipment", Concept::Capex, 0),
    gaap("PaymentsToAcquireProductiveAssets", Concept::Capex, 1),
    ifrs("PurchaseOfPropertyPlantAndEquipmentClassifiedAsInvestingActivities", Concept::Capex, 2),
    gaap("StockholdersEquity", Concept::StockholdersEquity, 0),
    gaap(
        "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
        Concept::StockholdersEquity,
        1,
    ),
    ifrs("Equity", Concept::StockholdersEquity, 2),
    gaap("GrossProfit", Concept::GrossProfit, 0),
    ifrs("GrossProfit", Concept::GrossProfit, 1),
    gaap("OperatingIncomeLoss", Concept::OperatingIncome, 0),
    gaap("Assets", Concept::TotalAssets, 0),
    ifrs("Assets", Concept::TotalAssets, 1),
];

/// Resolve a raw `(taxonomy, tag)` pair to its canonical concept.
pub fn lookup_tag(taxonomy: &str, tag: &str) -> Option<&'static ConceptTag> {
    CONCEPT_TAGS
        .iter()
        .find(|t| t.taxonomy == taxonomy && t.tag == tag)
}

/// Taxonomies that contain at least one mapped tag.
pub fn mapped_taxonomies() -> impl Iterator<Item = &'static str> {
    ["us-gaap", "ifrs-full"].into_iter()
}
