use async_trait::async_trait;
use crate::{CompanyFacts, FilingDocument, UpstreamDataError};

/// Source of raw XBRL company facts (the disclosure registry, or a fixture)
#[async_trait]
pub trait FactSource: Send + Sync {
    async fn company_facts(&self, ticker: &str) -> Result<CompanyFacts, UpstreamDataError>;
}

/// Source of the latest annual report text
#[async_trait]
pub trait FilingSource: Send + Sync {
    async fn latest_annual_filing(&self, ticker: &str) -> Result<FilingDocument, UpstreamDataError>;
}
