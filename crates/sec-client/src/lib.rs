//! Client for the SEC EDGAR registry: ticker → CIK resolution, XBRL company
//! facts and the latest annual report document.

use analysis_core::{CompanyFacts, FactSource, FilingDocument, FilingSource, UpstreamDataError};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;

pub mod facts;
pub mod filing_text;


pub use facts::parse_company_facts;
pub use filing_text::{extract_risk_section, html_to_text, MAX_FILING_CHARS};

const ANNUAL_FORMS: &[&str] = &["10-K", "20-F", "40-F"];
/// How many of the most recent annual report submissions are tried, newest first
const FILING_SCAN_LIMIT: usize = 5;
/// Filing text shorter than this is treated as a cover page or exhibit stub
const MIN_FILING_TEXT_CHARS: usize = 1000;
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct SecClientConfig {
    /// Identification string required by the registry's fair-access policy
    pub user_agent: String,
    /// Host for `api/xbrl` and `submissions` (https://data.sec.gov)
    pub data_base_url: String,
    /// Host for `files/company_tickers.json` and `Archives` (https://www.sec.gov)
    pub www_base_url: String,
    pub requests_per_second: usize,
    pub timeout: Duration,
    /// First backoff after a 429/503; doubles on each further attempt
    pub retry_backoff: Duration,
    /// Zero disables the company-facts cache
    pub cache_ttl: Duration,
}

impl Default for SecClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "sec-xbrl-analyzer/0.1 (contact@example.com)".to_string(),
            data_base_url: "https://data.sec.gov".to_string(),
            www_base_url: "https://www.sec.gov".to_string(),
            requests_per_second: 10,
            timeout: Duration::from_secs(20),
            retry_backoff: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(86_400),
        }
    }
}

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let Some(&oldest) = ts.front() else {
                continue;
            };
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(10);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {}ms for registry slot", sleep_dur.as_millis());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
    title: String,
}

/// Resolved company identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyId {
    pub ticker: String,
    /// Zero-padded to 10 digits
    pub cik: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionsResponse {
    filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    recent: RecentFilings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RecentFilings {
    accession_number: Vec<String>,
    form: Vec<String>,
    primary_document: Vec<String>,
    report_date: Vec<Option<String>>,
    filing_date: Vec<Option<String>>,
}

struct CacheEntry<T> {
    data: T,
    cached_at: Instant,
}

#[derive(Clone)]
pub struct SecClient {
    client: Client,
    config: Arc<SecClientConfig>,
    rate_limiter: RateLimiter,
    tickers: Arc<OnceCell<HashMap<String, TickerEntry>>>,
    facts_cache: Arc<DashMap<String, CacheEntry<CompanyFacts>>>,
}

impl SecClient {
    pub fn new(config: SecClientConfig) -> Result<Self, UpstreamDataError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamDataError::Unreachable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(config.requests_per_second, Duration::from_secs(1)),
            config: Arc::new(config),
            tickers: Arc::new(OnceCell::new()),
            facts_cache: Arc::new(DashMap::new()),
        })
    }

    /// GET with rate limiting. 429/503 are retried with exponential backoff;
    /// transport errors fail immediately.
    async fn get(&self, url: &str) -> Result<reqwest::Response, UpstreamDataError> {
        let mut backoff = self.config.retry_backoff;

        for attempt in 1..=MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| UpstreamDataError::Unreachable(format!("{}: {}", url, e)))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE;
            if !retryable || attempt == MAX_ATTEMPTS {
                return Err(UpstreamDataError::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            tracing::warn!(
                "Registry returned {} for {}, retry {}/{} in {}ms",
                status,
                url,
                attempt,
                MAX_ATTEMPTS - 1,
                backoff.as_millis()
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        Err(UpstreamDataError::Unreachable(url.to_string()))
    }

    async fn ticker_map(&self) -> Result<&HashMap<String, TickerEntry>, UpstreamDataError> {
        self.tickers
            .get_or_try_init(|| async {
                let url = format!("{}/files/company_tickers.json", self.config.www_base_url);
                let raw: HashMap<String, TickerEntry> = self
                    .get(&url)
                    .await?
                    .json()
                    .await
                    .map_err(|e| UpstreamDataError::InvalidPayload(format!("company_tickers.json: {}", e)))?;

                tracing::info!("Loaded {} registry tickers", raw.len());
                Ok(raw
                    .into_values()
                    .map(|entry| (entry.ticker.to_ascii_uppercase(), entry))
                    .collect())
            })
            .await
    }

    /// Resolve a ticker to its 10-digit CIK.
    pub async fn resolve_cik(&self, ticker: &str) -> Result<CompanyId, UpstreamDataError> {
        let ticker = ticker.trim().to_ascii_uppercase();
        let entry = self
            .ticker_map()
            .await?
            .get(&ticker)
            .ok_or_else(|| UpstreamDataError::UnknownTicker(ticker.clone()))?;

        Ok(CompanyId {
            ticker,
            cik: format!("{:010}", entry.cik_str),
            title: entry.title.clone(),
        })
    }

    /// Fetch and flatten the XBRL company facts for a ticker.
    pub async fn fetch_company_facts(&self, ticker: &str) -> Result<CompanyFacts, UpstreamDataError> {
        let company = self.resolve_cik(ticker).await?;

        if let Some(entry) = self.facts_cache.get(&company.ticker) {
            if entry.cached_at.elapsed() < self.config.cache_ttl {
                tracing::debug!("Company facts cache hit for {}", company.ticker);
                return Ok(entry.data.clone());
            }
        }

        let url = format!(
            "{}/api/xbrl/companyfacts/CIK{}.json",
            self.config.data_base_url, company.cik
        );
        let body = self.get(&url).await?.text().await.map_err(|e| {
            UpstreamDataError::Unreachable(format!("reading companyfacts for {}: {}", company.ticker, e))
        })?;

        let mut facts = parse_company_facts(&company.ticker, &company.cik, &body)?;
        if facts.entity_name.is_none() {
            facts.entity_name = Some(company.title.clone());
        }
        tracing::info!("Fetched {} mapped facts for {} (CIK {})", facts.facts.len(), company.ticker, company.cik);

        if !self.config.cache_ttl.is_zero() {
            // Concurrent fetches may both insert; the payloads are equivalent
            self.facts_cache.insert(
                company.ticker.clone(),
                CacheEntry {
                    data: facts.clone(),
                    cached_at: Instant::now(),
                },
            );
        }

        Ok(facts)
    }

    /// Primary document of the newest usable 10-K / 20-F / 40-F, as plain
    /// text. Other form types are skipped before the scan limit applies.
    pub async fn fetch_latest_annual_filing(&self, ticker: &str) -> Result<FilingDocument, UpstreamDataError> {
        let company = self.resolve_cik(ticker).await?;
        let url = format!("{}/submissions/CIK{}.json", self.config.data_base_url, company.cik);
        let submissions: SubmissionsResponse = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamDataError::InvalidPayload(format!("submissions for {}: {}", company.ticker, e)))?;

        let recent = submissions.filings.recent;
        let cik_number = company.cik.trim_start_matches('0');

        let candidates = (0..recent.form.len())
            .filter(|&i| ANNUAL_FORMS.contains(&recent.form[i].as_str()))
            .take(FILING_SCAN_LIMIT);

        for i in candidates {
            let form = &recent.form[i];
            let (Some(accession), Some(document)) = (recent.accession_number.get(i), recent.primary_document.get(i)) else {
                continue;
            };

            let doc_url = format!(
                "{}/Archives/edgar/data/{}/{}/{}",
                self.config.www_base_url,
                cik_number,
                accession.replace('-', ""),
                document
            );
            tracing::info!("Fetching {} {} from {}", company.ticker, form, doc_url);

            let html = match self.get(&doc_url).await {
                Ok(resp) => match resp.text().await {
                    Ok(html) => html,
                    Err(e) => {
                        tracing::warn!("Failed to read filing {}: {}", accession, e);
                        continue;
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to fetch filing {}: {}", accession, e);
                    continue;
                }
            };

            let text = html_to_text(&html);
            if text.chars().count() <= MIN_FILING_TEXT_CHARS {
                tracing::warn!("Filing {} text too short ({} chars), trying next", accession, text.len());
                continue;
            }

            return Ok(FilingDocument {
                ticker: company.ticker.clone(),
                cik: company.cik.clone(),
                accession: accession.clone(),
                form: form.clone(),
                report_date: recent.report_date.get(i).cloned().flatten(),
                filing_date: recent.filing_date.get(i).cloned().flatten(),
                url: doc_url,
                text: analysis_core::text::truncate_chars(&text, MAX_FILING_CHARS).to_string(),
            });
        }

        Err(UpstreamDataError::NoFiling(company.ticker))
    }
}

#[async_trait]
impl FactSource for SecClient {
    async fn company_facts(&self, ticker: &str) -> Result<CompanyFacts, UpstreamDataError> {
        self.fetch_company_facts(ticker).await
    }
}

#[async_trait]
impl FilingSource for SecClient {
    async fn latest_annual_filing(&self, ticker: &str) -> Result<FilingDocument, UpstreamDataError> {
        self.fetch_latest_annual_filing(ticker).await
    }
}
