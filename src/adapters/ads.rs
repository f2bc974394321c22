//! NASA ADS API client
//!
//! Finds the works citing a bibcode and exports BibTeX records.
//! See: https://github.com/adsabs/adsabs-dev-api

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::adapters::RecordSource;
use crate::config::{CitationsConfig, DEFAULT_BASE_URL};
use crate::error::{CitationError, Result};
use crate::models::{BibliographicEntry, CitingWorkIdentifier, QuotaSnapshot, SeedIdentifier};
use crate::utils::http::{parse_quota_headers, rate_limit_wait, with_retry, QuotaTracker, RetryConfig};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const FIRST_CURSOR: &str = "*";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: Option<SearchBody>,
    #[serde(rename = "nextCursorMark")]
    next_cursor_mark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(rename = "numFound")]
    num_found: Option<usize>,
    docs: Option<Vec<SearchDoc>>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    bibcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    export: Option<String>,
}

/// One page of citing bibcodes
#[derive(Debug)]
struct SearchPage {
    bibcodes: Vec<String>,
    num_found: Option<usize>,
    next_cursor: Option<String>,
}

impl SearchResponse {
    fn into_page(self) -> std::result::Result<SearchPage, String> {
        let body = self.response.ok_or("missing 'response' object")?;
        let docs = body.docs.ok_or("missing 'response.docs' list")?;

        let bibcodes = docs
            .into_iter()
            .enumerate()
            .map(|(i, doc)| doc.bibcode.ok_or(format!("document {} has no 'bibcode'", i)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SearchPage {
            bibcodes,
            num_found: body.num_found,
            next_cursor: self.next_cursor_mark,
        })
    }
}

/// Bibcodes differing only in whitespace or case name the same work
fn bibcode_key(bibcode: &str) -> String {
    bibcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Outcome of one physical request
enum Attempt<T> {
    Done(T),
    RateLimited(Option<DateTime<Utc>>),
}

/// Client for the ADS search and export endpoints
///
/// All requests share one [`QuotaTracker`], so concurrent calls see the
/// same server-reported quota.
pub struct AdsClient {
    client: Client,
    token: String,
    base_url: String,
    page_size: usize,
    max_results: usize,
    retry: RetryConfig,
    rate_limit_default_wait: Duration,
    rate_limit_max_wait: Duration,
    quota: QuotaTracker,
}

impl AdsClient {
    /// Create a new ADS client with default settings
    ///
    /// Fails with an authentication error when no token is given, before
    /// any request is made.
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Self::with_client(client, token)
    }

    /// Create a new client with an existing reqwest client
    pub fn with_client(client: Client, token: Option<String>) -> Result<Self> {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CitationError::Authentication("no ADS API token configured".into()))?;

        Ok(Self {
            client,
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 200,
            max_results: 2000,
            retry: RetryConfig::default(),
            rate_limit_default_wait: Duration::from_secs(5),
            rate_limit_max_wait: Duration::from_secs(300),
            quota: QuotaTracker::new(),
        })
    }

    /// Create a client from run configuration
    pub fn from_config(config: &CitationsConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self::with_client(client, config.resolve_token())?
            .with_base_url(&config.base_url)
            .with_paging(config.page_size, config.max_results)
            .with_retry(config.retry_config())
            .with_rate_limit(
                Duration::from_millis(config.rate_limit.default_wait_ms),
                Duration::from_secs(config.rate_limit.max_wait_secs),
            ))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_paging(mut self, page_size: usize, max_results: usize) -> Self {
        self.page_size = page_size.max(1);
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// # Arguments
    /// * `default_wait` - Wait after a rate-limit response without a reset time
    /// * `max_wait` - Cap on any quota-related wait
    pub fn with_rate_limit(mut self, default_wait: Duration, max_wait: Duration) -> Self {
        self.rate_limit_default_wait = default_wait;
        self.rate_limit_max_wait = max_wait;
        self
    }

    /// Handle to the shared quota counter
    pub fn quota_tracker(&self) -> QuotaTracker {
        self.quota.clone()
    }

    /// Distinct bibcodes of all papers citing `seed`, in the order first received
    #[instrument(skip(self))]
    pub async fn citing_bibcodes(&self, seed: &SeedIdentifier) -> Result<Vec<String>> {
        let query = urlencoding::encode(&format!("citations(bibcode:{})", seed)).into_owned();
        let sort = urlencoding::encode("bibcode asc").into_owned();
        let target = seed.to_string();

        let mut bibcodes: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor = FIRST_CURSOR.to_string();
        let mut pages = 0;

        loop {
            let rows = self.page_size.min(self.max_results - bibcodes.len());
            let url = format!(
                "{}/search/query?q={}&fl=bibcode&rows={}&sort={}&cursorMark={}",
                self.base_url,
                query,
                rows,
                sort,
                urlencoding::encode(&cursor)
            );

            let response: SearchResponse = self.send_json(&target, |client| client.get(&url)).await?;
            let page = response
                .into_page()
                .map_err(|reason| CitationError::ResponseFormat {
                    target: target.clone(),
                    reason,
                })?;

            pages += 1;
            let received = page.bibcodes.len();
            for bibcode in page.bibcodes {
                // Pages may overlap; only distinct works count towards numFound
                if seen.insert(bibcode_key(&bibcode)) {
                    bibcodes.push(bibcode);
                }
            }
            debug!("Page {} for {}: {} bibcodes ({} distinct)", pages, seed, received, bibcodes.len());

            if bibcodes.len() >= self.max_results {
                if page.num_found.is_some_and(|n| n > self.max_results) {
                    warn!(
                        "{} has {} citations; keeping the first {}",
                        seed,
                        page.num_found.unwrap_or_default(),
                        self.max_results
                    );
                }
                bibcodes.truncate(self.max_results);
                break;
            }

            if received == 0 || page.num_found.is_some_and(|n| bibcodes.len() >= n) {
                break;
            }

            match page.next_cursor {
                Some(next) if next != cursor => cursor = next,
                _ => break,
            }
        }

        Ok(bibcodes)
    }

    /// BibTeX export for one bibcode
    #[instrument(skip(self))]
    pub async fn export_bibtex(&self, bibcode: &str) -> Result<String> {
        let url = format!("{}/export/bibtex", self.base_url);
        let body = json!({ "bibcode": [bibcode] });

        let response: ExportResponse = self
            .send_json(bibcode, |client| client.post(&url).json(&body))
            .await?;

        let export = response.export.ok_or_else(|| CitationError::ResponseFormat {
            target: bibcode.to_string(),
            reason: "missing 'export' field".into(),
        })?;

        if export.trim().is_empty() {
            return Err(CitationError::NotFound {
                target: bibcode.to_string(),
            });
        }

        Ok(export)
    }

    /// Send a request with retry and rate-limit handling, decoding JSON
    async fn send_json<T, B>(&self, target: &str, build: B) -> Result<T>
    where
        T: DeserializeOwned + Send,
        B: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let build = &build;

        let result = with_retry(
            &self.retry,
            &format!("ADS request for {}", target),
            move || self.send_rate_limited(target, build),
            |e: &CitationError| e.is_transient(),
        )
        .await;

        match result {
            Err(CitationError::TransientFetch { target, reason, .. }) => {
                Err(CitationError::TransientFetch {
                    target,
                    attempts: self.retry.max_attempts(),
                    reason,
                })
            }
            other => other,
        }
    }

    /// One logical request: a rate-limit response is retried once
    async fn send_rate_limited<T, B>(&self, target: &str, build: &B) -> Result<T>
    where
        T: DeserializeOwned + Send,
        B: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut rate_limited = false;

        loop {
            self.quota.wait_for_quota(self.rate_limit_max_wait).await;

            match self.send_once(target, build).await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::RateLimited(_) if rate_limited => {
                    return Err(CitationError::RateLimitExceeded {
                        target: target.to_string(),
                    });
                }
                Attempt::RateLimited(reset_at) => {
                    rate_limited = true;
                    let wait = rate_limit_wait(
                        reset_at,
                        Utc::now(),
                        self.rate_limit_default_wait,
                        self.rate_limit_max_wait,
                    );
                    warn!("Rate limited on {}; retrying in {:?}", target, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn send_once<T, B>(&self, target: &str, build: &B) -> Result<Attempt<T>>
    where
        T: DeserializeOwned,
        B: Fn(&Client) -> RequestBuilder,
    {
        let transient = |reason: String| CitationError::TransientFetch {
            target: target.to_string(),
            attempts: 1,
            reason,
        };

        let resp = build(&self.client)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transient(format!("request failed: {}", e)))?;

        self.quota.record(resp.headers()).await;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let (_, _, reset_at) = parse_quota_headers(resp.headers());
            return Ok(Attempt::RateLimited(reset_at));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CitationError::Authentication(format!(
                "ADS rejected the token (status: {})",
                status
            )));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(CitationError::NotFound {
                target: target.to_string(),
            });
        }
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            return Err(transient(format!("status: {}", status)));
        }
        if !status.is_success() {
            return Err(CitationError::ResponseFormat {
                target: target.to_string(),
                reason: format!("unexpected status: {}", status),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| transient(format!("read failed: {}", e)))?;

        serde_json::from_str(&body)
            .map(Attempt::Done)
            .map_err(|e| CitationError::ResponseFormat {
                target: target.to_string(),
                reason: format!("parse failed: {}", e),
            })
    }
}

#[async_trait]
impl RecordSource for AdsClient {
    async fn search(&self, seed: &SeedIdentifier) -> Result<Vec<String>> {
        self.citing_bibcodes(seed).await
    }

    async fn export(&self, identifier: &CitingWorkIdentifier) -> Result<BibliographicEntry> {
        let text = self.export_bibtex(identifier.as_str()).await?;
        Ok(BibliographicEntry::new(identifier.clone(), &text))
    }

    async fn quota(&self) -> Option<QuotaSnapshot> {
        Some(self.quota.snapshot().await)
    }
}
