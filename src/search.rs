//! Remote snippet-search collaborators.
//!
//! Two services look up submitted code on the public internet:
//!
//! - **[`GithubCodeSearch`]** — code-hosting search; returns repositories
//!   containing the snippet.
//! - **[`StackExchangeSearch`]** — Q&A-site search; returns questions whose
//!   body matches the snippet.
//!
//! Both implement [`SnippetSearch`] and are held by a [`SearchRegistry`] in
//! the order their matches are concatenated into the report. Credentials are
//! read from the environment at registry construction and passed into the
//! service constructors; they never live in the config file.
//!
//! # Retry Strategy
//!
//! Transient failures are retried with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, GithubSearchConfig, StackExchangeSearchConfig};
use crate::models::SimilarityMatch;

/// Longest snippet text sent as a search query. Both services reject or
/// mangle very long query strings, so representative content is clipped.
const MAX_QUERY_CHARS: usize = 256;

/// Error surface of a remote search call.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),
}

/// A remote service that searches for a code snippet.
///
/// Implementations perform network I/O on the tokio runtime. A failure is
/// recovered by the analyzer (the service contributes zero matches), so
/// implementations should surface errors rather than swallow them.
#[async_trait]
pub trait SnippetSearch: Send + Sync {
    /// Returns the service name used in logs and the services listing.
    fn name(&self) -> &str;

    /// Search for the snippet and return ranked matches, best first.
    async fn search(&self, snippet: &str) -> Result<Vec<SimilarityMatch>, SearchError>;
}

// ============ GitHub Code Search ============

/// Snippet search against the GitHub code-search API.
///
/// Requires the `GITHUB_TOKEN` environment variable. Each match maps to the
/// containing repository's URL plus the file path within it.
pub struct GithubCodeSearch {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    max_results: usize,
    max_retries: u32,
}

impl GithubCodeSearch {
    pub fn new(
        config: &GithubSearchConfig,
        token: String,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token,
            max_results: config.max_results,
            max_retries,
        })
    }

    /// Create the service with the token taken from `GITHUB_TOKEN`.
    pub fn from_env(
        config: &GithubSearchConfig,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, SearchError> {
        let token = std::env::var("GITHUB_TOKEN")
            .map_err(|_| SearchError::MissingCredential("GITHUB_TOKEN"))?;
        Self::new(config, token, timeout_secs, max_retries)
    }
}

#[async_trait]
impl SnippetSearch for GithubCodeSearch {
    fn name(&self) -> &str {
        "github"
    }

    async fn search(&self, snippet: &str) -> Result<Vec<SimilarityMatch>, SearchError> {
        let query = format!("\"{}\"", truncate_query(snippet));
        let per_page = self.max_results.to_string();

        let request = self
            .client
            .get(format!("{}/search/code", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "originscan")
            .query(&[("q", query.as_str()), ("per_page", per_page.as_str())]);

        let json = send_with_retry(request, self.max_retries).await?;
        parse_github_items(&json, self.max_results)
    }
}

/// Extract matches from a GitHub code-search response body.
fn parse_github_items(json: &Value, max_results: usize) -> Result<Vec<SimilarityMatch>, SearchError> {
    let items = json
        .get("items")
        .and_then(|i| i.as_array())
        .ok_or_else(|| SearchError::Malformed("missing items array".to_string()))?;

    let matches = items
        .iter()
        .take(max_results)
        .filter_map(|item| {
            let repo_url = item
                .pointer("/repository/html_url")
                .and_then(|u| u.as_str())
                .or_else(|| item.get("html_url").and_then(|u| u.as_str()))?;
            let path = item.get("path").and_then(|p| p.as_str()).unwrap_or("");
            let score = item.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0);
            Some(SimilarityMatch {
                source_location: repo_url.to_string(),
                label: path.to_string(),
                score,
            })
        })
        .collect();

    Ok(matches)
}

// ============ Stack Exchange Search ============

/// Snippet search against the Stack Exchange search API.
///
/// Works unauthenticated at a reduced quota; an application key from
/// `STACKEXCHANGE_KEY` raises the quota when present. Each match maps to a
/// question link and title.
pub struct StackExchangeSearch {
    client: reqwest::Client,
    endpoint: String,
    site: String,
    key: Option<String>,
    max_results: usize,
    max_retries: u32,
}

impl StackExchangeSearch {
    pub fn new(
        config: &StackExchangeSearchConfig,
        key: Option<String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            site: config.site.clone(),
            key,
            max_results: config.max_results,
            max_retries,
        })
    }

    /// Create the service with the optional app key from `STACKEXCHANGE_KEY`.
    pub fn from_env(
        config: &StackExchangeSearchConfig,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, SearchError> {
        let key = std::env::var("STACKEXCHANGE_KEY").ok();
        Self::new(config, key, timeout_secs, max_retries)
    }
}

#[async_trait]
impl SnippetSearch for StackExchangeSearch {
    fn name(&self) -> &str {
        "stackexchange"
    }

    async fn search(&self, snippet: &str) -> Result<Vec<SimilarityMatch>, SearchError> {
        let query = truncate_query(snippet);

        let mut params = vec![
            ("order".to_string(), "desc".to_string()),
            ("sort".to_string(), "relevance".to_string()),
            ("q".to_string(), query.to_string()),
            ("site".to_string(), self.site.clone()),
            ("pagesize".to_string(), self.max_results.to_string()),
        ];
        if let Some(key) = &self.key {
            params.push(("key".to_string(), key.clone()));
        }

        let request = self
            .client
            .get(format!("{}/2.3/search/advanced", self.endpoint))
            .query(&params);

        let json = send_with_retry(request, self.max_retries).await?;
        parse_stackexchange_items(&json, self.max_results)
    }
}

/// Extract matches from a Stack Exchange search response body.
fn parse_stackexchange_items(
    json: &Value,
    max_results: usize,
) -> Result<Vec<SimilarityMatch>, SearchError> {
    let items = json
        .get("items")
        .and_then(|i| i.as_array())
        .ok_or_else(|| SearchError::Malformed("missing items array".to_string()))?;

    let matches = items
        .iter()
        .take(max_results)
        .filter_map(|item| {
            let link = item.get("link").and_then(|l| l.as_str())?;
            let title = item.get("title").and_then(|t| t.as_str()).unwrap_or("");
            let score = item.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0);
            Some(SimilarityMatch {
                source_location: link.to_string(),
                label: title.to_string(),
                score,
            })
        })
        .collect();

    Ok(matches)
}

// ============ Shared plumbing ============

/// Send a request with exponential backoff on transient failures and
/// return the response body as JSON.
async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
) -> Result<Value, SearchError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let req = request
            .try_clone()
            .ok_or_else(|| SearchError::Malformed("request is not retryable".to_string()))?;

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| SearchError::Malformed(e.to_string()));
                }

                let body = response.text().await.unwrap_or_default();

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(SearchError::Api {
                        status: status.as_u16(),
                        message: body,
                    });
                    continue;
                }

                // Client error (not 429) — don't retry
                return Err(SearchError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| SearchError::Malformed("search failed after retries".to_string())))
}

/// Clip snippet text to the query-length cap on a character boundary.
fn truncate_query(snippet: &str) -> &str {
    match snippet.char_indices().nth(MAX_QUERY_CHARS) {
        Some((idx, _)) => &snippet[..idx],
        None => snippet,
    }
}

// ============ Registry ============

/// The enabled search services, in match-concatenation order.
///
/// Built from config plus environment credentials. A service whose
/// credential is missing is skipped with a warning — it simply contributes
/// zero matches, like any other failed collaborator.
pub struct SearchRegistry {
    services: Vec<Box<dyn SnippetSearch>>,
}

impl SearchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
        }
    }

    /// Create a registry with the configured services: code-hosting search
    /// first, Q&A-site search second.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        let timeout = config.search.timeout_secs;
        let retries = config.search.max_retries;

        if config.search.github.enabled {
            match GithubCodeSearch::from_env(&config.search.github, timeout, retries) {
                Ok(service) => registry.register(Box::new(service)),
                Err(e) => tracing::warn!("github search disabled: {}", e),
            }
        }

        if config.search.stackexchange.enabled {
            match StackExchangeSearch::from_env(&config.search.stackexchange, timeout, retries) {
                Ok(service) => registry.register(Box::new(service)),
                Err(e) => tracing::warn!("stackexchange search disabled: {}", e),
            }
        }

        registry
    }

    /// Register a service. Registration order is concatenation order.
    pub fn register(&mut self, service: Box<dyn SnippetSearch>) {
        self.services.push(service);
    }

    /// All registered services, in order.
    pub fn services(&self) -> &[Box<dyn SnippetSearch>] {
        &self.services
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
