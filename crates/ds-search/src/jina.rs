//! Jina search client: one request returns search hits with scraped content.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use ds_core::{Error, Page, SearchProvider, SearchResult, Service};

// =============================================================================
// Configuration
// =============================================================================

pub const DEFAULT_BASE_URL: &str = "https://s.jina.ai/";

/// Configuration for the Jina search API
#[derive(Clone, Debug)]
pub struct JinaConfig {
    /// Bearer token for the API
    pub api_key: String,
    /// Endpoint (e.g., "https://s.jina.ai/")
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl JinaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

// =============================================================================
// Search client
// =============================================================================

pub struct JinaSearch {
    client: Client,
    config: JinaConfig,
}

impl JinaSearch {
    pub fn new(config: JinaConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("deepsearch/", env!("CARGO_PKG_VERSION")))
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    async fn fetch(&self, query: &str, num_pages: usize) -> Result<SearchResult, Error> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("q", query.to_string()), ("num", num_pages.to_string())])
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("X-Retain-Images", "none")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(e.to_string())
                } else {
                    Error::network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(Service::Search, status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response: {}", e)))?;

        parse_response(query, &body)
    }
}

#[derive(Deserialize)]
struct JinaResponse {
    data: Vec<JinaPage>,
    meta: JinaMeta,
}

#[derive(Deserialize)]
struct JinaPage {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    usage: JinaUsage,
}

#[derive(Deserialize)]
struct JinaMeta {
    usage: JinaUsage,
}

#[derive(Deserialize, Default)]
struct JinaUsage {
    #[serde(default)]
    tokens: u64,
}

fn parse_response(query: &str, body: &str) -> Result<SearchResult, Error> {
    let parsed: JinaResponse = serde_json::from_str(body)
        .map_err(|e| Error::serialization(format!("Failed to parse search response: {}", e)))?;

    let pages = parsed
        .data
        .into_iter()
        .map(|p| {
            Page::new(p.url, p.title, p.description, p.content).with_provider_tokens(p.usage.tokens)
        })
        .collect();

    Ok(SearchResult::succeeded(query, pages, parsed.meta.usage.tokens))
}

#[async_trait]
impl SearchProvider for JinaSearch {
    fn name(&self) -> &str {
        "jina"
    }

    async fn search(&self, query: &str, num_pages: usize) -> SearchResult {
        info!(query = %query, num_pages, "Calling Jina search");

        match self.fetch(query, num_pages).await {
            Ok(result) => {
                info!(
                    pages = result.pages.len(),
                    tokens = result.provider_token_cost,
                    "Jina search returned"
                );
                result
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Jina search failed");
                SearchResult::failed(query)
            }
        }
    }
}
