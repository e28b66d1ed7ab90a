//! Firecrawl content-fetch service
//!
//! Scrapes one URL and returns its markdown and html renditions.

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Fetches a page and converts it to text.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage>;
}

/// Renditions of one scraped page. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub markdown: Option<String>,
    pub html: Option<String>,
}

impl ScrapedPage {
    pub fn from_markdown(markdown: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
            html: None,
        }
    }

    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            markdown: None,
            html: Some(html.into()),
        }
    }

    /// Markdown if present, else html, else empty.
    pub fn content(&self) -> &str {
        self.markdown()
            .or(self.html.as_deref())
            .unwrap_or_default()
    }

    /// Non-empty markdown only.
    pub fn markdown(&self) -> Option<&str> {
        self.markdown.as_deref().filter(|m| !m.is_empty())
    }
}

pub struct FirecrawlClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FirecrawlClient {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

impl ScrapeResponse {
    fn into_page(self) -> Result<ScrapedPage> {
        if !self.success {
            return Err(AgentError::ToolExecution(
                self.error.unwrap_or_else(|| "Failed to scrape URL".to_string()),
            ));
        }

        Ok(self
            .data
            .map(|d| ScrapedPage {
                markdown: d.markdown,
                html: d.html,
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContentFetcher for FirecrawlClient {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        let endpoint = format!("{}/v1/scrape", self.base_url);

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "url": url,
                "formats": ["markdown"],
            }))
            .send()
            .await
            .map_err(|e| AgentError::ToolExecution(format!("Firecrawl request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ToolExecution(format!(
                "Firecrawl returned {} for {}: {}",
                status, url, body
            )));
        }

        let scraped: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| AgentError::ToolExecution(format!("Invalid Firecrawl response: {}", e)))?;

        let page = scraped.into_page()?;
        debug!(
            url,
            chars = page.content().chars().count(),
            markdown = page.markdown().is_some(),
            "Scraped page"
        );
        Ok(page)
    }
}

/// Cut `content` to at most `max_chars` characters.
pub fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_index, _)) => content[..byte_index].to_string(),
        None => content.to_string(),
    }
}
