//! Finnhub market-data provider
//!
//! Company profiles, quotes and news over the Finnhub REST API.

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

/// Articles returned by one news lookup.
pub const MAX_NEWS_ARTICLES: usize = 6;

/// Days of company news considered for symbol-filtered lookups.
const COMPANY_NEWS_WINDOW_DAYS: i64 = 5;

/// Market data collaborator used by the profile, quote and news tools.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn profile(&self, symbol: &str) -> Result<Option<StockProfile>>;
    async fn quote(&self, symbol: &str) -> Result<Option<StockQuote>>;
    /// General market news when `symbols` is empty, company news otherwise.
    async fn news(&self, symbols: &[String]) -> Result<Vec<NewsArticle>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub finnhub_industry: Option<String>,
    #[serde(default)]
    pub ipo: Option<String>,
    #[serde(default)]
    pub market_capitalization: Option<f64>,
    #[serde(default)]
    pub share_outstanding: Option<f64>,
    #[serde(default)]
    pub weburl: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

impl StockProfile {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.ticker.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockQuote {
    pub symbol: String,
    pub current_price: f64,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub previous_close: f64,
    pub timestamp: i64,
}

/// Raw `/quote` payload.
#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    #[serde(default)]
    c: f64,
    d: Option<f64>,
    dp: Option<f64>,
    #[serde(default)]
    h: f64,
    #[serde(default)]
    l: f64,
    #[serde(default)]
    o: f64,
    #[serde(default)]
    pc: f64,
    #[serde(default)]
    t: i64,
}

impl FinnhubQuote {
    /// Finnhub answers unknown symbols with an all-zero quote.
    fn into_quote(self, symbol: &str) -> Option<StockQuote> {
        if self.c == 0.0 && self.t == 0 {
            return None;
        }
        Some(StockQuote {
            symbol: symbol.to_string(),
            current_price: self.c,
            change: self.d,
            percent_change: self.dp,
            high: self.h,
            low: self.l,
            open: self.o,
            previous_close: self.pc,
            timestamp: self.t,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewsArticle {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub datetime: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub related: Option<String>,
}

impl NewsArticle {
    fn is_valid(&self) -> bool {
        !self.headline.trim().is_empty() && !self.url.trim().is_empty() && self.datetime > 0
    }
}

#[derive(Clone)]
pub struct FinnhubClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FinnhubClient {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                AgentError::ToolExecution(format!("Finnhub request failed for {}: {}", path, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ToolExecution(format!(
                "Finnhub returned {} for {}: {}",
                status, path, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AgentError::ToolExecution(format!("Invalid Finnhub response: {}", e)))
    }

    async fn company_news(&self, symbol: &str, from: &str, to: &str) -> Result<Vec<NewsArticle>> {
        self.get_json(
            "/company-news",
            &[("symbol", symbol), ("from", from), ("to", to)],
        )
        .await
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubClient {
    async fn profile(&self, symbol: &str) -> Result<Option<StockProfile>> {
        let profile: StockProfile = self.get_json("/stock/profile2", &[("symbol", symbol)]).await?;
        Ok((!profile.is_empty()).then_some(profile))
    }

    async fn quote(&self, symbol: &str) -> Result<Option<StockQuote>> {
        let raw: FinnhubQuote = self.get_json("/quote", &[("symbol", symbol)]).await?;
        Ok(raw.into_quote(symbol))
    }

    async fn news(&self, symbols: &[String]) -> Result<Vec<NewsArticle>> {
        if symbols.is_empty() {
            let articles: Vec<NewsArticle> =
                self.get_json("/news", &[("category", "general")]).await?;
            return Ok(select_general_news(articles, MAX_NEWS_ARTICLES));
        }

        let today = Utc::now().date_naive();
        let from = (today - ChronoDuration::days(COMPANY_NEWS_WINDOW_DAYS)).to_string();
        let to = today.to_string();

        let lookups = symbols.iter().map(|symbol| {
            let (from, to) = (from.as_str(), to.as_str());
            async move {
                match self.company_news(symbol, from, to).await {
                    Ok(articles) => (symbol.clone(), articles),
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Company news lookup failed");
                        (symbol.clone(), Vec::new())
                    }
                }
            }
        });
        let per_symbol: HashMap<String, Vec<NewsArticle>> =
            join_all(lookups).await.into_iter().collect();

        let selected = select_company_news(symbols, per_symbol, MAX_NEWS_ARTICLES);
        debug!(symbols = symbols.len(), articles = selected.len(), "Company news selected");
        Ok(selected)
    }
}

/// First `limit` valid articles, deduplicated by url.
fn select_general_news(articles: Vec<NewsArticle>, limit: usize) -> Vec<NewsArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(NewsArticle::is_valid)
        .filter(|a| seen.insert(a.url.clone()))
        .take(limit)
        .collect()
}

/// Round-robin one article per symbol per round until `limit` is reached,
/// newest first in the final list.
fn select_company_news(
    symbols: &[String],
    mut per_symbol: HashMap<String, Vec<NewsArticle>>,
    limit: usize,
) -> Vec<NewsArticle> {
    let mut queues: Vec<VecDeque<NewsArticle>> = symbols
        .iter()
        .map(|s| {
            per_symbol
                .remove(s)
                .unwrap_or_default()
                .into_iter()
                .filter(NewsArticle::is_valid)
                .collect()
        })
        .collect();

    let mut collected = Vec::with_capacity(limit);
    let mut seen = HashSet::new();

    'rounds: for _ in 0..limit {
        let mut progressed = false;
        for queue in queues.iter_mut() {
            while let Some(article) = queue.pop_front() {
                if seen.insert(article.url.clone()) {
                    collected.push(article);
                    progressed = true;
                    break;
                }
            }
            if collected.len() >= limit {
                break 'rounds;
            }
        }
        if !progressed {
            break;
        }
    }

    collected.sort_by(|a, b| b.datetime.cmp(&a.datetime));
    collected
}
