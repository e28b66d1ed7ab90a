//! Test doubles shared by the unit tests

use crate::error::AgentError;
use crate::gemini::ModelInvoker;
use crate::models::{Message, ToolDescriptor};
use crate::providers::{
    ContentFetcher, MarketDataProvider, NewsArticle, ScrapedPage, StockProfile, StockQuote,
    WatchlistItem, WatchlistStore,
};
use crate::tools::{ToolBackends, ToolRegistry};
use crate::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// Model that replays a fixed script of replies.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Message>>>,
    calls: AtomicUsize,
    history_lengths: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<Message>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            history_lengths: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// History length seen by each call, in order.
    pub fn history_lengths(&self) -> Vec<usize> {
        self.history_lengths.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    async fn invoke(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<Message> {
        assert_eq!(tools.len(), 6);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.history_lengths.lock().unwrap().push(history.len());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::ModelInvocation("script exhausted".into())))
    }
}

/// Watchlist store held in memory.
#[derive(Default)]
pub struct InMemoryWatchlistStore {
    users_by_email: Arc<RwLock<HashMap<String, String>>>,
    items: Arc<RwLock<Vec<WatchlistItem>>>,
}

impl InMemoryWatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: &str, email: &str) {
        let mut users = self.users_by_email.write().await;
        users.insert(email.to_lowercase(), user_id.to_string());
    }

    pub async fn add_item(&self, item: WatchlistItem) {
        self.items.write().await.push(item);
    }
}

#[async_trait]
impl WatchlistStore for InMemoryWatchlistStore {
    async fn items_for_user(&self, user_id: &str) -> Result<Vec<WatchlistItem>> {
        let items = self.items.read().await;
        let mut found: Vec<WatchlistItem> = items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(found)
    }

    async fn user_id_for_email(&self, email: &str) -> Result<Option<String>> {
        let users = self.users_by_email.read().await;
        Ok(users.get(&email.to_lowercase()).cloned())
    }
}

/// `u1` / `ada@example.com` tracking AAPL then TSLA.
pub async fn seeded_watchlist() -> InMemoryWatchlistStore {
    let store = InMemoryWatchlistStore::new();
    store.add_user("u1", "ada@example.com").await;
    for (symbol, company, day) in [("AAPL", "Apple Inc", 1), ("TSLA", "Tesla Inc", 2)] {
        store
            .add_item(WatchlistItem {
                user_id: "u1".into(),
                symbol: symbol.into(),
                company: company.into(),
                added_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            })
            .await;
    }
    store
}

/// Market data keyed off magic symbols: `NOPE` is unknown, `FAIL` errors,
/// `PANIC` panics on quote and `SLOW` answers late.
#[derive(Default)]
pub struct FakeMarketData {
    requested: tokio::sync::Mutex<Vec<String>>,
}

impl FakeMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn requested_symbols(&self) -> Vec<String> {
        self.requested.lock().await.clone()
    }

    async fn record(&self, symbol: &str) -> Result<()> {
        self.requested.lock().await.push(symbol.to_string());
        match symbol {
            "FAIL" => Err(AgentError::ToolExecution(format!("upstream error for {}", symbol))),
            "SLOW" => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for FakeMarketData {
    async fn profile(&self, symbol: &str) -> Result<Option<StockProfile>> {
        self.record(symbol).await?;
        if symbol == "NOPE" {
            return Ok(None);
        }
        Ok(Some(StockProfile {
            name: Some(format!("{} Corp", symbol)),
            ticker: Some(symbol.to_string()),
            ..StockProfile::default()
        }))
    }

    async fn quote(&self, symbol: &str) -> Result<Option<StockQuote>> {
        self.record(symbol).await?;
        match symbol {
            "NOPE" => Ok(None),
            "PANIC" => panic!("quote feed crashed"),
            _ => Ok(Some(StockQuote {
                symbol: symbol.to_string(),
                current_price: 101.5,
                change: Some(1.5),
                percent_change: Some(1.5),
                high: 102.0,
                low: 99.0,
                open: 100.0,
                previous_close: 100.0,
                timestamp: 1_710_000_000,
            })),
        }
    }

    async fn news(&self, symbols: &[String]) -> Result<Vec<NewsArticle>> {
        let article = |headline: String| NewsArticle {
            headline,
            source: "Wire".into(),
            url: "https://news.example.com/story".into(),
            datetime: 1_710_000_000,
            ..NewsArticle::default()
        };

        if symbols.is_empty() {
            return Ok(vec![article("Markets open higher".into())]);
        }
        Ok(symbols
            .iter()
            .map(|symbol| article(format!("{} beats estimates", symbol)))
            .collect())
    }
}

/// Serves canned pages; any other URL fails.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, ScrapedPage>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page with a markdown rendition.
    pub fn with_page(mut self, url: &str, markdown: &str) -> Self {
        self.pages
            .insert(url.to_string(), ScrapedPage::from_markdown(markdown));
        self
    }

    pub fn with_html_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), ScrapedPage::from_html(html));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AgentError::ToolExecution(format!("404 for {}", url)))
    }
}

pub struct Fakes {
    pub market: Arc<FakeMarketData>,
    pub fetcher: Arc<FakeFetcher>,
    pub watchlist: Arc<InMemoryWatchlistStore>,
}

/// Registry wired to fresh fakes, returned alongside them for inspection.
pub async fn registry_with_fakes() -> (ToolRegistry, Fakes) {
    let fakes = Fakes {
        market: Arc::new(FakeMarketData::new()),
        fetcher: Arc::new(
            FakeFetcher::new().with_page("https://example.com/report", "Quarterly report"),
        ),
        watchlist: Arc::new(seeded_watchlist().await),
    };

    let registry = ToolRegistry::new(ToolBackends {
        watchlist: Some(fakes.watchlist.clone()),
        market: Some(fakes.market.clone()),
        fetcher: Some(fakes.fetcher.clone()),
        ..ToolBackends::default()
    });

    (registry, fakes)
}
