//! External collaborators behind the tools
//!
//! Each collaborator sits behind a trait so the agent can run against
//! test doubles.

pub mod finnhub;
pub mod firecrawl;
pub mod watchlist_store;

pub use finnhub::{FinnhubClient, MarketDataProvider, NewsArticle, StockProfile, StockQuote};
pub use firecrawl::{ContentFetcher, FirecrawlClient, ScrapedPage};
pub use watchlist_store::{PgWatchlistStore, WatchlistItem, WatchlistStore};
