//! `get_stock_profile`, `get_stock_quote` and `get_market_news`
//!
//! Symbols arrive already normalized by the dispatcher.

use super::not_configured;
use crate::models::ToolOutput;
use crate::providers::MarketDataProvider;
use serde_json::json;

const PROVIDER: &str = "Market data provider (FINNHUB_API_KEY)";

pub async fn get_stock_profile(provider: Option<&dyn MarketDataProvider>, symbol: &str) -> ToolOutput {
    let result = match provider {
        Some(provider) => provider.profile(symbol).await,
        None => Err(not_configured(PROVIDER)),
    };

    match result {
        Ok(profile) => {
            let message = if profile.is_some() {
                format!("Retrieved profile for {}", symbol)
            } else {
                format!("No profile found for {}", symbol)
            };
            ToolOutput::success(json!({ "profile": profile }), message)
        }
        Err(e) => ToolOutput::failure(e, format!("Failed to get profile for {}", symbol)),
    }
}

pub async fn get_stock_quote(provider: Option<&dyn MarketDataProvider>, symbol: &str) -> ToolOutput {
    let result = match provider {
        Some(provider) => provider.quote(symbol).await,
        None => Err(not_configured(PROVIDER)),
    };

    match result {
        Ok(quote) => {
            let message = if quote.is_some() {
                format!("Retrieved quote for {}", symbol)
            } else {
                format!("No quote found for {}", symbol)
            };
            ToolOutput::success(json!({ "quote": quote }), message)
        }
        Err(e) => ToolOutput::failure(e, format!("Failed to get quote for {}", symbol)),
    }
}

pub async fn get_market_news(
    provider: Option<&dyn MarketDataProvider>,
    symbols: Option<&[String]>,
) -> ToolOutput {
    let result = match provider {
        Some(provider) => provider.news(symbols.unwrap_or_default()).await,
        None => Err(not_configured(PROVIDER)),
    };

    match result {
        Ok(news) => {
            let scope = match symbols {
                Some(list) => format!(" for symbols: {}", list.join(", ")),
                None => String::new(),
            };
            let message = format!("Retrieved {} news articles{}", news.len(), scope);
            ToolOutput::success(json!({ "news": news }), message)
        }
        Err(e) => ToolOutput::failure(e, "Failed to retrieve market news"),
    }
}
