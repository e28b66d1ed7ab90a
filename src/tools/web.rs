//! `web_scrape` and `financial_analysis`

use super::{not_configured, AnalysisArgs};
use crate::models::ToolOutput;
use crate::providers::firecrawl::truncate_chars;
use crate::providers::ContentFetcher;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

/// Character cap for one scraped page.
pub const SCRAPE_MAX_CHARS: usize = 5_000;

/// Character cap for each analysis-site block.
pub const ANALYSIS_MAX_CHARS: usize = 2_000;

/// Sites fetched per analysis call unless configured otherwise.
pub const DEFAULT_ANALYSIS_SOURCES: usize = 2;

/// Upper bound on analysis sites fetched per call.
pub const MAX_ANALYSIS_SOURCES: usize = 2;

const FETCHER: &str = "Content fetch service (FIRECRAWL_API_KEY)";

pub async fn web_scrape(fetcher: Option<&dyn ContentFetcher>, url: &str) -> ToolOutput {
    let result = match fetcher {
        Some(fetcher) => fetcher.scrape(url).await,
        None => Err(not_configured(FETCHER)),
    };

    match result {
        Ok(page) => ToolOutput::success(
            json!({
                "content": truncate_chars(page.content(), SCRAPE_MAX_CHARS),
                "url": url,
            }),
            format!("Successfully scraped content from {}", url),
        ),
        Err(e) => ToolOutput::failure(e, format!("Failed to scrape content from {}", url)),
    }
}

#[derive(Debug, Serialize)]
struct AnalysisSource {
    url: String,
    content: String,
    source: String,
}

/// Canonical analysis pages for a ticker or topic.
pub fn analysis_urls(target: &str) -> [String; 3] {
    [
        format!("https://finance.yahoo.com/quote/{}", target),
        format!("https://www.marketwatch.com/investing/stock/{}", target),
        format!("https://seekingalpha.com/symbol/{}", target),
    ]
}

/// Fetch up to `max_sources` analysis sites (at most
/// [`MAX_ANALYSIS_SOURCES`]) one after another. A site that fails or has no
/// markdown rendition is left out; the call itself still succeeds.
pub async fn financial_analysis(
    fetcher: Option<&dyn ContentFetcher>,
    args: &AnalysisArgs,
    max_sources: usize,
) -> ToolOutput {
    let target = args.symbol.as_deref().unwrap_or(&args.query);

    let Some(fetcher) = fetcher else {
        return ToolOutput::failure(
            not_configured(FETCHER),
            format!("Failed to get financial analysis for {}", target),
        );
    };

    let mut results = Vec::new();
    let sources = max_sources.clamp(1, MAX_ANALYSIS_SOURCES);
    for url in analysis_urls(target).into_iter().take(sources) {
        match fetcher.scrape(&url).await {
            Ok(page) => {
                let Some(content) = page.markdown() else {
                    warn!(url = %url, "Analysis source returned no markdown");
                    continue;
                };
                let source = reqwest::Url::parse(&url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_default();
                results.push(AnalysisSource {
                    content: truncate_chars(content, ANALYSIS_MAX_CHARS),
                    url,
                    source,
                });
            }
            Err(e) => warn!(url = %url, error = %e, "Failed to scrape analysis source"),
        }
    }

    let message = format!(
        "Found {} financial analysis sources for {}",
        results.len(),
        target
    );

    ToolOutput::success(
        json!({
            "results": results,
            "query": args.query,
            "symbol": args.symbol,
        }),
        message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeFetcher;

    fn analysis(query: &str, symbol: Option<&str>) -> AnalysisArgs {
        AnalysisArgs {
            query: query.to_string(),
            symbol: symbol.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_scrape_is_capped() {
        let fetcher = FakeFetcher::new().with_page("https://example.com/long", &"x".repeat(12_000));
        let output = web_scrape(Some(&fetcher), "https://example.com/long").await;

        assert!(output.success);
        let content = output.data["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), SCRAPE_MAX_CHARS);
        assert_eq!(output.data["url"], "https://example.com/long");
    }

    #[tokio::test]
    async fn test_scrape_failure_message() {
        let fetcher = FakeFetcher::new();
        let output = web_scrape(Some(&fetcher), "https://example.com/missing").await;
        assert!(!output.success);
        assert_eq!(output.message, "Failed to scrape content from https://example.com/missing");
    }

    #[tokio::test]
    async fn test_analysis_takes_two_capped_sources() {
        let long = "y".repeat(9_000);
        let fetcher = FakeFetcher::new()
            .with_page("https://finance.yahoo.com/quote/AAPL", &long)
            .with_page("https://www.marketwatch.com/investing/stock/AAPL", &long)
            .with_page("https://seekingalpha.com/symbol/AAPL", &long);

        let output = financial_analysis(
            Some(&fetcher),
            &analysis("earnings", Some("AAPL")),
            DEFAULT_ANALYSIS_SOURCES,
        )
        .await;

        assert!(output.success);
        let results = output.data["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        for result in results {
            assert!(result["content"].as_str().unwrap().chars().count() <= ANALYSIS_MAX_CHARS);
        }
        assert_eq!(results[0]["source"], "finance.yahoo.com");
        assert_eq!(fetcher.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_analysis_swallows_site_failures() {
        // Only the second site answers.
        let fetcher = FakeFetcher::new()
            .with_page("https://www.marketwatch.com/investing/stock/semiconductors", "chip stocks");

        let output = financial_analysis(
            Some(&fetcher),
            &analysis("semiconductors", None),
            DEFAULT_ANALYSIS_SOURCES,
        )
        .await;

        assert!(output.success);
        assert_eq!(output.data["results"].as_array().unwrap().len(), 1);
        assert_eq!(output.message, "Found 1 financial analysis sources for semiconductors");
        assert!(output.data["symbol"].is_null());
    }

    #[tokio::test]
    async fn test_analysis_without_fetcher_fails() {
        let output = financial_analysis(None, &analysis("q", Some("AAPL")), 2).await;
        assert!(!output.success);
        assert_eq!(output.message, "Failed to get financial analysis for AAPL");
    }

    #[tokio::test]
    async fn test_analysis_never_exceeds_two_sources() {
        let fetcher = FakeFetcher::new()
            .with_page("https://finance.yahoo.com/quote/MSFT", "a")
            .with_page("https://www.marketwatch.com/investing/stock/MSFT", "b")
            .with_page("https://seekingalpha.com/symbol/MSFT", "c");

        let output = financial_analysis(Some(&fetcher), &analysis("cloud", Some("MSFT")), 3).await;
        assert_eq!(output.data["results"].as_array().unwrap().len(), 2);

        let output = financial_analysis(Some(&fetcher), &analysis("cloud", Some("MSFT")), 0).await;
        assert_eq!(output.data["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analysis_skips_html_only_pages() {
        let fetcher = FakeFetcher::new()
            .with_html_page("https://finance.yahoo.com/quote/AMD", "<p>html only</p>")
            .with_page("https://www.marketwatch.com/investing/stock/AMD", "## AMD outlook");

        let output = financial_analysis(
            Some(&fetcher),
            &analysis("gpus", Some("AMD")),
            DEFAULT_ANALYSIS_SOURCES,
        )
        .await;

        let results = output.data["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["content"], "## AMD outlook");
        assert_eq!(fetcher.requested().len(), 2);

        // Plain scraping still falls back to html.
        let output = web_scrape(Some(&fetcher), "https://finance.yahoo.com/quote/AMD").await;
        assert_eq!(output.data["content"], "<p>html only</p>");
    }
}
