//! Runtime configuration loaded from the environment
//!
//! Missing tool credentials are not a startup error: the affected tool
//! reports a failure when it is called and everything else keeps working.

use crate::tools::web::MAX_ANALYSIS_SOURCES;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
pub const DEFAULT_FIRECRAWL_BASE_URL: &str = "https://api.firecrawl.dev";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub temperature: f32,
    pub finnhub_api_key: Option<String>,
    pub finnhub_base_url: String,
    pub firecrawl_api_key: Option<String>,
    pub firecrawl_base_url: String,
    pub database_url: Option<String>,
    pub max_iterations: Option<usize>,
    pub analysis_max_sources: usize,
    pub http_timeout: Duration,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: 0.1,
            finnhub_api_key: None,
            finnhub_base_url: DEFAULT_FINNHUB_BASE_URL.to_string(),
            firecrawl_api_key: None,
            firecrawl_base_url: DEFAULT_FIRECRAWL_BASE_URL.to_string(),
            database_url: None,
            max_iterations: None,
            analysis_max_sources: 2,
            http_timeout: Duration::from_secs(30),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            temperature: parse_or("GEMINI_TEMPERATURE", get("GEMINI_TEMPERATURE"), defaults.temperature),
            finnhub_api_key: get("FINNHUB_API_KEY"),
            finnhub_base_url: get("FINNHUB_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.finnhub_base_url),
            firecrawl_api_key: get("FIRECRAWL_API_KEY"),
            firecrawl_base_url: get("FIRECRAWL_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.firecrawl_base_url),
            database_url: get("POSTGRES_URL").or_else(|| get("DATABASE_URL")),
            max_iterations: get("AGENT_MAX_ITERATIONS")
                .and_then(|v| parse_opt("AGENT_MAX_ITERATIONS", &v))
                .filter(|n: &usize| *n > 0),
            analysis_max_sources: bounded_sources(parse_or(
                "ANALYSIS_MAX_SOURCES",
                get("ANALYSIS_MAX_SOURCES"),
                defaults.analysis_max_sources,
            )),
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                get("HTTP_TIMEOUT_SECS"),
                defaults.http_timeout.as_secs(),
            )),
            port: parse_or("PORT", get("PORT").or_else(|| get("API_PORT")), defaults.port),
        }
    }
}

fn parse_opt<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

/// Analysis fetches between one and [`MAX_ANALYSIS_SOURCES`] sites.
fn bounded_sources(requested: usize) -> usize {
    let bounded = requested.clamp(1, MAX_ANALYSIS_SOURCES);
    if bounded != requested {
        warn!(
            requested,
            used = bounded,
            "ANALYSIS_MAX_SOURCES out of range"
        );
    }
    bounded
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    raw.and_then(|v| parse_opt(key, &v)).unwrap_or(default)
}
