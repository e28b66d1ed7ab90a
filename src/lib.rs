//! Market Chat Agent
//!
//! A conversational stock-market assistant. Each user turn runs a control
//! loop in which the model either answers or asks for market tools:
//!
//! AGENT → (TOOLS → AGENT)* → DONE
//!
//! Tools cover the user's watchlist, company profiles, quotes, market news,
//! page scraping and analysis-site lookups.

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod gemini;
pub mod models;
pub mod providers;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::Result;

// Re-export common types
pub use agent::ChatAgent;
pub use config::AppConfig;
pub use models::*;
