use market_chat_agent::{api::start_server, AppConfig, ChatAgent};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set; every chat turn will fail until it is configured");
    }

    info!("Market Chat Agent - API Server");
    info!("Port: {}", config.port);

    let agent = Arc::new(ChatAgent::from_config(&config)?);
    info!(
        tools = agent.registry().descriptors().len(),
        max_iterations = ?config.max_iterations,
        "Agent initialized"
    );

    start_server(agent, config.port).await?;

    Ok(())
}
