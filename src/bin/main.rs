use market_chat_agent::{AppConfig, ChatAgent, ConversationState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env();
    let agent = ChatAgent::from_config(&config)?;
    let mut state = ConversationState::new();

    info!("Market chat started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Ask about stocks, quotes or your watchlist. Type 'exit' to quit.\n")
        .await?;

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                state = ConversationState::new();
                stdout.write_all(b"Conversation cleared.\n").await?;
                continue;
            }
            _ => {}
        }

        match agent.run_turn(&mut state, input).await {
            Ok(outcome) => {
                stdout
                    .write_all(format!("\n{}\n", outcome.final_message.content).as_bytes())
                    .await?;
            }
            Err(e) => {
                error!(error = %e, "Turn failed");
                stdout
                    .write_all(format!("\nSorry, that request failed: {}\n", e).as_bytes())
                    .await?;
            }
        }
    }

    info!(messages = state.len(), "Market chat ended");
    Ok(())
}
