//! `get_user_watchlist`

use super::{not_configured, WatchlistArgs};
use crate::models::ToolOutput;
use crate::providers::watchlist_store::{symbols_for_email, WatchlistStore};
use crate::Result;
use serde_json::json;

/// Resolve a watchlist by email (through the account lookup) or by user id
/// (directly, newest first). Email wins when both are given.
pub async fn get_user_watchlist(
    store: Option<&dyn WatchlistStore>,
    args: &WatchlistArgs,
) -> ToolOutput {
    if args.email.is_none() && args.user_id.is_none() {
        return ToolOutput::failure(
            "No user identification provided",
            "Failed to retrieve watchlist - no user ID or email provided",
        );
    }

    match lookup(store, args).await {
        Ok(output) => output,
        Err(e) => ToolOutput::failure(e, "Failed to retrieve watchlist"),
    }
}

async fn lookup(store: Option<&dyn WatchlistStore>, args: &WatchlistArgs) -> Result<ToolOutput> {
    let store = store.ok_or_else(|| not_configured("Watchlist database"))?;

    if let Some(email) = &args.email {
        let symbols = symbols_for_email(store, email).await?;
        let message = format!(
            "Found {} symbols in watchlist: {}",
            symbols.len(),
            symbols.join(", ")
        );
        return Ok(ToolOutput::success(json!({ "symbols": symbols }), message));
    }

    let user_id = args.user_id.as_deref().unwrap_or_default();
    let items = store.items_for_user(user_id).await?;
    let message = format!("Retrieved {} items from user's watchlist", items.len());

    Ok(ToolOutput::success(json!({ "watchlist": items }), message))
}
