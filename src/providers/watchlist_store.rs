//! Watchlist document store
//!
//! Read-only access to users' tracked symbols, backed by Postgres.

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub user_id: String,
    pub symbol: String,
    pub company: String,
    pub added_at: DateTime<Utc>,
}

#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Items tracked by `user_id`, most recently added first.
    async fn items_for_user(&self, user_id: &str) -> Result<Vec<WatchlistItem>>;

    /// Resolve an account email to its user id.
    async fn user_id_for_email(&self, email: &str) -> Result<Option<String>>;
}

/// Symbols tracked by the account behind `email`. Unknown emails yield an
/// empty list.
pub async fn symbols_for_email(store: &dyn WatchlistStore, email: &str) -> Result<Vec<String>> {
    let Some(user_id) = store.user_id_for_email(email).await? else {
        return Ok(Vec::new());
    };

    let items = store.items_for_user(&user_id).await?;
    Ok(items.into_iter().map(|item| item.symbol).collect())
}

//
// ================= Postgres =================
//

pub struct PgWatchlistStore {
    pool: PgPool,
}

impl PgWatchlistStore {
    /// Lazily connects; nothing touches the database until the first query.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                AgentError::Configuration(format!("Invalid watchlist database URL: {}", e))
            })?;

        info!("Watchlist store backend: postgres");
        Ok(Self { pool })
    }
}

#[async_trait]
impl WatchlistStore for PgWatchlistStore {
    async fn items_for_user(&self, user_id: &str) -> Result<Vec<WatchlistItem>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, symbol, company, added_at
            FROM watchlist
            WHERE user_id = $1
            ORDER BY added_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AgentError::Database(format!("Failed to load watchlist: {}", e)))?;

        rows.into_iter()
            .map(|row| -> Result<WatchlistItem> {
                Ok(WatchlistItem {
                    user_id: row.try_get("user_id")?,
                    symbol: row.try_get("symbol")?,
                    company: row
                        .try_get::<Option<String>, _>("company")?
                        .unwrap_or_default(),
                    added_at: row.try_get("added_at")?,
                })
            })
            .collect()
    }

    async fn user_id_for_email(&self, email: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT id FROM users WHERE LOWER(email) = LOWER($1) LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AgentError::Database(format!("Failed to look up user: {}", e)))?;

        match row {
            Some(row) => Ok(Some(row.try_get("id")?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryWatchlistStore;
    use chrono::TimeZone;

    async fn seeded() -> InMemoryWatchlistStore {
        let store = InMemoryWatchlistStore::new();
        store.add_user("u1", "Ada@Example.com").await;
        for (symbol, day) in [("AAPL", 1), ("TSLA", 3), ("MSFT", 2)] {
            store
                .add_item(WatchlistItem {
                    user_id: "u1".into(),
                    symbol: symbol.into(),
                    company: String::new(),
                    added_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
                })
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_items_are_newest_first() {
        let store = seeded().await;
        let items = store.items_for_user("u1").await.unwrap();
        let symbols: Vec<_> = items.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["TSLA", "MSFT", "AAPL"]);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let store = seeded().await;
        let symbols = symbols_for_email(&store, "ada@example.com").await.unwrap();
        assert_eq!(symbols.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_email_is_empty() {
        let store = seeded().await;
        let symbols = symbols_for_email(&store, "nobody@example.com").await.unwrap();
        assert!(symbols.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_database_url_is_configuration_error() {
        let err = PgWatchlistStore::connect_lazy("not a url").err().unwrap();
        assert!(matches!(err, AgentError::Configuration(_)));
    }
}
