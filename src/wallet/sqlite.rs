//! SQLite-backed wallet links

use super::WalletLinkStore;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

/// Durable wallet links
pub struct SqliteWalletLinks {
    pool: SqlitePool,
}

impl SqliteWalletLinks {
    /// Open (or create) the database at `path`. `~` is expanded.
    pub async fn connect(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).to_string();

        if let Some(parent) = Path::new(&expanded).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    crate::error::BotError::Internal(format!(
                        "Cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&expanded)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!("Wallet link database opened at {}", expanded);
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_links (
                user_id TEXT PRIMARY KEY,
                address TEXT NOT NULL,
                linked_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// When the current link for `user_id` was created
    pub async fn linked_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT linked_at FROM wallet_links WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<DateTime<Utc>, _>("linked_at")))
    }
}

#[async_trait]
impl WalletLinkStore for SqliteWalletLinks {
    async fn link(&self, user_id: &str, address: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_links (user_id, address, linked_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                address = excluded.address,
                linked_at = excluded.linked_at
            "#,
        )
        .bind(user_id)
        .bind(address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup(&self, user_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT address FROM wallet_links WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("address")))
    }

    async fn unlink(&self, user_id: &str) -> Result<Option<String>> {
        let existing = self.lookup(user_id).await?;
        if existing.is_some() {
            sqlx::query("DELETE FROM wallet_links WHERE user_id = ?")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(existing)
    }
}
