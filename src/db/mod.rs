//! Persistence of executed transfers.
//!
//! The engine only needs add/commit/rollback; [`SqliteRecordStore`] backs that
//! with a lazily opened SQLite transaction.

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::models::TransferRecord;

/// Transactional sink for transfer records.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    /// Stage a record in the open transaction, opening one if needed.
    async fn add(&mut self, record: &TransferRecord) -> Result<()>;

    /// Make every staged record durable.
    async fn commit(&mut self) -> Result<()>;

    /// Discard every staged record.
    async fn rollback(&mut self) -> Result<()>;
}

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteRecordStore {
    /// Connect and create the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        // Every connection to an in-memory database is a separate database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool, tx: None };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfers (
                id TEXT PRIMARY KEY,
                gameweek INTEGER NOT NULL,
                player_out_id INTEGER NOT NULL,
                player_out_name TEXT NOT NULL,
                player_in_id INTEGER NOT NULL,
                player_in_name TEXT NOT NULL,
                projected_gain REAL NOT NULL,
                cost INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transfers_gameweek ON transfers(gameweek)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Most recent committed transfers, newest first.
    pub async fn recent_transfers(&self, limit: i64) -> Result<Vec<TransferRecord>> {
        let records = sqlx::query_as::<_, TransferRecord>(
            r#"
            SELECT id, gameweek, player_out_id, player_out_name, player_in_id,
                   player_in_name, projected_gain, cost, created_at
            FROM transfers
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

impl RecordStore for SqliteRecordStore {
    async fn add(&mut self, record: &TransferRecord) -> Result<()> {
        if self.tx.is_none() {
            let tx = self
                .pool
                .begin()
                .await
                .context("Failed to begin transaction")?;
            self.tx = Some(tx);
        }

        if let Some(tx) = self.tx.as_mut() {
            sqlx::query(
                r#"
                INSERT INTO transfers (
                    id, gameweek, player_out_id, player_out_name, player_in_id,
                    player_in_name, projected_gain, cost, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(record.gameweek)
            .bind(record.player_out_id)
            .bind(&record.player_out_name)
            .bind(record.player_in_id)
            .bind(&record.player_in_name)
            .bind(record.projected_gain)
            .bind(record.cost)
            .bind(record.created_at)
            .execute(&mut **tx)
            .await
            .context("Failed to insert transfer record")?;
        }

        debug!(id = %record.id, "Staged transfer record");
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.context("Failed to commit transfers")?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.context("Failed to roll back transfers")?;
        }
        Ok(())
    }
}
