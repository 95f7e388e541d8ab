use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::{Result, StoreError};
use crate::database::sqlite::models::{ChatMessage, JournalEntry};
use crate::database::sqlite::queries::{ChatMessageQueries, JournalQueries};
use crate::embeddings::codec;
use chrono::NaiveDateTime;
use futures::TryStreamExt;
use futures::stream::BoxStream;
use uuid::Uuid;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// Durable store for journal entries and chat messages. Each record is
/// upserted together with its encoded embedding in a single statement, so a
/// reader never observes one without the other.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
    embedding_dim: usize,
}

fn storage_err(e: anyhow::Error) -> StoreError {
    StoreError::Storage(format!("{e:#}"))
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_url: P, embedding_dim: usize) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to create connection pool: {e}")))?;

        let database = Self {
            pool,
            embedding_dim,
        };
        database.run_migrations().await?;

        Ok(database)
    }

    /// Open (or create) the database under the configured base directory.
    pub async fn initialize_from_config(config: &Config) -> Result<Self> {
        let base_dir = config
            .get_base_dir()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let db_path = base_dir.join("journal.db");

        std::fs::create_dir_all(&base_dir)?;

        Self::new(&db_path, config.embedding_dim).await
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to run schema migration: {e}")))?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    // Journal entry operations

    /// Upsert by id. A present embedding must match the store dimension;
    /// a mismatched vector is stored as no embedding, never truncated or
    /// padded.
    pub async fn put_journal_entry(&self, entry: &JournalEntry) -> Result<()> {
        let sanitized;
        let entry = match &entry.embedding {
            Some(vector) if codec::validate_dimension(vector, self.embedding_dim).is_err() => {
                warn!(
                    "Journal entry {} carries a {}-dim vector (store expects {}), persisting without embedding",
                    entry.id,
                    vector.len(),
                    self.embedding_dim
                );
                sanitized = JournalEntry {
                    embedding: None,
                    ..entry.clone()
                };
                &sanitized
            }
            _ => entry,
        };

        JournalQueries::upsert(&self.pool, entry)
            .await
            .map_err(storage_err)
    }

    pub async fn get_journal_entry(&self, id: Uuid) -> Result<Option<JournalEntry>> {
        JournalQueries::get_by_id(&self.pool, id)
            .await
            .map_err(storage_err)
    }

    /// Returns false when the id was absent; the store is unchanged either
    /// way beyond the removed row.
    pub async fn delete_journal_entry(&self, id: Uuid) -> Result<bool> {
        JournalQueries::delete(&self.pool, id)
            .await
            .map_err(storage_err)
    }

    pub async fn list_journal_entries(&self) -> Result<Vec<JournalEntry>> {
        JournalQueries::list_all(&self.pool)
            .await
            .map_err(storage_err)
    }

    pub async fn journal_entries_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<JournalEntry>> {
        JournalQueries::list_range(&self.pool, start, end)
            .await
            .map_err(storage_err)
    }

    /// Working set for similarity search: entries whose persisted embedding
    /// is present and decodable.
    pub async fn journal_entries_with_embedding(&self) -> Result<Vec<JournalEntry>> {
        JournalQueries::list_with_embedding(&self.pool)
            .await
            .map_err(storage_err)
    }

    pub fn scan_journal_entries(&self) -> BoxStream<'_, Result<JournalEntry>> {
        Box::pin(
            JournalQueries::stream_all(&self.pool)
                .map_err(|e| StoreError::Storage(format!("Journal scan failed: {e}"))),
        )
    }

    /// Edit the entry text without re-embedding; the stored vector stays as
    /// it was at write time.
    pub async fn update_journal_text(&self, id: Uuid, text: &str) -> Result<Option<JournalEntry>> {
        JournalQueries::update_text(&self.pool, id, text)
            .await
            .map_err(storage_err)
    }

    pub async fn count_journal_entries(&self) -> Result<i64> {
        JournalQueries::count(&self.pool).await.map_err(storage_err)
    }

    // Chat message operations

    pub async fn put_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let sanitized;
        let message = match &message.embedding {
            Some(vector) if codec::validate_dimension(vector, self.embedding_dim).is_err() => {
                warn!(
                    "Chat message {} carries a {}-dim vector (store expects {}), persisting without embedding",
                    message.id,
                    vector.len(),
                    self.embedding_dim
                );
                sanitized = ChatMessage {
                    embedding: None,
                    ..message.clone()
                };
                &sanitized
            }
            _ => message,
        };

        ChatMessageQueries::upsert(&self.pool, message)
            .await
            .map_err(storage_err)
    }

    pub async fn get_chat_message(&self, id: Uuid) -> Result<Option<ChatMessage>> {
        ChatMessageQueries::get_by_id(&self.pool, id)
            .await
            .map_err(storage_err)
    }

    pub async fn delete_chat_message(&self, id: Uuid) -> Result<bool> {
        ChatMessageQueries::delete(&self.pool, id)
            .await
            .map_err(storage_err)
    }

    pub async fn list_chat_messages(&self) -> Result<Vec<ChatMessage>> {
        ChatMessageQueries::list_all(&self.pool)
            .await
            .map_err(storage_err)
    }

    pub async fn messages_for_chat(&self, chat_id: Uuid) -> Result<Vec<ChatMessage>> {
        ChatMessageQueries::list_for_chat(&self.pool, chat_id)
            .await
            .map_err(storage_err)
    }

    pub async fn chat_messages_with_embedding(&self) -> Result<Vec<ChatMessage>> {
        ChatMessageQueries::list_with_embedding(&self.pool)
            .await
            .map_err(storage_err)
    }

    pub fn scan_chat_messages(&self) -> BoxStream<'_, Result<ChatMessage>> {
        Box::pin(
            ChatMessageQueries::stream_all(&self.pool)
                .map_err(|e| StoreError::Storage(format!("Chat scan failed: {e}"))),
        )
    }

    pub async fn set_message_starred(&self, id: Uuid, starred: bool) -> Result<Option<ChatMessage>> {
        ChatMessageQueries::set_starred(&self.pool, id, starred)
            .await
            .map_err(storage_err)
    }

    pub async fn count_chat_messages(&self) -> Result<i64> {
        ChatMessageQueries::count(&self.pool)
            .await
            .map_err(storage_err)
    }

    /// Optimize database performance by running VACUUM and ANALYZE
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing database performance");

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to vacuum database: {e}")))?;

        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to analyze database: {e}")))?;

        debug!("Database optimization completed");
        Ok(())
    }
}
