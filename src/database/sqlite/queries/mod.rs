
use super::models::*;
use crate::embeddings::codec;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::{FromRow, SqlitePool};
use tracing::warn;
use uuid::Uuid;

// Raw row shapes: embeddings are persisted as JSON text and decoded on the
// way out. A row whose embedding fails to decode degrades to no embedding
// rather than failing the whole read.

#[derive(Debug, Clone, FromRow)]
struct JournalEntryRow {
    id: Uuid,
    text: String,
    mood: Mood,
    intensity: i64,
    created_at: NaiveDateTime,
    embedding: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct ChatMessageRow {
    id: Uuid,
    chat_id: Uuid,
    text: String,
    is_user: bool,
    created_at: NaiveDateTime,
    is_starred: bool,
    embedding: Option<String>,
}

fn decode_stored_embedding(raw: Option<String>, record_id: Uuid) -> Option<Vec<f32>> {
    let raw = raw?;
    match codec::decode(&raw) {
        Ok(vector) => Some(vector),
        Err(e) => {
            warn!("Dropping undecodable embedding for record {}: {}", record_id, e);
            None
        }
    }
}

impl JournalEntryRow {
    fn into_entry(self) -> JournalEntry {
        let embedding = decode_stored_embedding(self.embedding, self.id);
        JournalEntry {
            id: self.id,
            text: self.text,
            mood: self.mood,
            intensity: self.intensity,
            created_at: self.created_at,
            embedding,
        }
    }
}

impl ChatMessageRow {
    fn into_message(self) -> ChatMessage {
        let embedding = decode_stored_embedding(self.embedding, self.id);
        ChatMessage {
            id: self.id,
            chat_id: self.chat_id,
            text: self.text,
            is_user: self.is_user,
            created_at: self.created_at,
            is_starred: self.is_starred,
            embedding,
        }
    }
}

const JOURNAL_COLUMNS: &str = "id, text, mood, intensity, created_at, embedding";
const CHAT_COLUMNS: &str = "id, chat_id, text, is_user, created_at, is_starred, embedding";

pub struct JournalQueries;

impl JournalQueries {
    /// Upsert by id in a single statement. `created_at` is immutable: a
    /// conflicting insert keeps the original timestamp.
    #[inline]
    pub async fn upsert(pool: &SqlitePool, entry: &JournalEntry) -> Result<()> {
        let encoded = entry.embedding.as_deref().map(codec::encode);

        sqlx::query(
            "INSERT INTO journal_entries (id, text, mood, intensity, created_at, embedding)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 text = excluded.text,
                 mood = excluded.mood,
                 intensity = excluded.intensity,
                 embedding = excluded.embedding",
        )
        .bind(entry.id)
        .bind(&entry.text)
        .bind(entry.mood)
        .bind(entry.intensity)
        .bind(entry.created_at)
        .bind(encoded)
        .execute(pool)
        .await
        .context("Failed to upsert journal entry")?;

        Ok(())
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<JournalEntry>> {
        let row = sqlx::query_as::<_, JournalEntryRow>(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journal_entries WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get journal entry by id")?;

        Ok(row.map(JournalEntryRow::into_entry))
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM journal_entries WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete journal entry")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, JournalEntryRow>(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journal_entries ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list journal entries")?;

        Ok(rows.into_iter().map(JournalEntryRow::into_entry).collect())
    }

    /// Entries with `start <= created_at < end`, newest first.
    #[inline]
    pub async fn list_range(
        pool: &SqlitePool,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, JournalEntryRow>(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journal_entries
             WHERE created_at >= ? AND created_at < ?
             ORDER BY created_at DESC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
        .context("Failed to list journal entries in range")?;

        Ok(rows.into_iter().map(JournalEntryRow::into_entry).collect())
    }

    #[inline]
    pub async fn list_with_embedding(pool: &SqlitePool) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, JournalEntryRow>(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journal_entries
             WHERE embedding IS NOT NULL
             ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list embedded journal entries")?;

        Ok(rows
            .into_iter()
            .map(JournalEntryRow::into_entry)
            .filter(JournalEntry::has_embedding)
            .collect())
    }

    /// Lazy scan over all entries, newest first. Re-polling a fresh stream
    /// re-reads current state.
    #[inline]
    pub fn stream_all(pool: &SqlitePool) -> BoxStream<'_, Result<JournalEntry, sqlx::Error>> {
        sqlx::query_as::<_, JournalEntryRow>(
            "SELECT id, text, mood, intensity, created_at, embedding
             FROM journal_entries ORDER BY created_at DESC",
        )
        .fetch(pool)
        .map_ok(JournalEntryRow::into_entry)
        .boxed()
    }

    /// Text edit. Deliberately leaves the stored embedding untouched, so an
    /// edited entry keeps ranking by its pre-edit vector.
    #[inline]
    pub async fn update_text(
        pool: &SqlitePool,
        id: Uuid,
        text: &str,
    ) -> Result<Option<JournalEntry>> {
        sqlx::query("UPDATE journal_entries SET text = ? WHERE id = ?")
            .bind(text)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update journal entry text")?;

        Self::get_by_id(pool, id).await
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM journal_entries")
            .fetch_one(pool)
            .await
            .context("Failed to count journal entries")?;

        Ok(count)
    }
}

pub struct ChatMessageQueries;

impl ChatMessageQueries {
    /// Upsert by id in a single statement; `created_at` and `chat_id` are
    /// immutable on conflict.
    #[inline]
    pub async fn upsert(pool: &SqlitePool, message: &ChatMessage) -> Result<()> {
        let encoded = message.embedding.as_deref().map(codec::encode);

        sqlx::query(
            "INSERT INTO chat_messages (id, chat_id, text, is_user, created_at, is_starred, embedding)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 text = excluded.text,
                 is_user = excluded.is_user,
                 is_starred = excluded.is_starred,
                 embedding = excluded.embedding",
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(&message.text)
        .bind(message.is_user)
        .bind(message.created_at)
        .bind(message.is_starred)
        .bind(encoded)
        .execute(pool)
        .await
        .context("Failed to upsert chat message")?;

        Ok(())
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<ChatMessage>> {
        let row = sqlx::query_as::<_, ChatMessageRow>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_messages WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get chat message by id")?;

        Ok(row.map(ChatMessageRow::into_message))
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete chat message")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_messages ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list chat messages")?;

        Ok(rows.into_iter().map(ChatMessageRow::into_message).collect())
    }

    /// Messages belonging to one conversation, oldest first.
    #[inline]
    pub async fn list_for_chat(pool: &SqlitePool, chat_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_messages
             WHERE chat_id = ?
             ORDER BY created_at ASC"
        ))
        .bind(chat_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chat messages for chat")?;

        Ok(rows.into_iter().map(ChatMessageRow::into_message).collect())
    }

    #[inline]
    pub async fn list_with_embedding(pool: &SqlitePool) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_messages
             WHERE embedding IS NOT NULL
             ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list embedded chat messages")?;

        Ok(rows
            .into_iter()
            .map(ChatMessageRow::into_message)
            .filter(ChatMessage::has_embedding)
            .collect())
    }

    /// Lazy scan over all messages, newest first.
    #[inline]
    pub fn stream_all(pool: &SqlitePool) -> BoxStream<'_, Result<ChatMessage, sqlx::Error>> {
        sqlx::query_as::<_, ChatMessageRow>(
            "SELECT id, chat_id, text, is_user, created_at, is_starred, embedding
             FROM chat_messages ORDER BY created_at DESC",
        )
        .fetch(pool)
        .map_ok(ChatMessageRow::into_message)
        .boxed()
    }

    #[inline]
    pub async fn set_starred(
        pool: &SqlitePool,
        id: Uuid,
        is_starred: bool,
    ) -> Result<Option<ChatMessage>> {
        sqlx::query("UPDATE chat_messages SET is_starred = ? WHERE id = ?")
            .bind(is_starred)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update starred flag")?;

        Self::get_by_id(pool, id).await
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(pool)
            .await
            .context("Failed to count chat messages")?;

        Ok(count)
    }
}
