
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::Result;
use crate::database::Database;
use crate::database::models::{ChatMessage, JournalEntry};
use crate::embeddings::codec;

/// A record that can be ranked by embedding distance.
pub trait Embedded {
    fn embedding(&self) -> Option<&[f32]>;
    fn created_at(&self) -> NaiveDateTime;
}

impl Embedded for JournalEntry {
    #[inline]
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    #[inline]
    fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }
}

impl Embedded for ChatMessage {
    #[inline]
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    #[inline]
    fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }
}

/// Exact nearest-neighbour search over the embedded records of one
/// collection. Distance metric is squared Euclidean, ascending; exactly
/// equal distances order by `created_at` descending so results are
/// deterministic. A linear scan is the whole algorithm: the store holds
/// hundreds to low thousands of records per device.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    database: Database,
}

impl VectorIndex {
    #[inline]
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Top-k journal entries by distance to `query`. Fewer than k results
    /// means the store holds fewer embedded entries; `k == 0` is an empty
    /// result, not an error.
    pub async fn query_journal(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(JournalEntry, f32)>> {
        codec::validate_dimension(query, self.database.embedding_dim())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.database.journal_entries_with_embedding().await?;
        debug!("Ranking {} embedded journal entries", entries.len());
        Ok(rank_nearest(query, entries, k))
    }

    /// Top-k chat messages by distance to `query`.
    pub async fn query_chat(&self, query: &[f32], k: usize) -> Result<Vec<(ChatMessage, f32)>> {
        codec::validate_dimension(query, self.database.embedding_dim())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let messages = self.database.chat_messages_with_embedding().await?;
        debug!("Ranking {} embedded chat messages", messages.len());
        Ok(rank_nearest(query, messages, k))
    }
}

/// Squared Euclidean distance, accumulated in f64 to keep the sum stable
/// over long vectors.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0_f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let d = f64::from(x) - f64::from(y);
        sum += d * d;
    }
    sum as f32
}

/// Rank `items` by distance to `query` and keep the closest `k`. Items
/// without an embedding are skipped; so is any stored vector whose length
/// disagrees with the query (possible only if the database was edited
/// out-of-band).
pub fn rank_nearest<T: Embedded>(query: &[f32], items: Vec<T>, k: usize) -> Vec<(T, f32)> {
    let mut scored: Vec<(T, f32)> = Vec::with_capacity(items.len());

    for item in items {
        let Some(vector) = item.embedding() else {
            continue;
        };
        if vector.len() != query.len() {
            warn!(
                "Skipping record with {}-dim stored vector during a {}-dim query",
                vector.len(),
                query.len()
            );
            continue;
        }
        let distance = squared_euclidean(query, vector);
        scored.push((item, distance));
    }

    let k = k.min(scored.len());
    if k == 0 {
        return Vec::new();
    }

    let by_rank = |a: &(T, f32), b: &(T, f32)| -> Ordering {
        a.1.total_cmp(&b.1)
            .then_with(|| b.0.created_at().cmp(&a.0.created_at()))
    };

    // Partial selection first, then order just the winning prefix.
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_rank);
        scored.truncate(k);
    }
    scored.sort_unstable_by(by_rank);
    scored
}
