#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use itertools::Itertools;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::database::Database;
use crate::database::models::{ChatMessage, JournalEntry, Mood};
use crate::embeddings::Embedder;
use crate::index::VectorIndex;

/// Where a retrieved item came from. `Insight` items are produced by app
/// layers that compose derived material into the same projection; this crate
/// only ever emits `Journal` and `Chat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    Journal,
    Chat,
    Insight,
}

/// A retrieved record, normalized for prompt assembly. Derived at query
/// time, never persisted; `age_in_days` is computed against the caller's
/// "now" because the answer changes as time passes.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextItem {
    pub id: Uuid,
    pub text: String,
    pub source: ContextSource,
    pub date: NaiveDateTime,
    pub mood: Option<Mood>,
    pub intensity: Option<i64>,
    pub is_starred: bool,
    pub chat_id: Option<Uuid>,
    pub distance: f32,
}

impl ContextItem {
    fn from_journal(entry: &JournalEntry, distance: f32, snippet_chars: usize) -> Self {
        Self {
            id: entry.id,
            text: truncate_snippet(&entry.text, snippet_chars),
            source: ContextSource::Journal,
            date: entry.created_at,
            mood: Some(entry.mood),
            intensity: Some(entry.intensity),
            is_starred: false,
            chat_id: None,
            distance,
        }
    }

    fn from_chat(message: &ChatMessage, distance: f32, snippet_chars: usize) -> Self {
        Self {
            id: message.id,
            text: truncate_snippet(&message.text, snippet_chars),
            source: ContextSource::Chat,
            date: message.created_at,
            mood: None,
            intensity: None,
            is_starred: message.is_starred,
            chat_id: Some(message.chat_id),
            distance,
        }
    }

    #[inline]
    pub fn age_in_days(&self, now: NaiveDateTime) -> i64 {
        (now - self.date).num_days()
    }
}

/// Chat items belonging to one conversation, closest match first.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatGroup {
    pub chat_id: Uuid,
    pub items: Vec<ContextItem>,
}

/// The bounded context assembled for a downstream prompt: journal matches
/// and chat matches stay in separate groups, and chat matches are further
/// grouped per conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextBlock {
    pub journal_items: Vec<ContextItem>,
    pub chat_groups: Vec<ChatGroup>,
}

impl ContextBlock {
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.journal_items.is_empty() && self.chat_groups.is_empty()
    }

    #[inline]
    pub fn item_count(&self) -> usize {
        self.journal_items.len() + self.chat_groups.iter().map(|g| g.items.len()).sum::<usize>()
    }

    /// Render the block for inclusion in a prompt. Dates, mood, recency, and
    /// the STARRED flag are spelled out so the consumer can weight them.
    pub fn render(&self, now: NaiveDateTime) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut out = String::new();

        if !self.journal_items.is_empty() {
            out.push_str("RELEVANT JOURNAL ENTRIES:\n");
            for item in &self.journal_items {
                let _ = write!(out, "- [{}]", item.date.format("%Y-%m-%d"));
                let _ = write!(out, " ({} days ago)", item.age_in_days(now));
                if let (Some(mood), Some(intensity)) = (item.mood, item.intensity) {
                    let _ = write!(out, " Mood: {mood} ({intensity}/3)");
                }
                let _ = writeln!(out, ": {}", item.text);
            }
        }

        if !self.chat_groups.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("RELEVANT PAST CONVERSATIONS:\n");
            for group in &self.chat_groups {
                let _ = writeln!(out, "Conversation {}:", group.chat_id);
                for item in &group.items {
                    let _ = write!(out, "- [{}]", item.date.format("%Y-%m-%d"));
                    let _ = write!(out, " ({} days ago)", item.age_in_days(now));
                    if item.is_starred {
                        out.push_str(" STARRED");
                    }
                    let _ = writeln!(out, ": {}", item.text);
                }
            }
        }

        out
    }
}

fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut snippet: String = text.chars().take(max_chars).collect();
    snippet.push('…');
    snippet
}

/// Turns free text into a bounded context block by embedding it and ranking
/// both record collections. Best-effort: every failure on the way (blank
/// text, embedder outage, wrong-dimension vector, storage error) degrades to
/// an empty block so the chat flow keeps working without context.
pub struct RetrievalService {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl RetrievalService {
    #[inline]
    pub fn new(database: Database, embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self {
            index: VectorIndex::new(database),
            embedder,
            config,
        }
    }

    /// Retrieve context for `query_text` using the configured journal and
    /// chat limits. Never fails; an empty block means no usable context.
    pub async fn retrieve_context(&self, query_text: &str) -> ContextBlock {
        let trimmed = query_text.trim();
        if trimmed.is_empty() {
            debug!("Blank retrieval query, returning empty context");
            return ContextBlock::empty();
        }

        let query_vector = match self.embedder.embed(trimmed).await {
            Ok(Some(vector)) => vector,
            Ok(None) => {
                debug!("Embedder produced no vector for query, returning empty context");
                return ContextBlock::empty();
            }
            Err(e) => {
                warn!("Embedding failed, returning empty context: {}", e);
                return ContextBlock::empty();
            }
        };

        let journal_hits = match self
            .index
            .query_journal(&query_vector, self.config.journal_k)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Journal similarity query failed, returning empty context: {}", e);
                return ContextBlock::empty();
            }
        };

        let chat_hits = match self.index.query_chat(&query_vector, self.config.chat_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Chat similarity query failed, returning empty context: {}", e);
                return ContextBlock::empty();
            }
        };

        let block = self.assemble(journal_hits, chat_hits);
        debug!(
            "Assembled context block with {} journal and {} chat items",
            block.journal_items.len(),
            block.item_count() - block.journal_items.len()
        );
        block
    }

    fn assemble(
        &self,
        journal_hits: Vec<(JournalEntry, f32)>,
        chat_hits: Vec<(ChatMessage, f32)>,
    ) -> ContextBlock {
        let snippet_chars = self.config.snippet_chars;

        let journal_items = journal_hits
            .iter()
            .map(|(entry, distance)| ContextItem::from_journal(entry, *distance, snippet_chars))
            .collect();

        // Group chat hits per conversation; groups order by their closest
        // match, items inside a group keep distance order.
        let mut chat_items: Vec<ContextItem> = chat_hits
            .iter()
            .map(|(message, distance)| ContextItem::from_chat(message, *distance, snippet_chars))
            .collect();
        chat_items.sort_by(|a, b| a.chat_id.cmp(&b.chat_id).then(a.distance.total_cmp(&b.distance)));

        let grouped = chat_items.into_iter().chunk_by(|item| item.chat_id);
        let mut chat_groups: Vec<ChatGroup> = grouped
            .into_iter()
            .filter_map(|(chat_id, items)| {
                chat_id.map(|chat_id| ChatGroup {
                    chat_id,
                    items: items.collect(),
                })
            })
            .collect();
        chat_groups.sort_by(|a, b| {
            let best_a = a.items.first().map_or(f32::MAX, |i| i.distance);
            let best_b = b.items.first().map_or(f32::MAX, |i| i.distance);
            best_a.total_cmp(&best_b)
        });

        ContextBlock {
            journal_items,
            chat_groups,
        }
    }
}
