use super::*;
use crate::Result;
use crate::StoreError;
use crate::database::models::Mood;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;

const TEST_DIM: usize = 4;

/// Embedder stub returning a fixed response for every input.
struct FixedEmbedder {
    vector: Option<Vec<f32>>,
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.vector.clone())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>> {
        Err(StoreError::EmbeddingUnavailable("backend offline".to_string()))
    }
}

fn pad(values: &[f32]) -> Vec<f32> {
    let mut vector = values.to_vec();
    vector.resize(TEST_DIM, 0.0);
    vector
}

fn test_retrieval_config() -> RetrievalConfig {
    RetrievalConfig {
        journal_k: 3,
        chat_k: 5,
        snippet_chars: 40,
    }
}

async fn create_test_database() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("retrieval.db");
    let database = Database::new(&db_path, TEST_DIM)
        .await
        .expect("Failed to create database");
    (temp_dir, database)
}

fn service(database: Database, embedder: impl Embedder + 'static) -> RetrievalService {
    RetrievalService::new(database, Arc::new(embedder), test_retrieval_config())
}

#[tokio::test]
async fn blank_query_returns_empty_block() {
    let (_temp_dir, database) = create_test_database().await;
    let service = service(
        database,
        FixedEmbedder {
            vector: Some(pad(&[1.0])),
        },
    );

    let block = service.retrieve_context("   \n ").await;
    assert!(block.is_empty());
    assert_eq!(block.render(Utc::now().naive_utc()), "");
}

#[tokio::test]
async fn embedder_none_degrades_to_empty_block() {
    let (_temp_dir, database) = create_test_database().await;
    let service = service(database, FixedEmbedder { vector: None });

    let block = service.retrieve_context("anything at all").await;
    assert!(block.is_empty());
}

#[tokio::test]
async fn embedder_failure_degrades_to_empty_block() {
    let (_temp_dir, database) = create_test_database().await;
    let service = service(database, FailingEmbedder);

    let block = service.retrieve_context("anything at all").await;
    assert!(block.is_empty());
}

#[tokio::test]
async fn wrong_dimension_embedder_output_degrades_to_empty_block() {
    let (_temp_dir, database) = create_test_database().await;
    let service = service(
        database,
        FixedEmbedder {
            vector: Some(vec![1.0; TEST_DIM + 2]),
        },
    );

    let block = service.retrieve_context("anything at all").await;
    assert!(block.is_empty());
}

#[tokio::test]
async fn empty_store_returns_empty_block() {
    let (_temp_dir, database) = create_test_database().await;
    let service = service(
        database,
        FixedEmbedder {
            vector: Some(pad(&[1.0])),
        },
    );

    let block = service.retrieve_context("completely unrelated text").await;
    assert!(block.is_empty());
    assert_eq!(block.item_count(), 0);
}

#[tokio::test]
async fn retrieves_and_groups_matches() {
    let (_temp_dir, database) = create_test_database().await;

    let close = JournalEntry::new(
        "Ran by the river this morning".to_string(),
        Mood::Happy,
        2,
        Some(pad(&[1.0, 0.0])),
    );
    let far = JournalEntry::new(
        "Long day of meetings".to_string(),
        Mood::Stressed,
        3,
        Some(pad(&[0.0, 1.0])),
    );
    database
        .put_journal_entry(&close)
        .await
        .expect("Put should succeed");
    database
        .put_journal_entry(&far)
        .await
        .expect("Put should succeed");

    let chat_a = Uuid::new_v4();
    let chat_b = Uuid::new_v4();
    let mut starred = ChatMessage::new(
        chat_a,
        "You mentioned running helps you reset".to_string(),
        false,
        Some(pad(&[0.9, 0.1])),
    );
    starred.is_starred = true;
    let plain_same_chat = ChatMessage::new(
        chat_a,
        "How did the run feel?".to_string(),
        false,
        Some(pad(&[0.8, 0.0])),
    );
    let other_chat = ChatMessage::new(
        chat_b,
        "Meetings again?".to_string(),
        true,
        Some(pad(&[0.0, 0.9])),
    );
    for message in [&starred, &plain_same_chat, &other_chat] {
        database
            .put_chat_message(message)
            .await
            .expect("Put should succeed");
    }

    let service = service(
        database,
        FixedEmbedder {
            vector: Some(pad(&[1.0, 0.0])),
        },
    );

    let block = service.retrieve_context("how is my running going").await;

    assert_eq!(block.journal_items.len(), 2);
    assert_eq!(block.journal_items[0].id, close.id);
    assert_eq!(block.journal_items[0].mood, Some(Mood::Happy));
    assert!(block.journal_items[0].distance <= block.journal_items[1].distance);

    assert_eq!(block.chat_groups.len(), 2);
    // The conversation with the closest match leads.
    assert_eq!(block.chat_groups[0].chat_id, chat_a);
    assert_eq!(block.chat_groups[0].items.len(), 2);
    assert_eq!(block.chat_groups[1].chat_id, chat_b);

    let rendered = block.render(Utc::now().naive_utc());
    assert!(rendered.contains("RELEVANT JOURNAL ENTRIES:"));
    assert!(rendered.contains("RELEVANT PAST CONVERSATIONS:"));
    assert!(rendered.contains("Mood: Happy (2/3)"));
    assert!(rendered.contains("STARRED"));
}

#[tokio::test]
async fn long_texts_are_truncated_in_items() {
    let (_temp_dir, database) = create_test_database().await;

    let long_text = "x".repeat(500);
    let entry = JournalEntry::new(long_text, Mood::Neutral, 1, Some(pad(&[1.0])));
    database
        .put_journal_entry(&entry)
        .await
        .expect("Put should succeed");

    let service = service(
        database,
        FixedEmbedder {
            vector: Some(pad(&[1.0])),
        },
    );

    let block = service.retrieve_context("anything").await;
    assert_eq!(block.journal_items.len(), 1);
    // 40 chars of snippet plus the ellipsis marker.
    assert_eq!(block.journal_items[0].text.chars().count(), 41);
}

#[test]
fn snippet_truncation_is_char_boundary_safe() {
    assert_eq!(truncate_snippet("short", 40), "short");

    let truncated = truncate_snippet(&"é".repeat(50), 10);
    assert_eq!(truncated.chars().count(), 11);
    assert!(truncated.ends_with('…'));
}

#[test]
fn age_in_days_is_computed_at_read_time() {
    let now = Utc::now().naive_utc();
    let item = ContextItem {
        id: Uuid::new_v4(),
        text: "old entry".to_string(),
        source: ContextSource::Journal,
        date: now - Duration::days(9),
        mood: None,
        intensity: None,
        is_starred: false,
        chat_id: None,
        distance: 0.0,
    };

    assert_eq!(item.age_in_days(now), 9);
    assert_eq!(item.age_in_days(now + Duration::days(3)), 12);
}
