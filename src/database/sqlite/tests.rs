use super::models::{ChatMessage, JournalEntry, Mood};
use super::*;
use tempfile::TempDir;

const TEST_DIM: usize = 8;

async fn create_test_database() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("journal.db");

    let database = Database::new(&db_path, TEST_DIM)
        .await
        .expect("Failed to create database");

    (temp_dir, database)
}

#[tokio::test]
async fn initialize_from_config_creates_base_dir() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let mut config = crate::config::Config::default();
    config.base_dir = Some(temp_dir.path().join("nested").join("store"));
    config.embedding_dim = TEST_DIM;

    let database = Database::initialize_from_config(&config)
        .await
        .expect("Failed to initialize database");

    assert_eq!(database.embedding_dim(), TEST_DIM);
    assert!(temp_dir.path().join("nested").join("store").join("journal.db").exists());
}

#[tokio::test]
async fn put_rejects_mismatched_embedding_dimension() {
    let (_temp_dir, database) = create_test_database().await;

    let entry = JournalEntry::new(
        "Wrong-size vector".to_string(),
        Mood::Anxious,
        3,
        Some(vec![0.5; TEST_DIM + 3]),
    );

    database
        .put_journal_entry(&entry)
        .await
        .expect("Put should succeed");

    let stored = database
        .get_journal_entry(entry.id)
        .await
        .expect("Get should succeed")
        .expect("Entry should exist");

    // Base fields are persisted, the mismatched vector is not.
    assert_eq!(stored.text, "Wrong-size vector");
    assert!(stored.embedding.is_none());
}

#[tokio::test]
async fn put_preserves_valid_embedding() {
    let (_temp_dir, database) = create_test_database().await;

    let entry = JournalEntry::new(
        "Valid vector".to_string(),
        Mood::Hopeful,
        1,
        Some(vec![0.125; TEST_DIM]),
    );

    database
        .put_journal_entry(&entry)
        .await
        .expect("Put should succeed");

    let stored = database
        .get_journal_entry(entry.id)
        .await
        .expect("Get should succeed")
        .expect("Entry should exist");

    assert_eq!(stored.embedding, Some(vec![0.125; TEST_DIM]));
}

#[tokio::test]
async fn empty_text_entry_round_trips_without_embedding() {
    let (_temp_dir, database) = create_test_database().await;

    let entry = JournalEntry::new(String::new(), Mood::Neutral, 1, None);

    database
        .put_journal_entry(&entry)
        .await
        .expect("Put should succeed");

    let stored = database
        .get_journal_entry(entry.id)
        .await
        .expect("Get should succeed")
        .expect("Entry should exist");

    assert_eq!(stored.text, "");
    assert!(stored.embedding.is_none());
}

#[tokio::test]
async fn missing_ids_are_not_errors() {
    let (_temp_dir, database) = create_test_database().await;

    let id = uuid::Uuid::new_v4();

    let entry = database
        .get_journal_entry(id)
        .await
        .expect("Get should succeed");
    assert!(entry.is_none());

    let deleted = database
        .delete_journal_entry(id)
        .await
        .expect("Delete should succeed");
    assert!(!deleted);

    let count = database
        .count_journal_entries()
        .await
        .expect("Count should succeed");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn delete_removes_record_and_embedding_together() {
    let (_temp_dir, database) = create_test_database().await;

    let chat_id = uuid::Uuid::new_v4();
    let message = ChatMessage::new(
        chat_id,
        "starred and embedded".to_string(),
        true,
        Some(vec![1.0; TEST_DIM]),
    );

    database
        .put_chat_message(&message)
        .await
        .expect("Put should succeed");
    database
        .set_message_starred(message.id, true)
        .await
        .expect("Star should succeed");

    let deleted = database
        .delete_chat_message(message.id)
        .await
        .expect("Delete should succeed");
    assert!(deleted);

    let embedded = database
        .chat_messages_with_embedding()
        .await
        .expect("Scan should succeed");
    assert!(embedded.is_empty());
}

#[tokio::test]
async fn concurrent_put_and_get_never_observe_partial_record() {
    let (_temp_dir, database) = create_test_database().await;

    let entry = JournalEntry::new(
        "concurrency probe".to_string(),
        Mood::Excited,
        2,
        Some(vec![0.75; TEST_DIM]),
    );
    let id = entry.id;

    let writer = {
        let database = database.clone();
        let entry = entry.clone();
        tokio::spawn(async move {
            for _ in 0..25 {
                database
                    .put_journal_entry(&entry)
                    .await
                    .expect("Put should succeed");
            }
        })
    };

    let reader = {
        let database = database.clone();
        tokio::spawn(async move {
            for _ in 0..25 {
                if let Some(seen) = database
                    .get_journal_entry(id)
                    .await
                    .expect("Get should succeed")
                {
                    // The record and its embedding land in one statement:
                    // once visible, both are.
                    assert_eq!(seen.text, "concurrency probe");
                    assert_eq!(seen.embedding, Some(vec![0.75; TEST_DIM]));
                }
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.expect("Writer task should not panic");
    reader.await.expect("Reader task should not panic");
}
