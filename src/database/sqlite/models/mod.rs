
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

/// One journal entry. `id` and `created_at` are assigned at creation and
/// never change; `embedding`, when present, has the store's configured
/// dimension exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub text: String,
    pub mood: Mood,
    pub intensity: i64,
    pub created_at: NaiveDateTime,
    pub embedding: Option<Vec<f32>>,
}

/// Closed set of mood tags a journal entry can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Anxious,
    Calm,
    Excited,
    Angry,
    Stressed,
    Content,
    Grateful,
    Confused,
    Lonely,
    Hopeful,
    Neutral,
}

impl std::fmt::Display for Mood {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Mood::Happy => write!(f, "Happy"),
            Mood::Sad => write!(f, "Sad"),
            Mood::Anxious => write!(f, "Anxious"),
            Mood::Calm => write!(f, "Calm"),
            Mood::Excited => write!(f, "Excited"),
            Mood::Angry => write!(f, "Angry"),
            Mood::Stressed => write!(f, "Stressed"),
            Mood::Content => write!(f, "Content"),
            Mood::Grateful => write!(f, "Grateful"),
            Mood::Confused => write!(f, "Confused"),
            Mood::Lonely => write!(f, "Lonely"),
            Mood::Hopeful => write!(f, "Hopeful"),
            Mood::Neutral => write!(f, "Neutral"),
        }
    }
}

/// One message in a conversation. `chat_id` is not referentially enforced;
/// orphaned messages are tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub text: String,
    pub is_user: bool,
    pub created_at: NaiveDateTime,
    pub is_starred: bool,
    pub embedding: Option<Vec<f32>>,
}

impl JournalEntry {
    #[inline]
    pub fn new(text: String, mood: Mood, intensity: i64, embedding: Option<Vec<f32>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            mood,
            intensity,
            created_at: Utc::now().naive_utc(),
            embedding,
        }
    }

    #[inline]
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

impl ChatMessage {
    #[inline]
    pub fn new(chat_id: Uuid, text: String, is_user: bool, embedding: Option<Vec<f32>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            text,
            is_user,
            created_at: Utc::now().naive_utc(),
            is_starred: false,
            embedding,
        }
    }

    #[inline]
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}
