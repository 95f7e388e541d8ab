// Database module
// Durable storage for journal entries and chat messages (SQLite via sqlx)

pub mod sqlite;

pub use sqlite::*;
