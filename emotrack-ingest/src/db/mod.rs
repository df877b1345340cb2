//! Database access layer
//!
//! SQLite implementations of the persistence collaborators: sample batches,
//! trend summaries, identity lookups and report records.

pub mod identity;
pub mod reports;
pub mod samples;

pub use identity::{store_token, token_digest, SqliteIdentityResolver};
pub use reports::{count_reports, insert_report};
pub use samples::{EmotionRepository, SqliteEmotionRepository};
