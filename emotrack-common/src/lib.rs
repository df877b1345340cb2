//! # Emotrack Common Library
//!
//! Shared code for Emotrack services including:
//! - Emotion domain types (labels, samples, trend summaries)
//! - Trend computation
//! - Monitor events and the EventBus
//! - Configuration loading and root folder resolution
//! - Database initialization

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, MonitorEvent};
pub use models::{EmotionLabel, IdentityId, LabelStats, ReportRecord, Sample, TrendSummary};
