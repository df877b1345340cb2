//! emotrack-ingest configuration
//!
//! Loaded from the `[ingest]` table of the service TOML file. Every key has a
//! compiled default, so a missing file or table still yields a usable config.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level TOML layout for the ingest service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: Option<String>,
    pub ingest: IngestConfig,
}

/// Ingest service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub bind_addr: String,
    pub frames: FrameConfig,
    pub session: SessionConfig,
    pub buffer: BufferConfig,
    pub inference: InferenceConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5780".to_string(),
            frames: FrameConfig::default(),
            session: SessionConfig::default(),
            buffer: BufferConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

/// Frame validation and pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Smallest accepted frame, inclusive
    pub min_bytes: usize,
    /// Largest accepted frame, inclusive
    pub max_bytes: usize,
    /// Minimum spacing between processed frames of one session
    pub min_interval_ms: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            min_bytes: 1024,
            max_bytes: 5 * 1024 * 1024,
            min_interval_ms: 100,
        }
    }
}

impl FrameConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Session lifecycle timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Read window before a keepalive ping is sent
    pub idle_timeout_ms: u64,
    /// Consecutive silent windows that end the session (the last one closes, the rest ping)
    pub idle_timeouts_before_close: u32,
    /// How long a new session waits for the session it preempted to close
    pub preempt_wait_ms: u64,
    /// Upper bound on sending the close frame; must stay below `preempt_wait_ms`
    pub close_timeout_ms: u64,
    /// Upper bound on the identity lookup during admission
    pub auth_timeout_ms: u64,
    /// Fixed-duration monitoring mode; unset streams until disconnect
    pub max_duration_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 5000,
            idle_timeouts_before_close: 2,
            preempt_wait_ms: 5000,
            close_timeout_ms: 1000,
            auth_timeout_ms: 5000,
            max_duration_secs: None,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn preempt_wait(&self) -> Duration {
        Duration::from_millis(self.preempt_wait_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

/// Sample buffer policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub flush_interval_ms: u64,
    /// Hard cap on unflushed samples; the oldest are dropped beyond it
    pub capacity: usize,
    /// Upper bound on a single batch write
    pub write_timeout_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 2000,
            capacity: 1000,
            write_timeout_ms: 3000,
        }
    }
}

impl BufferConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Inference backend and worker pool
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the HTTP inference backend
    pub endpoint: String,
    /// Concurrent detector/classifier calls across all sessions
    pub workers: usize,
    pub timeout_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5005".to_string(),
            workers: 4,
            timeout_ms: 10_000,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl IngestConfig {
    /// Reject values the session machinery cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.frames.min_bytes > self.frames.max_bytes {
            return Err(Error::Config(format!(
                "frames.min_bytes ({}) exceeds frames.max_bytes ({})",
                self.frames.min_bytes, self.frames.max_bytes
            )));
        }
        if self.inference.workers == 0 {
            return Err(Error::Config("inference.workers must be at least 1".to_string()));
        }
        if self.buffer.capacity == 0 {
            return Err(Error::Config("buffer.capacity must be at least 1".to_string()));
        }
        if self.buffer.flush_interval_ms == 0 || self.session.idle_timeout_ms == 0 {
            return Err(Error::Config(
                "buffer.flush_interval_ms and session.idle_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.session.idle_timeouts_before_close == 0 {
            return Err(Error::Config(
                "session.idle_timeouts_before_close must be at least 1".to_string(),
            ));
        }
        // A preempted session stops within the close bound, so the waiting
        // session always sees it stop first
        if self.session.preempt_wait_ms <= self.session.close_timeout_ms {
            return Err(Error::Config(format!(
                "session.preempt_wait_ms ({}) must exceed session.close_timeout_ms ({})",
                self.session.preempt_wait_ms, self.session.close_timeout_ms
            )));
        }
        if self.session.auth_timeout_ms == 0 {
            return Err(Error::Config("session.auth_timeout_ms must be non-zero".to_string()));
        }
        Ok(())
    }
}
