//! Inference adapter
//!
//! Wraps the external face-presence check and emotion classifier and
//! normalizes their outputs into a [`FrameAnalysis`].
//!
//! Detector and classifier calls from every session share one
//! [`InferencePool`]: a semaphore with a fixed number of permits bounds
//! concurrent inference, so a slow call only delays the sessions queued
//! behind it for a permit while every session keeps servicing its socket.
//! Frame decoding runs on tokio's blocking pool.

pub mod frame;
pub mod http;

pub use frame::Frame;
pub use http::HttpInferenceBackend;

use async_trait::async_trait;
use emotrack_common::EmotionLabel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::InferenceConfig;
use crate::error::{Error, Result};

/// Raw classifier output before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawClassification {
    /// Dominant label as reported by the model
    pub label: String,
    /// Score of the dominant label, either a probability or a percentage
    pub score: f64,
}

/// External face-presence check
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn has_face(&self, frame: &Frame) -> Result<bool>;
}

/// External emotion classifier
///
/// In-process CPU-bound models should move their work onto
/// `tokio::task::spawn_blocking`.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, frame: &Frame) -> Result<RawClassification>;
}

/// Outcome of running one decoded frame through inference
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAnalysis {
    /// No face in the frame; nothing is recorded
    NoFace,
    /// A face was classified with a known label
    Classified {
        emotion: EmotionLabel,
        confidence: f64,
    },
    /// Detector or classifier failed, timed out, or produced an unusable label
    Failed(String),
}

/// Map raw classifier output onto the label set and [0, 1] confidence
///
/// Scores above 1 are treated as percentages.
pub fn normalize(raw: &RawClassification) -> Result<(EmotionLabel, f64)> {
    let emotion = raw
        .label
        .parse::<EmotionLabel>()
        .map_err(|_| Error::Inference(format!("unsupported label '{}'", raw.label)))?;

    if !raw.score.is_finite() {
        return Err(Error::Inference(format!("non-finite score for '{}'", raw.label)));
    }

    let confidence = if raw.score > 1.0 {
        raw.score / 100.0
    } else {
        raw.score
    };

    Ok((emotion, confidence.clamp(0.0, 1.0)))
}

/// Shared, bounded worker pool for inference calls
pub struct InferencePool {
    detector: Arc<dyn FaceDetector>,
    classifier: Arc<dyn EmotionClassifier>,
    permits: Arc<Semaphore>,
    workers: usize,
    timeout: Duration,
}

impl InferencePool {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        classifier: Arc<dyn EmotionClassifier>,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            detector,
            classifier,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            timeout,
        }
    }

    pub fn from_config(
        detector: Arc<dyn FaceDetector>,
        classifier: Arc<dyn EmotionClassifier>,
        config: &InferenceConfig,
    ) -> Self {
        Self::new(detector, classifier, config.workers, config.timeout())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Permits not currently held by an inference call
    pub fn idle_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Decode on the blocking pool
    pub async fn decode(&self, bytes: Vec<u8>) -> Result<Frame> {
        tokio::task::spawn_blocking(move || frame::decode(bytes))
            .await
            .map_err(|e| Error::Inference(format!("decode task failed: {}", e)))?
    }

    /// Face check then classification, holding one permit for both calls
    pub async fn analyze(&self, frame: &Frame) -> FrameAnalysis {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return FrameAnalysis::Failed("inference pool closed".to_string()),
        };

        let work = async {
            if !self.detector.has_face(frame).await? {
                return Ok(None);
            }
            let raw = self.classifier.classify(frame).await?;
            normalize(&raw).map(Some)
        };

        match tokio::time::timeout(self.timeout, work).await {
            Err(_) => FrameAnalysis::Failed(format!("inference timed out after {:?}", self.timeout)),
            Ok(Err(e)) => FrameAnalysis::Failed(e.to_string()),
            Ok(Ok(None)) => FrameAnalysis::NoFace,
            Ok(Ok(Some((emotion, confidence)))) => FrameAnalysis::Classified { emotion, confidence },
        }
    }
}

/// Per-session counters
#[derive(Debug, Default)]
pub struct InferenceStats {
    pub classified: AtomicU64,
    pub no_face: AtomicU64,
    pub failed: AtomicU64,
}

/// One session's view of the shared pool
///
/// Adds session-scoped logging and counters around [`InferencePool::analyze`].
pub struct InferenceAdapter {
    pool: Arc<InferencePool>,
    session_id: Uuid,
    stats: InferenceStats,
}

impl InferenceAdapter {
    pub fn new(pool: Arc<InferencePool>, session_id: Uuid) -> Self {
        Self {
            pool,
            session_id,
            stats: InferenceStats::default(),
        }
    }

    pub async fn decode(&self, bytes: Vec<u8>) -> Result<Frame> {
        self.pool.decode(bytes).await
    }

    pub async fn analyze(&self, frame: &Frame) -> FrameAnalysis {
        let analysis = self.pool.analyze(frame).await;

        match &analysis {
            FrameAnalysis::Classified { emotion, confidence } => {
                self.stats.classified.fetch_add(1, Ordering::Relaxed);
                debug!(session_id = %self.session_id, %emotion, confidence, "Frame classified");
            }
            FrameAnalysis::NoFace => {
                self.stats.no_face.fetch_add(1, Ordering::Relaxed);
            }
            FrameAnalysis::Failed(reason) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(session_id = %self.session_id, "Analysis error: {}", reason);
            }
        }

        analysis
    }

    pub fn stats(&self) -> &InferenceStats {
        &self.stats
    }
}
