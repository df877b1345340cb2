//! HTTP inference backend
//!
//! Talks to an inference sidecar that hosts the face detector and the emotion
//! model. The raw encoded frame is posted as the request body.
//!
//! - `POST {endpoint}/detect` → `{"face_detected": bool}`
//! - `POST {endpoint}/analyze` → `{"dominant_emotion": str, "emotion": {label: score}}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{EmotionClassifier, FaceDetector, Frame, RawClassification};
use crate::config::InferenceConfig;
use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("emotrack-ingest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectResponse {
    pub face_detected: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzeResponse {
    pub dominant_emotion: String,
    /// Score per label, probabilities or percentages depending on the model
    #[serde(default)]
    pub emotion: HashMap<String, f64>,
}

impl AnalyzeResponse {
    /// Dominant label with its own score
    ///
    /// A missing score for the dominant label counts as a failed analysis.
    pub fn into_classification(self) -> Result<RawClassification> {
        let score = self.emotion.get(&self.dominant_emotion).copied().ok_or_else(|| {
            Error::Inference(format!("no score for dominant label '{}'", self.dominant_emotion))
        })?;

        Ok(RawClassification {
            label: self.dominant_emotion,
            score,
        })
    }
}

/// Face detector and classifier backed by the inference sidecar
#[derive(Debug, Clone)]
pub struct HttpInferenceBackend {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpInferenceBackend {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Inference(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        Self::new(&config.endpoint, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_frame<T: serde::de::DeserializeOwned>(&self, path: &str, frame: &Frame) -> Result<T> {
        let url = format!("{}/{}", self.endpoint, path);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(frame.encoded().to_vec())
            .send()
            .await
            .map_err(|e| Error::Inference(format!("{}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "{} returned {}: {}",
                path,
                status.as_u16(),
                error_text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Inference(format!("{} response: {}", path, e)))
    }
}

#[async_trait]
impl FaceDetector for HttpInferenceBackend {
    async fn has_face(&self, frame: &Frame) -> Result<bool> {
        let detect: DetectResponse = self.post_frame("detect", frame).await?;
        Ok(detect.face_detected)
    }
}

#[async_trait]
impl EmotionClassifier for HttpInferenceBackend {
    async fn classify(&self, frame: &Frame) -> Result<RawClassification> {
        let analysis: AnalyzeResponse = self.post_frame("analyze", frame).await?;
        tracing::trace!(dominant = %analysis.dominant_emotion, "Sidecar analysis");
        analysis.into_classification()
    }
}
