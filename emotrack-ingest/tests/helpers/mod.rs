//! Shared fixtures for emotrack-ingest integration tests
//!
//! Test frames carry their scripted inference result in pixel (0, 0):
//! red 0 = no face, red 1 = classifier failure, red >= 2 = label
//! `EmotionLabel::ALL[red - 2]` with the green channel as a percentage score.
//! The remaining pixels are random noise so every frame is well above the
//! default minimum size.

#![allow(dead_code)]

use async_trait::async_trait;
use emotrack_common::{EmotionLabel, EventBus, IdentityId, Sample, ReportRecord, TrendSummary};
use emotrack_ingest::config::IngestConfig;
use emotrack_ingest::db::EmotionRepository;
use emotrack_ingest::identity::IdentityResolver;
use emotrack_ingest::inference::{EmotionClassifier, FaceDetector, Frame, InferencePool, RawClassification};
use emotrack_ingest::protocol::{CloseReason, ServerEvent};
use emotrack_ingest::report::ReportGenerator;
use emotrack_ingest::session::{Inbound, Transport};
use emotrack_ingest::{Error, Result, SessionServices};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::Rng;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const TOKEN_ONE: &str = "token-one";
pub const TOKEN_TWO: &str = "token-two";

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum FrameScript {
    NoFace,
    Fail,
    Emotion(EmotionLabel, u8),
}

/// PNG frame with the scripted result encoded in pixel (0, 0)
pub fn frame(script: FrameScript) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut img = RgbImage::from_fn(48, 48, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]));

    let marker = match script {
        FrameScript::NoFace => Rgb([0, 0, 0]),
        FrameScript::Fail => Rgb([1, 0, 0]),
        FrameScript::Emotion(label, percent) => {
            let index = EmotionLabel::ALL
                .iter()
                .position(|l| *l == label)
                .unwrap_or(0);
            Rgb([index as u8 + 2, percent, 0])
        }
    };
    img.put_pixel(0, 0, marker);

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn emotion_frame(label: EmotionLabel, percent: u8) -> Vec<u8> {
    frame(FrameScript::Emotion(label, percent))
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Fixed token → identity table
pub struct StaticIdentity {
    tokens: HashMap<String, IdentityId>,
    delay: Duration,
}

impl StaticIdentity {
    pub fn standard() -> Self {
        let tokens = [(TOKEN_ONE.to_string(), 1), (TOKEN_TWO.to_string(), 2)]
            .into_iter()
            .collect();
        Self {
            tokens,
            delay: Duration::ZERO,
        }
    }

    /// Same table, answering only after `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::standard()
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve(&self, credential: &str) -> Result<IdentityId> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.tokens
            .get(credential)
            .copied()
            .ok_or_else(|| Error::Auth("unknown token".to_string()))
    }
}

/// Detector + classifier driven by the frame marker pixel
#[derive(Default)]
pub struct ScriptedInference {
    pub delay: Duration,
    pub classify_calls: AtomicUsize,
}

impl ScriptedInference {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

fn marker(frame: &Frame) -> [u8; 3] {
    frame.image().to_rgb8().get_pixel(0, 0).0
}

#[async_trait]
impl FaceDetector for ScriptedInference {
    async fn has_face(&self, frame: &Frame) -> Result<bool> {
        Ok(marker(frame)[0] != 0)
    }
}

#[async_trait]
impl EmotionClassifier for ScriptedInference {
    async fn classify(&self, frame: &Frame) -> Result<RawClassification> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let [red, green, _] = marker(frame);
        if red == 1 {
            return Err(Error::Inference("scripted failure".to_string()));
        }

        let label = EmotionLabel::ALL[(red as usize - 2) % EmotionLabel::ALL.len()];
        Ok(RawClassification {
            label: label.as_str().to_string(),
            score: green as f64,
        })
    }
}

/// In-memory repository with switchable failures and call counters
#[derive(Default)]
pub struct MemoryRepository {
    samples: Mutex<Vec<Sample>>,
    trends: Mutex<Vec<TrendSummary>>,
    pub batch_sizes: Mutex<Vec<usize>>,
    pub fail_samples: AtomicBool,
    pub fail_trends: AtomicBool,
    pub query_calls: AtomicUsize,
    /// Milliseconds each batch write takes after its rows are stored
    pub write_delay_ms: AtomicU64,
}

impl MemoryRepository {
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().clone()
    }

    pub fn trends(&self) -> Vec<TrendSummary> {
        self.trends.lock().unwrap().clone()
    }

    pub fn flushed_total(&self) -> usize {
        self.batch_sizes.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl EmotionRepository for MemoryRepository {
    async fn save_samples(&self, batch: &[Sample]) -> Result<()> {
        if self.fail_samples.load(Ordering::SeqCst) {
            return Err(Error::Persistence("injected failure".to_string()));
        }
        self.samples.lock().unwrap().extend_from_slice(batch);
        self.batch_sizes.lock().unwrap().push(batch.len());

        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(())
    }

    async fn query_samples(&self, session_id: uuid::Uuid) -> Result<Vec<Sample>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .samples
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn save_trend(&self, trend: &TrendSummary) -> Result<()> {
        if self.fail_trends.load(Ordering::SeqCst) {
            return Err(Error::TrendPersistence("injected failure".to_string()));
        }
        self.trends.lock().unwrap().push(trend.clone());
        Ok(())
    }
}

/// Report generator that records trends, or fails on demand
#[derive(Default)]
pub struct RecordingReports {
    pub fail: AtomicBool,
    received: Mutex<Vec<TrendSummary>>,
}

impl RecordingReports {
    pub fn received(&self) -> Vec<TrendSummary> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportGenerator for RecordingReports {
    async fn generate(&self, trend: &TrendSummary) -> Result<ReportRecord> {
        self.received.lock().unwrap().push(trend.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Report("injected failure".to_string()));
        }
        Ok(ReportRecord {
            identity_id: trend.identity_id,
            session_id: trend.session_id,
            file_path: PathBuf::from("memory://report.json"),
            dominant_emotion: trend.dominant_emotion(),
            generated_at: chrono::Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Config with short timers for tests
pub fn fast_config() -> IngestConfig {
    let mut config = IngestConfig::default();
    config.frames.min_interval_ms = 0;
    config.session.idle_timeout_ms = 2000;
    config.session.preempt_wait_ms = 2000;
    config.buffer.flush_interval_ms = 50;
    config.buffer.write_timeout_ms = 1000;
    config.inference.workers = 2;
    config.inference.timeout_ms = 2000;
    config
}

pub struct TestContext {
    pub services: SessionServices,
    pub repo: Arc<MemoryRepository>,
    pub reports: Arc<RecordingReports>,
    pub inference: Arc<ScriptedInference>,
    pub events: EventBus,
}

pub fn test_context(config: IngestConfig) -> TestContext {
    test_context_with(config, StaticIdentity::standard(), ScriptedInference::default())
}

pub fn test_context_with(
    config: IngestConfig,
    identity: StaticIdentity,
    inference: ScriptedInference,
) -> TestContext {
    let repo = Arc::new(MemoryRepository::default());
    let reports = Arc::new(RecordingReports::default());
    let inference = Arc::new(inference);
    let events = EventBus::new(64);

    let pool = Arc::new(InferencePool::from_config(
        inference.clone(),
        inference.clone(),
        &config.inference,
    ));
    let services = SessionServices::new(
        config,
        Arc::new(identity),
        pool,
        repo.clone(),
        reports.clone(),
        events.clone(),
    );

    TestContext {
        services,
        repo,
        reports,
        inference,
        events,
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// ---------------------------------------------------------------------------
// Channel transport
// ---------------------------------------------------------------------------

/// What the server sent to the client
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(serde_json::Value),
    Close(u16),
}

/// Shared ordering log across transports ("<label>:<what>")
pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct ChannelTransport {
    label: String,
    inbound: mpsc::Receiver<Inbound>,
    outbound: mpsc::UnboundedSender<Outbound>,
    journal: Journal,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Inbound> {
        Ok(self.inbound.recv().await.unwrap_or(Inbound::Closed))
    }

    async fn send(&mut self, event: &ServerEvent) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(&event.to_text())?;
        let what = value
            .get("status")
            .or_else(|| value.get("emotion"))
            .and_then(|v| v.as_str())
            .unwrap_or("error")
            .to_string();
        self.journal.lock().unwrap().push(format!("{}:{}", self.label, what));
        self.outbound
            .send(Outbound::Event(value))
            .map_err(|_| Error::Transport("client gone".to_string()))
    }

    async fn close(&mut self, reason: CloseReason) -> Result<()> {
        self.journal.lock().unwrap().push(format!("{}:close", self.label));
        self.outbound
            .send(Outbound::Close(reason.code()))
            .map_err(|_| Error::Transport("client gone".to_string()))
    }
}

/// Test side of a channel transport
pub struct Client {
    tx: Option<mpsc::Sender<Inbound>>,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Client {
    pub async fn send_frame(&self, bytes: Vec<u8>) {
        self.sender().send(Inbound::Frame(bytes)).await.unwrap();
    }

    pub async fn send_text(&self, text: &str) {
        self.sender().send(Inbound::Text(text.to_string())).await.unwrap();
    }

    pub async fn end(&self) {
        self.send_text(r#"{"action":"end"}"#).await;
    }

    /// Drop the inbound side; the server sees a disconnect
    pub fn disconnect(&mut self) {
        self.tx = None;
    }

    fn sender(&self) -> &mpsc::Sender<Inbound> {
        self.tx.as_ref().expect("client already disconnected")
    }

    pub async fn next(&mut self) -> Outbound {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for server message")
            .expect("server side dropped")
    }

    pub async fn next_event(&mut self) -> serde_json::Value {
        match self.next().await {
            Outbound::Event(value) => value,
            other => panic!("expected event, got {:?}", other),
        }
    }

    /// Skip events until the close frame
    pub async fn close_code(&mut self) -> u16 {
        loop {
            if let Outbound::Close(code) = self.next().await {
                return code;
            }
        }
    }
}

pub fn channel_transport(label: &str, journal: &Journal) -> (ChannelTransport, Client) {
    let (in_tx, in_rx) = mpsc::channel(16);
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            label: label.to_string(),
            inbound: in_rx,
            outbound: out_tx,
            journal: Arc::clone(journal),
        },
        Client {
            tx: Some(in_tx),
            rx: out_rx,
        },
    )
}

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}
