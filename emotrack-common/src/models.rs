//! Emotion domain types
//!
//! Samples are produced once per classified frame and never mutated.
//! A `TrendSummary` is derived from all persisted samples of one session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Row id of the user owning a session
pub type IdentityId = i64;

/// Closed set of emotion labels accepted for persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Surprised,
    Neutral,
    Fear,
    Disappointment,
    Grief,
    Loneliness,
    Melancholy,
    Joy,
    Excitement,
    Contentment,
    Pride,
    Frustration,
    Rage,
    Irritation,
    Anxiety,
    Dread,
    Panic,
    Worry,
    Amazement,
    Astonishment,
    Shock,
    Embarrassment,
    Shame,
    Guilt,
    Hope,
    Disgust,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 29] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Surprised,
        EmotionLabel::Neutral,
        EmotionLabel::Fear,
        EmotionLabel::Disappointment,
        EmotionLabel::Grief,
        EmotionLabel::Loneliness,
        EmotionLabel::Melancholy,
        EmotionLabel::Joy,
        EmotionLabel::Excitement,
        EmotionLabel::Contentment,
        EmotionLabel::Pride,
        EmotionLabel::Frustration,
        EmotionLabel::Rage,
        EmotionLabel::Irritation,
        EmotionLabel::Anxiety,
        EmotionLabel::Dread,
        EmotionLabel::Panic,
        EmotionLabel::Worry,
        EmotionLabel::Amazement,
        EmotionLabel::Astonishment,
        EmotionLabel::Shock,
        EmotionLabel::Embarrassment,
        EmotionLabel::Shame,
        EmotionLabel::Guilt,
        EmotionLabel::Hope,
        EmotionLabel::Disgust,
    ];

    /// Lower-case name used on the wire and in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Surprised => "surprised",
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Disappointment => "disappointment",
            EmotionLabel::Grief => "grief",
            EmotionLabel::Loneliness => "loneliness",
            EmotionLabel::Melancholy => "melancholy",
            EmotionLabel::Joy => "joy",
            EmotionLabel::Excitement => "excitement",
            EmotionLabel::Contentment => "contentment",
            EmotionLabel::Pride => "pride",
            EmotionLabel::Frustration => "frustration",
            EmotionLabel::Rage => "rage",
            EmotionLabel::Irritation => "irritation",
            EmotionLabel::Anxiety => "anxiety",
            EmotionLabel::Dread => "dread",
            EmotionLabel::Panic => "panic",
            EmotionLabel::Worry => "worry",
            EmotionLabel::Amazement => "amazement",
            EmotionLabel::Astonishment => "astonishment",
            EmotionLabel::Shock => "shock",
            EmotionLabel::Embarrassment => "embarrassment",
            EmotionLabel::Shame => "shame",
            EmotionLabel::Guilt => "guilt",
            EmotionLabel::Hope => "hope",
            EmotionLabel::Disgust => "disgust",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = Error;

    /// Case-insensitive; accepts the classifier alias `surprise`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let name = match normalized.as_str() {
            "surprise" => "surprised",
            other => other,
        };

        EmotionLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == name)
            .ok_or_else(|| Error::UnknownEmotion(s.to_string()))
    }
}

/// One classified frame attributed to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub session_id: Uuid,
    pub identity_id: IdentityId,
    pub emotion: EmotionLabel,
    /// Normalized to [0, 1]
    pub confidence: f64,
    pub captured_at: DateTime<Utc>,
}

/// Per-label aggregate within a trend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelStats {
    pub count: u32,
    pub avg_confidence: f64,
}

/// Per-session aggregate of samples, computed once at close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub session_id: Uuid,
    pub identity_id: IdentityId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub per_label: BTreeMap<EmotionLabel, LabelStats>,
    /// Unweighted mean of the per-label averages
    pub overall_avg_confidence: f64,
}

impl TrendSummary {
    /// Build a trend from a session's persisted samples
    ///
    /// Returns `None` for an empty slice: a session without samples has no trend.
    /// `overall_avg_confidence` deliberately ignores per-label counts.
    pub fn from_samples(session_id: Uuid, identity_id: IdentityId, samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?;

        let mut totals: BTreeMap<EmotionLabel, (u32, f64)> = BTreeMap::new();
        let mut period_start = first.captured_at;
        let mut period_end = first.captured_at;

        for sample in samples {
            let entry = totals.entry(sample.emotion).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += sample.confidence;
            period_start = period_start.min(sample.captured_at);
            period_end = period_end.max(sample.captured_at);
        }

        let per_label: BTreeMap<EmotionLabel, LabelStats> = totals
            .into_iter()
            .map(|(label, (count, sum))| {
                (
                    label,
                    LabelStats {
                        count,
                        avg_confidence: sum / count as f64,
                    },
                )
            })
            .collect();

        let overall_avg_confidence =
            per_label.values().map(|s| s.avg_confidence).sum::<f64>() / per_label.len() as f64;

        Some(Self {
            session_id,
            identity_id,
            period_start,
            period_end,
            per_label,
            overall_avg_confidence,
        })
    }

    /// Total samples across all labels
    pub fn sample_count(&self) -> u32 {
        self.per_label.values().map(|s| s.count).sum()
    }

    /// Most frequent label; ties go to the earlier label in declaration order
    pub fn dominant_emotion(&self) -> Option<EmotionLabel> {
        self.per_label
            .iter()
            .fold(None, |best: Option<(EmotionLabel, u32)>, (label, stats)| match best {
                Some((_, count)) if count >= stats.count => best,
                _ => Some((*label, stats.count)),
            })
            .map(|(label, _)| label)
    }
}

/// A produced report document and the trend it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub identity_id: IdentityId,
    pub session_id: Uuid,
    pub file_path: PathBuf,
    pub dominant_emotion: Option<EmotionLabel>,
    pub generated_at: DateTime<Utc>,
}
