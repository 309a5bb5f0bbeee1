//! Mood classification: text → sentiment score → discrete label.
//!
//! Scoring is delegated to a [`SentimentScorer`]; the classifier only applies the
//! thresholds, so the label is a pure function of the score.

mod lexicon;

pub use lexicon::{LexiconScorer, SentimentScorer};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Discrete mood derived from a sentiment score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoodLabel {
    #[serde(rename = "Positive")]
    Positive,
    #[serde(rename = "Slightly Positive")]
    SlightlyPositive,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Slightly Negative")]
    SlightlyNegative,
    #[serde(rename = "Negative")]
    Negative,
}

impl MoodLabel {
    /// Thresholds evaluated high to low; first match wins.
    pub fn from_score(score: i32) -> Self {
        if score > 2 {
            Self::Positive
        } else if score > 0 {
            Self::SlightlyPositive
        } else if score == 0 {
            Self::Neutral
        } else if score >= -2 {
            Self::SlightlyNegative
        } else {
            Self::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::SlightlyPositive => "Slightly Positive",
            Self::Neutral => "Neutral",
            Self::SlightlyNegative => "Slightly Negative",
            Self::Negative => "Negative",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Positive => "😄",
            Self::SlightlyPositive => "🙂",
            Self::Neutral => "😐",
            Self::SlightlyNegative => "😞",
            Self::Negative => "😢",
        }
    }
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one analysis call. Serializes as `{"mood", "score"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    #[serde(rename = "mood")]
    pub label: MoodLabel,
    pub score: i32,
}

/// Applies the mood thresholds to whatever the configured scorer returns.
#[derive(Clone)]
pub struct MoodClassifier {
    scorer: Arc<dyn SentimentScorer>,
}

impl MoodClassifier {
    pub fn new(scorer: Arc<dyn SentimentScorer>) -> Self {
        Self { scorer }
    }

    /// Never fails. Empty text scores 0.
    pub fn classify(&self, text: &str) -> Classification {
        let score = self.scorer.score(text);
        Classification {
            label: MoodLabel::from_score(score),
            score,
        }
    }
}

impl Default for MoodClassifier {
    fn default() -> Self {
        Self::new(Arc::new(LexiconScorer::default()))
    }
}

impl fmt::Debug for MoodClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoodClassifier").finish_non_exhaustive()
    }
}
