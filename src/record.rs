//! Record types shared by every listener.
//!
//! A `Document` is the host's view of one dataset record. Spans use
//! character offsets (Unicode scalar values), not byte offsets.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A labelled character range `[start, end)` with an optional confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// The label assigned to the range.
    pub label: String,
    /// First character offset (inclusive).
    pub start: usize,
    /// Last character offset (exclusive).
    pub end: usize,
    /// Confidence, if the producer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Span {
    /// Creates a span without a score.
    #[must_use]
    pub fn new(label: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            label: label.into(),
            start,
            end,
            score: None,
        }
    }

    /// Creates a span carrying a score.
    #[must_use]
    pub fn scored(label: impl Into<String>, start: usize, end: usize, score: f64) -> Self {
        Self {
            label: label.into(),
            start,
            end,
            score: Some(score),
        }
    }

    /// Number of characters covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True when the span covers nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.score {
            Some(score) => write!(f, "{}[{}, {})@{score:.2}", self.label, self.start, self.end),
            None => write!(f, "{}[{}, {})", self.label, self.start, self.end),
        }
    }
}

/// Which span set of a document a listener works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Model predictions.
    Predictions,
    /// Human annotations.
    Annotations,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predictions => write!(f, "predictions"),
            Self::Annotations => write!(f, "annotations"),
        }
    }
}

/// One dataset record as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Record identifier.
    pub id: RecordId,
    /// Raw text, if the record has any.
    #[serde(default)]
    pub text: Option<String>,
    /// Pre-tokenized text, in positional order.
    #[serde(default)]
    pub tokens: Option<Vec<String>>,
    /// Human annotations.
    #[serde(default)]
    pub annotation: Vec<Span>,
    /// Model predictions.
    #[serde(default)]
    pub prediction: Vec<Span>,
    /// Named embedding vectors.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vectors: HashMap<String, Vec<f32>>,
    /// When the host last recorded an event for this record.
    pub event_timestamp: DateTime<Utc>,
}

impl Document {
    /// Creates a tokenized record with no spans.
    #[must_use]
    pub fn new<T: Into<String>>(text: impl Into<String>, tokens: impl IntoIterator<Item = T>) -> Self {
        Self {
            id: RecordId::new(),
            text: Some(text.into()),
            tokens: Some(tokens.into_iter().map(Into::into).collect()),
            annotation: Vec::new(),
            prediction: Vec::new(),
            vectors: HashMap::new(),
            event_timestamp: Utc::now(),
        }
    }

    /// Creates a record with text only.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            text: Some(text.into()),
            tokens: None,
            annotation: Vec::new(),
            prediction: Vec::new(),
            vectors: HashMap::new(),
            event_timestamp: Utc::now(),
        }
    }

    /// Replace the annotation set.
    #[must_use]
    pub fn with_annotation(mut self, spans: Vec<Span>) -> Self {
        self.annotation = spans;
        self
    }

    /// Replace the prediction set.
    #[must_use]
    pub fn with_prediction(mut self, spans: Vec<Span>) -> Self {
        self.prediction = spans;
        self
    }

    /// The span set backing a feature.
    #[must_use]
    pub fn spans(&self, feature: Feature) -> &[Span] {
        match feature {
            Feature::Predictions => &self.prediction,
            Feature::Annotations => &self.annotation,
        }
    }

    /// Mutable access to the span set backing a feature.
    pub fn spans_mut(&mut self, feature: Feature) -> &mut Vec<Span> {
        match feature {
            Feature::Predictions => &mut self.prediction,
            Feature::Annotations => &mut self.annotation,
        }
    }

    /// The text covered by a span, if the span lies inside the text.
    #[must_use]
    pub fn span_text(&self, span: &Span) -> Option<String> {
        let text = self.text.as_deref()?;
        if span.is_empty() {
            return None;
        }
        let covered: String = text.chars().skip(span.start).take(span.len()).collect();
        (covered.chars().count() == span.len()).then_some(covered)
    }
}
