//! Word → label knowledge base.
//!
//! A knowledge base only ever grows: every observed span overwrites the entry
//! for its literal text (last write wins). Words iterate in sorted order so
//! that candidate generation is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, MalformedDocument};
use crate::record::{Document, Feature, Span};

/// Label and score last observed for a word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// The label to propagate.
    pub label: String,
    /// Score copied onto propagated spans.
    #[serde(default)]
    pub score: Option<f64>,
}

impl KnowledgeEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(label: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// One `ingest` write: the word, what was stored, and what it replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeWrite {
    /// The literal span text.
    pub word: String,
    /// The entry now stored.
    pub entry: KnowledgeEntry,
    /// The entry stored before this write, if any.
    pub previous: Option<KnowledgeEntry>,
}

/// Optional allow-list of labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    allowed: Option<BTreeSet<String>>,
}

impl LabelFilter {
    /// Accept every label.
    #[must_use]
    pub const fn all() -> Self {
        Self { allowed: None }
    }

    /// Accept only the given labels.
    #[must_use]
    pub fn only<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: Some(labels.into_iter().map(Into::into).collect()),
        }
    }

    /// Build from an optional allow-list.
    #[must_use]
    pub fn from_option(labels: Option<&BTreeSet<String>>) -> Self {
        Self {
            allowed: labels.cloned(),
        }
    }

    /// True if `label` passes the filter.
    #[must_use]
    pub fn allows(&self, label: &str) -> bool {
        self.allowed.as_ref().map_or(true, |set| set.contains(label))
    }
}

/// Mapping from literal word to its most recently observed label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    entries: BTreeMap<String, KnowledgeEntry>,
}

impl KnowledgeBase {
    /// Creates an empty knowledge base.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot in the `{"word": {"label": .., "score": ..}}` shape.
    ///
    /// # Errors
    /// `InvalidJson` if the snapshot does not parse.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidJson {
            reason: e.to_string(),
        })
    }

    /// Export a snapshot in the same shape `from_json` reads.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::Value::from(
            self.entries
                .iter()
                .map(|(word, entry)| {
                    (
                        word.clone(),
                        serde_json::json!({ "label": entry.label, "score": entry.score }),
                    )
                })
                .collect::<serde_json::Map<_, _>>(),
        )
        .to_string()
    }

    /// Entry for a word.
    #[must_use]
    pub fn get(&self, word: &str) -> Option<&KnowledgeEntry> {
        self.entries.get(word)
    }

    /// Set the entry for a word. Returns true if the stored entry changed.
    pub fn insert(&mut self, word: impl Into<String>, entry: KnowledgeEntry) -> bool {
        let word = word.into();
        if self.entries.get(&word) == Some(&entry) {
            return false;
        }
        self.entries.insert(word, entry);
        true
    }

    /// Number of known words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been learned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Known words, in sorted order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(word, entry)` pairs, in sorted word order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KnowledgeEntry)> {
        self.entries.iter().map(|(w, e)| (w.as_str(), e))
    }

    /// Learn from `spans` observed on `doc`.
    ///
    /// Every span whose label passes `filter` sets `kb[text[start..end]]`.
    /// Returns the writes that were applied, in span order, including writes
    /// that left the entry unchanged. Empty spans and spans outside the text
    /// are skipped with a warning.
    pub fn ingest(&mut self, doc: &Document, spans: &[Span], filter: &LabelFilter) -> Vec<KnowledgeWrite> {
        let Some(text) = doc.text.as_deref() else {
            if !spans.is_empty() {
                tracing::debug!(error = %MalformedDocument::MissingText { id: doc.id }, "nothing to learn");
            }
            return Vec::new();
        };

        let len = text.chars().count();
        let mut writes = Vec::with_capacity(spans.len());

        for span in spans {
            if !filter.allows(&span.label) {
                continue;
            }
            if let Err(err) = MalformedDocument::check_span(doc.id, span, len) {
                tracing::warn!(error = %err, "skipping span");
                continue;
            }
            let Some(word) = doc.span_text(span) else {
                continue;
            };
            let entry = KnowledgeEntry::new(span.label.clone(), span.score);
            let previous = self.entries.insert(word.clone(), entry.clone());
            writes.push(KnowledgeWrite { word, entry, previous });
        }

        writes
    }
}

/// The two independent knowledge bases a copycat session owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBases {
    /// Fed by prior predictions.
    #[serde(default)]
    pub predictions: KnowledgeBase,
    /// Fed by prior annotations.
    #[serde(default)]
    pub annotations: KnowledgeBase,
}

impl KnowledgeBases {
    /// Creates two empty knowledge bases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The knowledge base feeding a feature.
    #[must_use]
    pub const fn get(&self, feature: Feature) -> &KnowledgeBase {
        match feature {
            Feature::Predictions => &self.predictions,
            Feature::Annotations => &self.annotations,
        }
    }

    /// Mutable access to the knowledge base feeding a feature.
    pub fn get_mut(&mut self, feature: Feature) -> &mut KnowledgeBase {
        match feature {
            Feature::Predictions => &mut self.predictions,
            Feature::Annotations => &mut self.annotations,
        }
    }
}
