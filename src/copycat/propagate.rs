//! Batch propagation of knowledge-base labels onto documents.
//!
//! A batch is processed in two phases. First every document's existing spans
//! are ingested into the knowledge base of the matching feature. Then, for
//! every document, words found in its text are proposed as spans, validated
//! against token boundaries, merged with the existing spans and resolved.
//!
//! Within one batch a document never receives knowledge it contributed
//! itself: a word written during the batch resolves, for document `d`, to the
//! last write made by another document, or else to what the knowledge base
//! held before the batch.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ListenerResult, MalformedDocument};
use crate::listener::RecordQuery;
use crate::record::{Document, Feature, Span};

use super::knowledge::{KnowledgeBase, KnowledgeBases, KnowledgeEntry, LabelFilter};
use super::occurrence::OccurrenceFinder;
use super::resolver::resolve_span_overlap;
use super::tokens::{token_spans, validate_token_boundary, TokenSpan};

/// Copycat configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopycatConfig {
    /// Propagate predictions from the predictions knowledge base.
    pub copy_predictions: bool,
    /// Propagate annotations from the annotations knowledge base.
    pub copy_annotations: bool,
    /// Only learn and propagate these labels. `None` allows every label.
    pub included_labels: Option<BTreeSet<String>>,
    /// Match words case-sensitively.
    pub case_sensitive: bool,
    /// Extra host filter for the records a trigger delivers.
    pub query: Option<RecordQuery>,
    /// Widen each batch with stored records containing newly learned words.
    pub reload_on_learn: bool,
    /// Initial predictions knowledge.
    pub seed_predictions: KnowledgeBase,
    /// Initial annotations knowledge.
    pub seed_annotations: KnowledgeBase,
}

impl Default for CopycatConfig {
    fn default() -> Self {
        Self {
            copy_predictions: true,
            copy_annotations: false,
            included_labels: None,
            case_sensitive: true,
            query: None,
            reload_on_learn: false,
            seed_predictions: KnowledgeBase::new(),
            seed_annotations: KnowledgeBase::new(),
        }
    }
}

impl CopycatConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// `InvalidJson` if it does not parse, `NoFeatureEnabled` if both
    /// features are off.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidJson {
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject a configuration that enables neither feature.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.copy_predictions && !self.copy_annotations {
            return Err(ConfigurationError::NoFeatureEnabled);
        }
        Ok(())
    }

    /// Enabled features, predictions first.
    #[must_use]
    pub fn features(&self) -> Vec<Feature> {
        let mut out = Vec::with_capacity(2);
        if self.copy_predictions {
            out.push(Feature::Predictions);
        }
        if self.copy_annotations {
            out.push(Feature::Annotations);
        }
        out
    }

    /// The `included_labels` allow-list as a filter.
    #[must_use]
    pub fn label_filter(&self) -> LabelFilter {
        LabelFilter::from_option(self.included_labels.as_ref())
    }
}

/// A processed document and whether its spans changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagated {
    /// The document with resolved spans.
    pub document: Document,
    /// True if its annotation or prediction set differs from the input.
    pub changed: bool,
}

/// Writes made to one knowledge base during the current batch.
#[derive(Debug, Default)]
struct BatchLedger {
    /// Entry held before the batch, per written word.
    before: HashMap<String, Option<KnowledgeEntry>>,
    /// `(document index, entry)` per written word, in write order.
    writes: HashMap<String, Vec<(usize, KnowledgeEntry)>>,
}

impl BatchLedger {
    /// Words whose entry differs from the one held before the batch.
    fn learned(&self, kb: &KnowledgeBase) -> Vec<String> {
        let mut words: Vec<String> = self
            .before
            .iter()
            .filter(|(word, before)| kb.get(word) != before.as_ref())
            .map(|(word, _)| word.clone())
            .collect();
        words.sort();
        words
    }

    /// The entry `word` has for batch document `index`, excluding its own writes.
    fn resolve<'a>(&'a self, kb: &'a KnowledgeBase, word: &str, index: Option<usize>) -> Option<&'a KnowledgeEntry> {
        let (Some(index), Some(writes)) = (index, self.writes.get(word)) else {
            return kb.get(word);
        };
        writes
            .iter()
            .rev()
            .find(|(writer, _)| *writer != index)
            .map(|(_, entry)| entry)
            .or_else(|| self.before.get(word).and_then(Option::as_ref))
    }
}

/// Propagate knowledge-base labels over one batch.
///
/// # Errors
/// `Configuration` if neither feature is enabled.
pub fn propagate(
    batch: Vec<Document>,
    knowledge: &mut KnowledgeBases,
    config: &CopycatConfig,
) -> ListenerResult<Vec<Propagated>> {
    run(batch, knowledge, config, None::<fn(&[String]) -> ListenerResult<Vec<Document>>>)
}

/// Like [`propagate`], but first widens the batch with `reload(words)`.
///
/// `reload` is called once, with the sorted words whose entry changed during
/// this batch, and only if there are any. Returned documents whose id is
/// already in the batch are dropped; the rest are propagated onto but not
/// learned from.
///
/// # Errors
/// `Configuration` if neither feature is enabled; any error from `reload`.
pub fn propagate_with_reload<F>(
    batch: Vec<Document>,
    knowledge: &mut KnowledgeBases,
    config: &CopycatConfig,
    reload: F,
) -> ListenerResult<Vec<Propagated>>
where
    F: FnOnce(&[String]) -> ListenerResult<Vec<Document>>,
{
    run(batch, knowledge, config, Some(reload))
}

fn run<F>(
    mut batch: Vec<Document>,
    knowledge: &mut KnowledgeBases,
    config: &CopycatConfig,
    reload: Option<F>,
) -> ListenerResult<Vec<Propagated>>
where
    F: FnOnce(&[String]) -> ListenerResult<Vec<Document>>,
{
    config.validate()?;
    let filter = config.label_filter();
    let features = config.features();

    // Phase 1: learn from the whole batch.
    let mut ledgers: HashMap<Feature, BatchLedger> = HashMap::new();
    for (index, doc) in batch.iter().enumerate() {
        for &feature in &features {
            let spans = doc.spans(feature);
            if spans.is_empty() {
                continue;
            }
            let ledger = ledgers.entry(feature).or_default();
            for write in knowledge.get_mut(feature).ingest(doc, spans, &filter) {
                ledger.before.entry(write.word.clone()).or_insert(write.previous);
                ledger.writes.entry(write.word).or_default().push((index, write.entry));
            }
        }
    }

    let batch_len = batch.len();
    if let Some(reload) = reload {
        let learned: BTreeSet<String> = ledgers
            .iter()
            .flat_map(|(feature, ledger)| ledger.learned(knowledge.get(*feature)))
            .collect();
        if !learned.is_empty() {
            let words: Vec<String> = learned.into_iter().collect();
            let known: HashSet<_> = batch.iter().map(|d| d.id).collect();
            let extra: Vec<Document> = reload(&words)?
                .into_iter()
                .filter(|d| !known.contains(&d.id))
                .collect();
            tracing::debug!(words = words.len(), reloaded = extra.len(), "widened batch");
            batch.extend(extra);
        }
    }

    // Phase 2: apply what is known.
    let empty = BatchLedger::default();
    let finders: Vec<(Feature, OccurrenceFinder)> = features
        .iter()
        .map(|&f| (f, OccurrenceFinder::new(knowledge.get(f).words(), config.case_sensitive)))
        .collect();

    let mut out = Vec::with_capacity(batch.len());
    for (index, mut doc) in batch.into_iter().enumerate() {
        let batch_index = (index < batch_len).then_some(index);
        let before = (doc.prediction.clone(), doc.annotation.clone());

        match token_layout(&doc) {
            Ok((text_len, token_spans)) => {
                for (feature, finder) in &finders {
                    if let Err(e) = check_existing(&doc, *feature, text_len) {
                        tracing::debug!(feature = %feature, error = %e, "skipping feature for record");
                        continue;
                    }
                    let kb = knowledge.get(*feature);
                    let ledger = ledgers.get(feature).unwrap_or(&empty);
                    let proposed = propose(&doc, &token_spans, finder, &filter, |word| {
                        ledger.resolve(kb, word, batch_index)
                    });
                    let mut merged = doc.spans(*feature).to_vec();
                    merged.extend(proposed);
                    *doc.spans_mut(*feature) = resolve_span_overlap(merged);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping record");
            }
        }

        let changed = before.0 != doc.prediction || before.1 != doc.annotation;
        out.push(Propagated { document: doc, changed });
    }

    tracing::debug!(
        documents = out.len(),
        changed = out.iter().filter(|p| p.changed).count(),
        predictions_known = knowledge.predictions.len(),
        annotations_known = knowledge.annotations.len(),
        "propagated batch"
    );

    Ok(out)
}

/// Text length in characters and token spans of `doc`.
fn token_layout(doc: &Document) -> Result<(usize, Vec<TokenSpan>), MalformedDocument> {
    let text = doc
        .text
        .as_deref()
        .ok_or(MalformedDocument::MissingText { id: doc.id })?;
    let tokens = doc
        .tokens
        .as_deref()
        .ok_or(MalformedDocument::MissingTokens { id: doc.id })?;
    Ok((text.chars().count(), token_spans(doc.id, text, tokens)?))
}

/// Existing spans of `feature` must be non-empty and inside the text.
fn check_existing(doc: &Document, feature: Feature, text_len: usize) -> Result<(), MalformedDocument> {
    doc.spans(feature)
        .iter()
        .try_for_each(|span| MalformedDocument::check_span(doc.id, span, text_len))
}

/// Token-aligned spans proposed for `doc`.
fn propose<'k>(
    doc: &Document,
    token_spans: &[TokenSpan],
    finder: &OccurrenceFinder,
    filter: &LabelFilter,
    resolve: impl Fn(&str) -> Option<&'k KnowledgeEntry>,
) -> Vec<Span> {
    // Presence checked by `token_layout`.
    let text = doc.text.as_deref().unwrap_or_default();
    let candidates = finder.find(text, filter, resolve);
    validate_token_boundary(candidates, token_spans)
}
