//! Record store contract.
//!
//! The host platform owns dataset storage. Listeners only see it through
//! this trait: `load` the records matching a query, `log` records back.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::Document;

/// Which records a listener wants delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordQuery {
    /// Every record in the dataset.
    All,

    /// Records whose text contains at least one of `words`.
    ContainsAny {
        words: Vec<String>,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },

    /// Records that have no vector stored under `name`.
    MissingVector {
        name: String,
    },

    /// Records matching every one of `queries`.
    AllOf {
        queries: Vec<RecordQuery>,
    },
}

fn default_true() -> bool {
    true
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self::All
    }
}

impl RecordQuery {
    /// True if `doc` satisfies the query.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::ContainsAny { words, case_sensitive } => {
                let Some(text) = doc.text.as_deref() else {
                    return false;
                };
                if *case_sensitive {
                    words.iter().any(|w| !w.is_empty() && text.contains(w.as_str()))
                } else {
                    let folded = text.to_lowercase();
                    words
                        .iter()
                        .any(|w| !w.is_empty() && folded.contains(w.to_lowercase().as_str()))
                }
            }
            Self::MissingVector { name } => !doc.vectors.contains_key(name),
            Self::AllOf { queries } => queries.iter().all(|q| q.matches(doc)),
        }
    }
}

/// Storage trait for dataset records.
///
/// Implementations must be safe to share with a runner's worker thread.
pub trait RecordStore: Send + Sync {
    /// Load records of `dataset` matching `query`, at most `limit` of them.
    fn load(&self, dataset: &str, query: &RecordQuery, limit: Option<usize>) -> Result<Vec<Document>, StoreError>;

    /// Write records back to `dataset`, replacing records with the same id.
    fn log(&self, dataset: &str, records: Vec<Document>) -> Result<(), StoreError>;
}
