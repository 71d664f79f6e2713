//! # annotation-listeners
//!
//! Background listener plugins for human-annotation datasets. The host
//! platform owns storage and scheduling; each plugin reacts to a batch of
//! matched records and writes back the records it changed.
//!
//! ## Plugins
//!
//! - **Copycat**: learns `word -> label` from existing annotations and
//!   predictions and copies the label onto every other token-aligned
//!   occurrence of the word, resolving overlaps longest-first
//! - **Embedder**: stores a text vector on records that lack one
//!
//! ## Usage
//!
//! ```rust,ignore
//! use annotation_listeners::{propagate, CopycatConfig, Document, KnowledgeBases, Span};
//!
//! let mut knowledge = KnowledgeBases::new();
//! let seen = Document::new("I love Paris", ["I", "love", "Paris"])
//!     .with_prediction(vec![Span::scored("LOC", 7, 12, 0.9)]);
//! let fresh = Document::new("Paris in May", ["Paris", "in", "May"]);
//!
//! let out = propagate(vec![seen, fresh], &mut knowledge, &CopycatConfig::default())?;
//! assert!(out[1].changed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod record;

// Span propagation engine
pub mod copycat;

// Host seam and plugins
pub mod embedding;
pub mod listener;
pub mod plugins;

// Re-export primary types at crate root for convenience
pub use copycat::{
    propagate, propagate_with_reload, resolve_span_overlap, CopycatConfig, KnowledgeBase, KnowledgeBases,
    KnowledgeEntry, LabelFilter, Propagated,
};
pub use embedding::{LexicalEncoder, TextEncoder};
pub use error::{ConfigurationError, ListenerError, ListenerResult, MalformedDocument, StoreError};
pub use listener::{
    InMemoryRecordStore, Listener, ListenerContext, ListenerRunner, ListenerRunnerConfig, RecordQuery, RecordStore,
};
pub use plugins::{Copycat, Embedder, EmbedderConfig};
pub use record::{Document, Feature, RecordId, Span};
