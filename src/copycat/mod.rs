//! Knowledge-base span propagation.
//!
//! Labels seen on one record are copied onto every other occurrence of the
//! same literal text, as long as the occurrence lines up with token
//! boundaries and does not clash with a longer span.

pub mod knowledge;
pub mod occurrence;
mod propagate;
pub mod resolver;
pub mod tokens;

pub use knowledge::{KnowledgeBase, KnowledgeBases, KnowledgeEntry, KnowledgeWrite, LabelFilter};
pub use occurrence::{find_occurrences, OccurrenceFinder};
pub use propagate::{propagate, propagate_with_reload, CopycatConfig, Propagated};
pub use resolver::resolve_span_overlap;
pub use tokens::{aligned_ranges, token_spans, validate_token_boundary, TokenSpan, MAX_ALIGNED_WIDTH};
