//! Listener plugins.

/// Label propagation from a growing knowledge base.
pub mod copycat;
/// Text embedding.
pub mod embedder;

pub use copycat::Copycat;
pub use embedder::{Embedder, EmbedderConfig};
