//! Error types for the listener plugins.
//!
//! All errors are strongly typed using thiserror so hosts can match on
//! specific conditions. Only configuration and store failures ever reach a
//! caller; malformed documents are recovered locally and logged.

use thiserror::Error;

use crate::record::{RecordId, Span};

/// Errors raised while building a listener from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("choose to use at least one of copy_predictions or copy_annotations")]
    NoFeatureEnabled,

    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        field: String,
    },

    #[error("Field '{field}' must be greater than zero")]
    ZeroSize {
        field: String,
    },

    #[error("Invalid configuration JSON: {reason}")]
    InvalidJson {
        reason: String,
    },
}

/// A document lacks what a feature needs.
///
/// Never fatal for a batch: the feature is skipped for that document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedDocument {
    #[error("Record {id} has no text")]
    MissingText {
        id: RecordId,
    },

    #[error("Record {id} has no tokens")]
    MissingTokens {
        id: RecordId,
    },

    #[error("Record {id}: token #{index} ({token:?}) does not line up with the text")]
    TokenMismatch {
        id: RecordId,
        index: usize,
        token: String,
    },

    #[error("Record {id}: span [{start}, {end}) is outside a text of {len} characters")]
    SpanOutOfBounds {
        id: RecordId,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("Record {id}: span [{start}, {end}) covers no characters")]
    EmptySpan {
        id: RecordId,
        start: usize,
        end: usize,
    },
}

impl MalformedDocument {
    /// Check an existing span of `id` against a text of `len` characters.
    ///
    /// # Errors
    /// `EmptySpan` if `end <= start`, `SpanOutOfBounds` if `end > len`.
    pub fn check_span(id: RecordId, span: &Span, len: usize) -> Result<(), Self> {
        if span.is_empty() {
            return Err(Self::EmptySpan {
                id,
                start: span.start,
                end: span.end,
            });
        }
        if span.end > len {
            return Err(Self::SpanOutOfBounds {
                id,
                start: span.start,
                end: span.end,
                len,
            });
        }
        Ok(())
    }
}

/// Errors surfaced by a record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The dataset does not exist.
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Backend error.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Top-level error type for listener plugins.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Encoder error: {message}")]
    Encoder {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ListenerError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an encoder error.
    #[must_use]
    pub fn encoder(message: impl Into<String>) -> Self {
        Self::Encoder {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is a store error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if a host may retry the trigger that produced this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration(_) => false, // Configuration won't change on retry
            Self::Store(e) => matches!(e, StoreError::Backend(_)),
            Self::Encoder { .. } | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for listener operations.
pub type ListenerResult<T> = Result<T, ListenerError>;
