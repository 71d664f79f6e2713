//! Embedder listener: writes a text vector onto records that lack one.

use serde::{Deserialize, Serialize};

use crate::embedding::{LexicalEncoder, TextEncoder};
use crate::error::{ConfigurationError, ListenerError, ListenerResult, MalformedDocument};
use crate::listener::{Listener, ListenerContext, RecordQuery};
use crate::record::Document;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Key the vector is stored under.
    pub vector_name: String,
    /// Texts handed to the encoder per call.
    pub batch_size: usize,
    /// Records encoded and logged together.
    pub chunk_size: usize,
    /// Extra host filter, combined with the missing-vector condition.
    pub query: Option<RecordQuery>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            vector_name: "vector".to_string(),
            batch_size: 32,
            chunk_size: 1000,
            query: None,
        }
    }
}

impl EmbedderConfig {
    /// Reject empty names and zero sizes.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.vector_name.trim().is_empty() {
            return Err(ConfigurationError::EmptyField {
                field: "vector_name".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::ZeroSize {
                field: "batch_size".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigurationError::ZeroSize {
                field: "chunk_size".to_string(),
            });
        }
        Ok(())
    }
}

/// Listener encoding record texts with a `TextEncoder`.
#[derive(Debug)]
pub struct Embedder<E = LexicalEncoder> {
    name: String,
    config: EmbedderConfig,
    encoder: E,
}

impl Embedder<LexicalEncoder> {
    /// Embedder using the built-in lexical encoder.
    ///
    /// # Errors
    /// `Configuration` if `config` is invalid.
    pub fn lexical(name: impl Into<String>, config: EmbedderConfig) -> ListenerResult<Self> {
        Self::new(name, config, LexicalEncoder::default())
    }
}

impl<E: TextEncoder> Embedder<E> {
    /// Embedder using `encoder`.
    ///
    /// # Errors
    /// `Configuration` if `config` is invalid.
    pub fn new(name: impl Into<String>, config: EmbedderConfig, encoder: E) -> ListenerResult<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            encoder,
        })
    }

    fn embed_chunk(&mut self, chunk: &mut [Document]) -> ListenerResult<()> {
        let texts: Vec<&str> = chunk.iter().filter_map(|d| d.text.as_deref()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            let encoded = self.encoder.encode(batch)?;
            if encoded.len() != batch.len() {
                return Err(ListenerError::encoder(format!(
                    "encoder returned {} vectors for {} texts",
                    encoded.len(),
                    batch.len()
                )));
            }
            vectors.extend(encoded);
        }

        for (doc, vector) in chunk.iter_mut().filter(|d| d.text.is_some()).zip(vectors) {
            doc.vectors.insert(self.config.vector_name.clone(), vector);
        }
        Ok(())
    }
}

impl<E: TextEncoder> Listener for Embedder<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self) -> RecordQuery {
        let missing = RecordQuery::MissingVector {
            name: self.config.vector_name.clone(),
        };
        match &self.config.query {
            Some(extra) => RecordQuery::AllOf {
                queries: vec![extra.clone(), missing],
            },
            None => missing,
        }
    }

    fn on_batch(&mut self, records: Vec<Document>, ctx: &mut ListenerContext<'_>) -> ListenerResult<()> {
        let (mut records, skipped): (Vec<Document>, Vec<Document>) =
            records.into_iter().partition(|d| d.text.is_some());
        for doc in &skipped {
            tracing::debug!(error = %MalformedDocument::MissingText { id: doc.id }, "not embedding record");
        }

        for chunk in records.chunks_mut(self.config.chunk_size) {
            self.embed_chunk(chunk)?;
            tracing::info!(listener = %self.name, dataset = ctx.dataset(), "logging {} records", chunk.len());
            ctx.log(chunk.to_vec())?;
        }
        Ok(())
    }
}
