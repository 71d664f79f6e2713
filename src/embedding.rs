//! Text encoders for the embedder listener.
//!
//! `TextEncoder` is the seam a host plugs a neural model into. The crate
//! ships `LexicalEncoder`, a deterministic, offline baseline using feature
//! hashing over tokens. It is *not* a neural embedding model.

use blake3::Hasher;

use crate::error::{ListenerError, ListenerResult};

/// Default embedding dimensionality for lexical embeddings.
pub const DEFAULT_EMBEDDING_DIM: usize = 64;

/// Turns texts into fixed-size vectors.
pub trait TextEncoder: Send {
    /// Encode `texts`, returning one vector per text, in order.
    fn encode(&mut self, texts: &[&str]) -> ListenerResult<Vec<Vec<f32>>>;
}

/// Deterministic feature-hashing encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexicalEncoder {
    dim: usize,
}

impl Default for LexicalEncoder {
    fn default() -> Self {
        Self {
            dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl LexicalEncoder {
    /// Encoder producing `dim`-sized vectors.
    ///
    /// # Errors
    /// `Encoder` if `dim` is zero.
    pub fn with_dim(dim: usize) -> ListenerResult<Self> {
        if dim == 0 {
            return Err(ListenerError::encoder("embedding dimension must be positive"));
        }
        Ok(Self { dim })
    }

    /// Output dimensionality.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }
}

impl TextEncoder for LexicalEncoder {
    fn encode(&mut self, texts: &[&str]) -> ListenerResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| lexical_embedding_with_dim(t, self.dim)).collect())
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

/// Create a deterministic lexical embedding with a custom dimension.
#[must_use]
pub fn lexical_embedding_with_dim(text: &str, dim: usize) -> Vec<f32> {
    if dim == 0 {
        return Vec::new();
    }

    let mut vec = vec![0.0f32; dim];
    let mut count = 0u32;

    for token in tokenize(&text.to_lowercase()) {
        let mut h = Hasher::new();
        h.update(token.as_bytes());
        let hash = h.finalize();

        let bytes = hash.as_bytes();
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&bytes[..8]);
        let bucket = u64::from_le_bytes(bucket_bytes);

        #[allow(clippy::cast_possible_truncation)]
        let idx = (bucket % dim as u64) as usize;
        let sign = if (bytes[8] & 1) == 0 { 1.0f32 } else { -1.0f32 };
        vec[idx] += sign;
        count = count.saturating_add(1);
    }

    if count == 0 {
        return vec;
    }

    // L2-normalize.
    let norm2: f64 = vec.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
    if norm2 > 0.0 {
        #[allow(clippy::cast_possible_truncation)]
        let inv = norm2.sqrt().recip() as f32;
        for x in &mut vec {
            *x *= inv;
        }
    }

    vec
}
