//! Token span indexing and token-boundary validation.

use std::collections::HashSet;

use crate::error::MalformedDocument;
use crate::record::{RecordId, Span};

/// Widest character range a run of adjacent tokens may cover and still count
/// as an alignment target.
pub const MAX_ALIGNED_WIDTH: usize = 50;

/// Character range `[start, end)` of one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenSpan {
    /// First character offset (inclusive).
    pub start: usize,
    /// Last character offset (exclusive).
    pub end: usize,
}

/// Compute the character span of every token.
///
/// Tokens are placed left to right. Whitespace between tokens is skipped, so a
/// gapless stream yields contiguous spans and `"New York City"` tokenized as
/// `["New", "York", "City"]` yields `(0,3),(4,8),(9,13)`.
///
/// # Errors
/// `TokenMismatch` when a token does not appear at the cursor, i.e. the tokens
/// do not rebuild the text.
pub fn token_spans(id: RecordId, text: &str, tokens: &[String]) -> Result<Vec<TokenSpan>, MalformedDocument> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::with_capacity(tokens.len());
    let mut cursor = 0usize;

    for (index, token) in tokens.iter().enumerate() {
        let token_chars: Vec<char> = token.chars().collect();
        if token_chars.is_empty() {
            spans.push(TokenSpan { start: cursor, end: cursor });
            continue;
        }

        while cursor < chars.len() && chars[cursor].is_whitespace() && !token_chars[0].is_whitespace() {
            cursor += 1;
        }

        let end = cursor + token_chars.len();
        if end > chars.len() || chars[cursor..end] != token_chars[..] {
            return Err(MalformedDocument::TokenMismatch {
                id,
                index,
                token: token.clone(),
            });
        }

        spans.push(TokenSpan { start: cursor, end });
        cursor = end;
    }

    Ok(spans)
}

/// Every `(start, end)` covered by a run of one or more adjacent tokens that
/// fits within [`MAX_ALIGNED_WIDTH`].
#[must_use]
pub fn aligned_ranges(spans: &[TokenSpan]) -> HashSet<(usize, usize)> {
    let mut ranges = HashSet::new();
    for i in 0..spans.len() {
        for j in i..spans.len() {
            if spans[j].end - spans[i].start > MAX_ALIGNED_WIDTH {
                break;
            }
            ranges.insert((spans[i].start, spans[j].end));
        }
    }
    ranges
}

/// Keep the candidates whose exact range is token-aligned, preserving order.
///
/// Misaligned candidates are dropped silently; they are the normal by-product
/// of substring search.
#[must_use]
pub fn validate_token_boundary(candidates: Vec<Span>, spans: &[TokenSpan]) -> Vec<Span> {
    let allowed = aligned_ranges(spans);
    candidates
        .into_iter()
        .filter(|c| allowed.contains(&(c.start, c.end)))
        .collect()
}
