//! Literal occurrence search for knowledge-base words.
//!
//! Matchers are compiled once per batch from the escaped word and then run
//! against every document. Offsets are converted from bytes to characters.

use regex::{Regex, RegexBuilder};

use crate::record::Span;

use super::knowledge::{KnowledgeEntry, LabelFilter};

/// A compiled matcher for one knowledge-base word.
#[derive(Debug, Clone)]
struct WordMatcher {
    word: String,
    regex: Regex,
}

/// Finds knowledge-base words inside document texts.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceFinder {
    matchers: Vec<WordMatcher>,
}

impl OccurrenceFinder {
    /// Compile a matcher for every non-empty word.
    ///
    /// A word whose pattern exceeds the regex size limit is skipped with a
    /// warning.
    #[must_use]
    pub fn new<'a>(words: impl IntoIterator<Item = &'a str>, case_sensitive: bool) -> Self {
        let mut matchers = Vec::new();
        for word in words {
            if word.is_empty() {
                continue;
            }
            match RegexBuilder::new(&regex::escape(word))
                .case_insensitive(!case_sensitive)
                .build()
            {
                Ok(regex) => matchers.push(WordMatcher {
                    word: word.to_string(),
                    regex,
                }),
                Err(e) => {
                    tracing::warn!(word = %word, error = %e, "skipping word that cannot be compiled");
                }
            }
        }
        Self { matchers }
    }

    /// Number of compiled words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// True when no word was compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Candidate spans for every accepted occurrence of every word.
    ///
    /// `resolve` maps a word to the entry that applies to this document; words
    /// it maps to `None`, or whose label `filter` rejects, are skipped before
    /// matching.
    pub fn find<'k>(
        &self,
        text: &str,
        filter: &LabelFilter,
        resolve: impl Fn(&str) -> Option<&'k KnowledgeEntry>,
    ) -> Vec<Span> {
        let char_starts: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        let mut out = Vec::new();

        for matcher in &self.matchers {
            let Some(entry) = resolve(&matcher.word) else {
                continue;
            };
            if !filter.allows(&entry.label) {
                continue;
            }
            for (start, end) in scan(&matcher.regex, text, &char_starts) {
                out.push(Span {
                    label: entry.label.clone(),
                    start,
                    end,
                    score: entry.score,
                });
            }
        }

        out
    }
}

/// Character ranges of every occurrence of `word` in `text` that is not
/// immediately followed by a letter.
///
/// Overlapping occurrences are all reported.
#[must_use]
pub fn find_occurrences(text: &str, word: &str, case_sensitive: bool) -> Vec<(usize, usize)> {
    if word.is_empty() {
        return Vec::new();
    }
    let Ok(regex) = RegexBuilder::new(&regex::escape(word))
        .case_insensitive(!case_sensitive)
        .build()
    else {
        return Vec::new();
    };
    let char_starts: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    scan(&regex, text, &char_starts)
}

fn scan(regex: &Regex, text: &str, char_starts: &[usize]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut at = 0usize;

    while at <= text.len() {
        let Some(m) = regex.find_at(text, at) else {
            break;
        };
        let Some(first) = text[m.start()..].chars().next() else {
            break;
        };

        // Reject subword prefixes: "cat" inside "category".
        let followed_by_letter = text[m.end()..].chars().next().is_some_and(char::is_alphabetic);
        if !m.as_str().is_empty() && !followed_by_letter {
            let start = char_starts.partition_point(|&b| b < m.start());
            let end = start + m.as_str().chars().count();
            out.push((start, end));
        }

        at = m.start() + first.len_utf8();
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn entry(label: &str, score: f64) -> KnowledgeEntry {
        KnowledgeEntry {
            label: label.to_string(),
            score: Some(score),
        }
    }

    #[test]
    fn subword_prefix_is_rejected() {
        assert!(find_occurrences("category", "cat", true).is_empty());
        assert_eq!(find_occurrences("cat show", "cat", true), vec![(0, 3)]);
        assert_eq!(find_occurrences("a cat!", "cat", true), vec![(2, 5)]);
    }

    #[test]
    fn match_at_end_of_text_is_kept() {
        assert_eq!(find_occurrences("I love Paris", "Paris", true), vec![(7, 12)]);
    }

    #[test]
    fn overlapping_occurrences_are_all_found() {
        assert_eq!(find_occurrences("aaa", "aa", true), vec![(1, 3)]);
        assert_eq!(find_occurrences("aa aa", "a", true), vec![(1, 2), (4, 5)]);
        assert_eq!(find_occurrences("ab-ab-ab", "ab-ab", true), vec![(0, 5), (3, 8)]);
    }

    #[test]
    fn case_folding_is_configurable() {
        assert!(find_occurrences("I love PARIS", "Paris", true).is_empty());
        assert_eq!(find_occurrences("I love PARIS", "Paris", false), vec![(7, 12)]);
    }

    #[test]
    fn metacharacters_are_literal() {
        assert_eq!(find_occurrences("costs $5 (net)", "(net)", true), vec![(9, 14)]);
        assert!(find_occurrences("abc", "a.c", true).is_empty());
    }

    #[test]
    fn offsets_are_in_characters() {
        assert_eq!(find_occurrences("über München", "München", true), vec![(5, 12)]);
    }

    #[test]
    fn finder_carries_label_and_score() {
        let mut kb = BTreeMap::new();
        kb.insert("Paris".to_string(), entry("LOC", 0.9));
        let finder = OccurrenceFinder::new(kb.keys().map(String::as_str), true);
        let spans = finder.find("Paris and Paris", &LabelFilter::all(), |w| kb.get(w));
        assert_eq!(
            spans,
            vec![Span::scored("LOC", 0, 5, 0.9), Span::scored("LOC", 10, 15, 0.9)]
        );
    }

    #[test]
    fn finder_skips_excluded_labels() {
        let mut kb = BTreeMap::new();
        kb.insert("Paris".to_string(), entry("LOC", 0.9));
        kb.insert("Anna".to_string(), entry("PER", 0.5));
        let finder = OccurrenceFinder::new(kb.keys().map(String::as_str), true);
        let filter = LabelFilter::only(["PER"]);
        let spans = finder.find("Anna in Paris", &filter, |w| kb.get(w));
        assert_eq!(spans, vec![Span::scored("PER", 0, 4, 0.5)]);
    }

    #[test]
    fn empty_words_are_ignored() {
        let finder = OccurrenceFinder::new(["", "x"], true);
        assert_eq!(finder.len(), 1);
    }
}
