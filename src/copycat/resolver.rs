//! Longest-first overlap resolution for the spans of one document.

use std::collections::BTreeMap;

use crate::record::Span;

/// Resolve overlapping spans of one document into a non-overlapping set.
///
/// Spans are ranked longest first, the leftmost winning among equal lengths;
/// spans with an identical rank keep their input order. A span is accepted
/// when neither its first nor its last character is already claimed by an
/// accepted span. The result is ordered by `start`. Empty spans are dropped.
///
/// Only the two boundary characters are checked, not the interior.
#[must_use]
pub fn resolve_span_overlap(spans: Vec<Span>) -> Vec<Span> {
    let mut ranked = spans;
    ranked.retain(|s| !s.is_empty());
    ranked.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));

    // start -> end of every accepted span; accepted spans never overlap.
    let mut claimed: BTreeMap<usize, usize> = BTreeMap::new();
    let mut accepted = Vec::with_capacity(ranked.len());

    for span in ranked {
        if is_claimed(&claimed, span.start) || is_claimed(&claimed, span.end - 1) {
            continue;
        }
        claimed.insert(span.start, span.end);
        accepted.push(span);
    }

    accepted.sort_by_key(|s| s.start);
    accepted
}

fn is_claimed(claimed: &BTreeMap<usize, usize>, pos: usize) -> bool {
    claimed
        .range(..=pos)
        .next_back()
        .is_some_and(|(_, &end)| pos < end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(spans: &[Span]) -> Vec<(usize, usize)> {
        spans.iter().map(|s| (s.start, s.end)).collect()
    }

    #[test]
    fn longest_wins() {
        let out = resolve_span_overlap(vec![Span::new("LOC", 4, 8), Span::new("LOC", 4, 13)]);
        assert_eq!(positions(&out), vec![(4, 13)]);
    }

    #[test]
    fn leftmost_wins_on_equal_length() {
        let out = resolve_span_overlap(vec![Span::new("B", 2, 6), Span::new("A", 0, 4)]);
        assert_eq!(out, vec![Span::new("A", 0, 4)]);
    }

    #[test]
    fn disjoint_spans_are_all_kept_in_position_order() {
        let out = resolve_span_overlap(vec![
            Span::new("C", 10, 12),
            Span::new("A", 0, 3),
            Span::new("B", 4, 8),
        ]);
        assert_eq!(positions(&out), vec![(0, 3), (4, 8), (10, 12)]);
    }

    #[test]
    fn touching_spans_do_not_conflict() {
        let out = resolve_span_overlap(vec![Span::new("A", 0, 3), Span::new("B", 3, 6)]);
        assert_eq!(positions(&out), vec![(0, 3), (3, 6)]);
    }

    #[test]
    fn only_boundaries_are_checked() {
        // (2, 3) sits strictly inside (0, 6)'s claim, so both boundary
        // checks hit. (5, 10) starts inside and is rejected as well.
        let out = resolve_span_overlap(vec![
            Span::new("OUTER", 0, 6),
            Span::new("INNER", 2, 3),
            Span::new("TAIL", 5, 10),
        ]);
        assert_eq!(positions(&out), vec![(0, 6)]);
    }

    #[test]
    fn chain_of_adjacent_spans_is_kept() {
        let out = resolve_span_overlap(vec![Span::new("A", 0, 2), Span::new("B", 4, 6), Span::new("C", 2, 4)]);
        assert_eq!(positions(&out), vec![(0, 2), (2, 4), (4, 6)]);
    }

    #[test]
    fn identical_ranges_keep_the_first() {
        let out = resolve_span_overlap(vec![Span::scored("OLD", 8, 13, 0.9), Span::scored("NEW", 8, 13, 0.1)]);
        assert_eq!(out, vec![Span::scored("OLD", 8, 13, 0.9)]);
    }

    #[test]
    fn output_never_shares_boundary_positions() {
        let spans: Vec<Span> = (0..20)
            .flat_map(|s| (s + 1..(s + 6).min(24)).map(move |e| Span::new("X", s, e)))
            .collect();
        let out = resolve_span_overlap(spans);
        let mut covered = vec![false; 24];
        for s in &out {
            assert!(!covered[s.start]);
            assert!(!covered[s.end - 1]);
            for c in &mut covered[s.start..s.end] {
                *c = true;
            }
        }
    }

    #[test]
    fn reordering_input_does_not_change_output() {
        let spans = vec![
            Span::new("A", 0, 5),
            Span::new("B", 3, 9),
            Span::new("C", 8, 12),
            Span::new("D", 10, 16),
            Span::new("E", 20, 22),
        ];
        let mut reversed = spans.clone();
        reversed.reverse();
        assert_eq!(resolve_span_overlap(spans), resolve_span_overlap(reversed));
    }

    #[test]
    fn far_offsets_do_not_allocate_by_width() {
        let out = resolve_span_overlap(vec![
            Span::new("WIDE", 0, usize::MAX),
            Span::new("INSIDE", 1_000_000_000, 1_000_000_005),
            Span::new("EMPTY", 7, 7),
        ]);
        assert_eq!(positions(&out), vec![(0, usize::MAX)]);
    }

    #[test]
    fn empty_input() {
        assert!(resolve_span_overlap(Vec::new()).is_empty());
    }
}
