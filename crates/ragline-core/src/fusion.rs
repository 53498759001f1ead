//! Result fusion: top-k selection, source tagging and text-based dedupe.
//!
//! These are the only ranking rules ragline owns itself; every score they
//! consume comes from a library (tantivy BM25, lancedb distances, a
//! cross-encoder).

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::types::{RetrievedDoc, SourceKind};

/// Indices of the `k` highest scores, best first.
///
/// The sort is stable: equal scores keep ascending index order. `NaN` scores
/// rank below every real number.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| descending(scores[a], scores[b]));
    order.truncate(k);
    order
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Relabel every document with the ranker that produced it.
pub fn tag_source(docs: &mut [RetrievedDoc], source: SourceKind) {
    for d in docs {
        d.source = source;
    }
}

/// Concatenate `first` and `second`, dropping any passage whose normalized
/// text has already been emitted. First occurrence wins.
pub fn merge_and_dedupe(first: Vec<RetrievedDoc>, second: Vec<RetrievedDoc>) -> Vec<RetrievedDoc> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(first.len() + second.len());
    for d in first.into_iter().chain(second) {
        if seen.insert(d.normalized_text()) {
            merged.push(d);
        }
    }
    merged
}

/// Reorder `docs` by externally computed `scores` and keep the best `k`.
///
/// Each kept document's `score` is replaced by its rerank score.
pub fn select_by_scores(docs: Vec<RetrievedDoc>, scores: &[f32], k: usize) -> Vec<RetrievedDoc> {
    let order = top_k(scores, k);
    let mut slots: Vec<Option<RetrievedDoc>> = docs.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| {
            slots.get_mut(i).and_then(Option::take).map(|mut d| {
                d.score = scores[i];
                d
            })
        })
        .collect()
}

/// Join passages into the context block handed to the answer model.
pub fn join_context(docs: &[RetrievedDoc]) -> String {
    docs.iter().map(|d| d.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str, source: SourceKind, score: f32) -> RetrievedDoc {
        RetrievedDoc { text: text.to_string(), source, score, position: 0 }
    }

    #[test]
    fn top_k_orders_descending_and_bounds() {
        let scores = [0.1, 2.0, 0.5, 2.0, -1.0];
        assert_eq!(top_k(&scores, 3), vec![1, 3, 2]);
        assert_eq!(top_k(&scores, 10).len(), 5);
        assert!(top_k(&scores, 0).is_empty());
        assert!(top_k(&[], 4).is_empty());
    }

    #[test]
    fn top_k_ties_keep_index_order() {
        let scores = [0.0, 0.0, 1.0, 0.0];
        assert_eq!(top_k(&scores, 4), vec![2, 0, 1, 3]);
    }

    #[test]
    fn top_k_sinks_nan() {
        let scores = [f32::NAN, 0.3, 0.9];
        assert_eq!(top_k(&scores, 3), vec![2, 1, 0]);
    }

    #[test]
    fn merge_prefers_first_list_and_ignores_case_and_padding() {
        let dense = vec![doc("Boil water first.", SourceKind::Dense, 0.9), doc("Use a bow drill.", SourceKind::Dense, 0.8)];
        let lexical = vec![doc("  boil WATER first.  ", SourceKind::Lexical, 7.0), doc("Collect tinder.", SourceKind::Lexical, 3.0)];
        let merged = merge_and_dedupe(dense, lexical);
        let texts: Vec<&str> = merged.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["Boil water first.", "Use a bow drill.", "Collect tinder."]);
        assert_eq!(merged[0].source, SourceKind::Dense);
        assert_eq!(merged[2].source, SourceKind::Lexical);
    }

    #[test]
    fn merge_dedupes_within_a_single_list() {
        let merged = merge_and_dedupe(vec![doc("a", SourceKind::Dense, 1.0), doc("A", SourceKind::Dense, 0.5)], vec![]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn tag_source_overwrites_every_doc() {
        let mut docs = vec![doc("x", SourceKind::Dense, 1.0), doc("y", SourceKind::Dense, 1.0)];
        tag_source(&mut docs, SourceKind::Lexical);
        assert!(docs.iter().all(|d| d.source == SourceKind::Lexical));
    }

    #[test]
    fn select_by_scores_reorders_and_truncates() {
        let docs = vec![doc("a", SourceKind::Dense, 0.0), doc("b", SourceKind::Lexical, 0.0), doc("c", SourceKind::Dense, 0.0)];
        let picked = select_by_scores(docs, &[0.2, 0.9, 0.5], 2);
        let texts: Vec<&str> = picked.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);
        assert!((picked[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn join_context_uses_blank_lines() {
        let docs = vec![doc("one", SourceKind::Dense, 0.0), doc("two", SourceKind::Lexical, 0.0)];
        assert_eq!(join_context(&docs), "one\n\ntwo");
        assert_eq!(join_context(&[]), "");
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn arb_docs() -> impl Strategy<Value = Vec<RetrievedDoc>> {
            proptest::collection::vec(("[a-cA-C ]{0,4}", any::<bool>()), 0..12).prop_map(|v| {
                v.into_iter()
                    .map(|(t, dense)| doc(&t, if dense { SourceKind::Dense } else { SourceKind::Lexical }, 0.0))
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn merged_texts_are_unique(a in arb_docs(), b in arb_docs()) {
                let merged = merge_and_dedupe(a.clone(), b.clone());
                let mut seen = HashSet::new();
                for d in &merged {
                    prop_assert!(seen.insert(d.normalized_text()));
                }
                // every input text is represented
                for d in a.iter().chain(b.iter()) {
                    prop_assert!(seen.contains(&d.normalized_text()));
                }
            }

            #[test]
            fn top_k_is_bounded_and_sorted(scores in proptest::collection::vec(-100.0f32..100.0, 0..40), k in 0usize..50) {
                let picked = top_k(&scores, k);
                prop_assert_eq!(picked.len(), k.min(scores.len()));
                for w in picked.windows(2) {
                    prop_assert!(scores[w[0]] >= scores[w[1]]);
                }
            }
        }
    }
}
