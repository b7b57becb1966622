//! Cosine similarity search over a tenant's embedding store.

use crate::embedding::cosine_similarity;
use crate::models::{EmbeddingStore, ScoredHit};

/// Rank all store entries against the query vector, descending by
/// cosine similarity, and return the first `top_k`.
///
/// The sort is stable, so ties keep original corpus order. `top_k`
/// larger than the store is clamped silently; an empty store yields an
/// empty result. Scoring and sorting happen on (score, index) pairs;
/// only the surviving entries are cloned out of the store.
pub fn search(query: &[f32], store: &EmbeddingStore, top_k: usize) -> Vec<ScoredHit> {
    let mut scored: Vec<(f32, usize)> = store
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| (cosine_similarity(query, &entry.vector), index))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k.min(store.entries.len()));

    scored
        .into_iter()
        .map(|(score, index)| ScoredHit {
            score,
            entry: store.entries[index].clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmbeddingEntry, SourceType};

    fn entry(key: &str, vector: Vec<f32>) -> EmbeddingEntry {
        EmbeddingEntry {
            chunk_id: format!("catalog_item:{}#0", key),
            source_type: SourceType::CatalogItem,
            source_key: key.to_string(),
            text: format!("NAME: {}", key),
            dims: vector.len(),
            vector,
        }
    }

    fn store_with(entries: Vec<EmbeddingEntry>) -> EmbeddingStore {
        EmbeddingStore {
            entries,
            corpus_fingerprint: "test".to_string(),
            model: "fake".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_ranked_descending() {
        let store = store_with(vec![
            entry("far", vec![0.0, 1.0]),
            entry("near", vec![1.0, 0.0]),
            entry("mid", vec![1.0, 1.0]),
        ]);
        let hits = search(&[1.0, 0.0], &store, 3);

        let keys: Vec<&str> = hits.iter().map(|h| h.entry.source_key.as_str()).collect();
        assert_eq!(keys, vec!["near", "mid", "far"]);
        assert!(hits[0].score > hits[1].score);
        assert!(hits[1].score > hits[2].score);
    }

    #[test]
    fn test_top_k_clamped_to_store_size() {
        let store = store_with(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.5, 0.5])]);
        let hits = search(&[1.0, 0.0], &store, 10);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_truncation_keeps_best_entries() {
        let store = store_with(vec![
            entry("far", vec![0.0, 1.0]),
            entry("near", vec![1.0, 0.0]),
            entry("mid", vec![1.0, 1.0]),
        ]);
        let hits = search(&[1.0, 0.0], &store, 2);

        // Each surviving hit pairs the right entry with its own score.
        let keys: Vec<&str> = hits.iter().map(|h| h.entry.source_key.as_str()).collect();
        assert_eq!(keys, vec!["near", "mid"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let store = store_with(vec![
            entry("first", vec![1.0, 0.0]),
            entry("second", vec![2.0, 0.0]), // same direction → same cosine
            entry("third", vec![3.0, 0.0]),
        ]);
        let hits = search(&[1.0, 0.0], &store, 3);
        let keys: Vec<&str> = hits.iter().map(|h| h.entry.source_key.as_str()).collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_zero_vector_entries_never_rank() {
        let store = store_with(vec![
            entry("degraded", vec![0.0, 0.0]),
            entry("live", vec![0.6, 0.8]),
        ]);
        let hits = search(&[0.6, 0.8], &store, 2);
        assert_eq!(hits[0].entry.source_key, "live");
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn test_empty_store() {
        let store = store_with(vec![]);
        assert!(search(&[1.0, 0.0], &store, 5).is_empty());
    }

    #[test]
    fn test_scores_in_bounds() {
        let store = store_with(vec![
            entry("a", vec![3.0, -4.0]),
            entry("b", vec![-3.0, 4.0]),
        ]);
        for hit in search(&[3.0, -4.0], &store, 2) {
            assert!((-1.0..=1.0).contains(&hit.score));
        }
    }
}
