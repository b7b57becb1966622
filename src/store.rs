//! Per-tenant embedding store: build, persist, validate.
//!
//! Each tenant's index lives in its own JSON file under
//! `<knowledge.dir>/index/<tenant>.json`. Writes go to a temp file and
//! are renamed into place, so readers only ever observe a fully written
//! store. The hard trust contract is positional: entry `i` corresponds
//! to corpus chunk `i`, and an entry-count mismatch marks the store
//! stale. The persisted corpus fingerprint strengthens that check to
//! catch content edits that keep the count unchanged.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::corpus::corpus_fingerprint;
use crate::embedding::Embedder;
use crate::models::{Chunk, EmbeddingEntry, EmbeddingStore};

/// Path of a tenant's persisted store.
pub fn store_path(knowledge_dir: &Path, tenant: &str) -> PathBuf {
    knowledge_dir.join("index").join(format!("{}.json", tenant))
}

/// Read a previously persisted store, if any.
pub fn load_store(path: &Path) -> Result<Option<EmbeddingStore>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read store file: {}", path.display()))?;
    let store: EmbeddingStore = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse store file: {}", path.display()))?;
    Ok(Some(store))
}

/// Persist a store atomically: write a sibling temp file, then rename.
pub fn save_store(path: &Path, store: &EmbeddingStore) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create index dir: {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_string(store)?;
    std::fs::write(&tmp, data)
        .with_context(|| format!("Failed to write store file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move store into place: {}", path.display()))?;

    Ok(())
}

/// Whether a loaded store can be trusted for this corpus.
pub fn store_matches(store: &EmbeddingStore, corpus: &[Chunk], model: &str) -> bool {
    store.entries.len() == corpus.len()
        && store.model == model
        && store.corpus_fingerprint == corpus_fingerprint(corpus)
}

/// Compute vectors for every chunk in corpus order, in bounded batches.
///
/// A failed batch is degraded, not fatal: every chunk in it gets a zero
/// vector of the expected dimensionality, which scores 0 in cosine
/// search and therefore never ranks. The returned store always has
/// exactly one entry per corpus chunk.
pub async fn build_store(
    embedder: &dyn Embedder,
    corpus: &[Chunk],
    batch_size: usize,
) -> EmbeddingStore {
    let dims = embedder.dims();
    let mut entries = Vec::with_capacity(corpus.len());

    for batch in corpus.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        let vectors = match embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => vectors,
            Ok(vectors) => {
                tracing::warn!(
                    expected = batch.len(),
                    got = vectors.len(),
                    "embedding batch returned wrong arity, substituting zero vectors"
                );
                vec![vec![0.0; dims]; batch.len()]
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding batch failed, substituting zero vectors");
                vec![vec![0.0; dims]; batch.len()]
            }
        };

        for (chunk, vector) in batch.iter().zip(vectors) {
            entries.push(EmbeddingEntry {
                chunk_id: chunk.id.clone(),
                source_type: chunk.source_type,
                source_key: chunk.source_key.clone(),
                text: chunk.text.clone(),
                dims: vector.len(),
                vector,
            });
        }
    }

    EmbeddingStore {
        entries,
        corpus_fingerprint: corpus_fingerprint(corpus),
        model: embedder.model_name().to_string(),
        created_at: chrono::Utc::now(),
    }
}
