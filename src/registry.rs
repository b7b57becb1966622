//! Tenant registry: per-tenant corpus and embedding-store lifecycle.
//!
//! Tenants are fully independent units of concurrency and storage; a
//! registry cell is created on first reference and holds the tenant's
//! last-known-good snapshot (records + corpus + store) behind an
//! `RwLock`, plus a build mutex. `ensure` is the only mutating path:
//! at most one build runs per tenant, concurrent callers wait on the
//! build lock and re-check before rebuilding, and the snapshot is
//! replaced in a single assignment only after the new store is fully
//! computed — readers never observe a store whose entry count does not
//! match its corpus.

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use crate::embedding::Embedder;
use crate::knowledge::{list_tenants, load_record};
use crate::models::{Chunk, EmbeddingStore, KnowledgeRecord, TenantHealth};
use crate::store::{build_store, load_store, save_store, store_matches, store_path};
use crate::corpus::build_corpus;

/// One tenant's immutable ready-to-serve snapshot.
#[derive(Debug)]
pub struct TenantState {
    pub record: Arc<KnowledgeRecord>,
    pub corpus: Vec<Chunk>,
    pub store: EmbeddingStore,
}

struct TenantCell {
    build_lock: tokio::sync::Mutex<()>,
    /// Record-only cache so the fast path can match triggers without
    /// ever touching the embedding store.
    record: RwLock<Option<Arc<KnowledgeRecord>>>,
    state: RwLock<Option<Arc<TenantState>>>,
}

pub struct TenantRegistry {
    knowledge_dir: PathBuf,
    max_chars: usize,
    batch_size: usize,
    embedder: Arc<dyn Embedder>,
    cells: Mutex<HashMap<String, Arc<TenantCell>>>,
}

impl TenantRegistry {
    pub fn new(
        knowledge_dir: PathBuf,
        max_chars: usize,
        batch_size: usize,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            knowledge_dir,
            max_chars,
            batch_size,
            embedder,
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, tenant: &str) -> Arc<TenantCell> {
        let mut cells = self.cells.lock().expect("registry mutex poisoned");
        cells
            .entry(tenant.to_string())
            .or_insert_with(|| {
                Arc::new(TenantCell {
                    build_lock: tokio::sync::Mutex::new(()),
                    record: RwLock::new(None),
                    state: RwLock::new(None),
                })
            })
            .clone()
    }

    fn snapshot(cell: &TenantCell) -> Option<Arc<TenantState>> {
        cell.state.read().expect("tenant lock poisoned").clone()
    }

    /// The tenant's knowledge record, loaded and cached without
    /// building any index. `Ok(None)` means no knowledge source.
    pub fn record(&self, tenant: &str) -> Result<Option<Arc<KnowledgeRecord>>> {
        let cell = self.cell(tenant);

        if let Some(record) = cell.record.read().expect("tenant lock poisoned").clone() {
            return Ok(Some(record));
        }

        let Some(record) = load_record(&self.knowledge_dir, tenant)? else {
            return Ok(None);
        };
        let record = Arc::new(record);
        *cell.record.write().expect("tenant lock poisoned") = Some(record.clone());
        Ok(Some(record))
    }

    /// Return the tenant's ready snapshot, building it if absent.
    ///
    /// `Ok(None)` means the tenant has no knowledge source. With
    /// `force`, the knowledge record is reloaded and the store
    /// recomputed regardless of validity.
    pub async fn ensure(&self, tenant: &str, force: bool) -> Result<Option<Arc<TenantState>>> {
        let cell = self.cell(tenant);

        if !force {
            if let Some(state) = Self::snapshot(&cell) {
                return Ok(Some(state));
            }
        }

        // One build at a time per tenant. Whoever held the lock before
        // us may have already produced the snapshot we need.
        let _guard = cell.build_lock.lock().await;

        if !force {
            if let Some(state) = Self::snapshot(&cell) {
                return Ok(Some(state));
            }
        }

        let Some(record) = load_record(&self.knowledge_dir, tenant)? else {
            tracing::warn!(tenant, "no knowledge source found");
            *cell.record.write().expect("tenant lock poisoned") = None;
            *cell.state.write().expect("tenant lock poisoned") = None;
            return Ok(None);
        };
        let record = Arc::new(record);
        *cell.record.write().expect("tenant lock poisoned") = Some(record.clone());

        let corpus = build_corpus(tenant, &record, self.max_chars);
        let path = store_path(&self.knowledge_dir, tenant);
        let model = self.embedder.model_name();

        // Reuse a persisted store when it still matches this corpus.
        let store = match load_store(&path) {
            Ok(Some(existing)) if !force && store_matches(&existing, &corpus, model) => {
                tracing::debug!(tenant, entries = existing.entries.len(), "reusing stored index");
                existing
            }
            Ok(Some(existing)) if !force => {
                tracing::info!(
                    tenant,
                    stored = existing.entries.len(),
                    corpus = corpus.len(),
                    "stored index is stale, rebuilding"
                );
                self.rebuild_store(tenant, &corpus, &path).await?
            }
            Ok(_) => self.rebuild_store(tenant, &corpus, &path).await?,
            Err(e) => {
                tracing::warn!(tenant, error = %e, "stored index unreadable, rebuilding");
                self.rebuild_store(tenant, &corpus, &path).await?
            }
        };

        let state = Arc::new(TenantState {
            record,
            corpus,
            store,
        });

        // Single-assignment swap: the new snapshot becomes visible all
        // at once, after the store is complete.
        *cell.state.write().expect("tenant lock poisoned") = Some(state.clone());

        Ok(Some(state))
    }

    async fn rebuild_store(
        &self,
        tenant: &str,
        corpus: &[Chunk],
        path: &std::path::Path,
    ) -> Result<EmbeddingStore> {
        tracing::info!(tenant, chunks = corpus.len(), "building embedding store");
        let store = build_store(self.embedder.as_ref(), corpus, self.batch_size).await;
        save_store(path, &store)?;
        Ok(store)
    }

    /// Introspection only; never triggers a build.
    pub fn health(&self, tenant: &str) -> TenantHealth {
        let cell = self.cell(tenant);

        if let Some(state) = Self::snapshot(&cell) {
            let ready = state.store.entries.len() == state.corpus.len();
            return TenantHealth {
                tenant: tenant.to_string(),
                record_count: state.record.record_count(),
                chunk_count: state.corpus.len(),
                embedding_count: state.store.entries.len(),
                ready,
            };
        }

        let record_count = load_record(&self.knowledge_dir, tenant)
            .ok()
            .flatten()
            .map(|record| record.record_count())
            .unwrap_or(0);

        TenantHealth {
            tenant: tenant.to_string(),
            record_count,
            chunk_count: 0,
            embedding_count: 0,
            ready: false,
        }
    }

    /// Tenants with a knowledge source on disk.
    pub fn tenants(&self) -> Result<Vec<String>> {
        list_tenants(&self.knowledge_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Small await point so concurrent ensure calls overlap.
            tokio::task::yield_now().await;
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    const SHOP_JSON: &str = r#"{
        "catalog": [
            {"name": "Ghế gỗ", "description": "Ghế gỗ tự nhiên, giá 1.200.000đ"},
            {"name": "Bàn tròn", "description": "Bàn tròn mặt đá, giá 3.500.000đ"}
        ]
    }"#;

    fn registry_with_shop(
        dir: &std::path::Path,
        embedder: Arc<CountingEmbedder>,
    ) -> TenantRegistry {
        std::fs::write(dir.join("shop.json"), SHOP_JSON).unwrap();
        TenantRegistry::new(dir.to_path_buf(), 400, 64, embedder)
    }

    #[tokio::test]
    async fn test_ensure_builds_and_matches_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        let registry = registry_with_shop(dir.path(), embedder);

        let state = registry.ensure("shop", false).await.unwrap().unwrap();
        assert_eq!(state.store.entries.len(), state.corpus.len());
        assert!(state.corpus.len() >= 2);
    }

    #[tokio::test]
    async fn test_second_ensure_reuses_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        let registry = registry_with_shop(dir.path(), embedder.clone());

        registry.ensure("shop", false).await.unwrap();
        let calls_after_first = embedder.calls.load(Ordering::SeqCst);
        registry.ensure("shop", false).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_builds_once() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        let registry = Arc::new(registry_with_shop(dir.path(), embedder.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.ensure("shop", false).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }

        // One batch covers the whole small corpus; only one build ran.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_rebuild_recomputes() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        let registry = registry_with_shop(dir.path(), embedder.clone());

        registry.ensure("shop", false).await.unwrap();
        registry.ensure("shop", true).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persisted_store_reused_across_registries() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        {
            let registry = registry_with_shop(dir.path(), embedder.clone());
            registry.ensure("shop", false).await.unwrap();
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        // Fresh registry, same disk: the persisted store still matches
        // the corpus, so no embedding call happens.
        let registry = TenantRegistry::new(dir.path().to_path_buf(), 400, 64, embedder.clone());
        let state = registry.ensure("shop", false).await.unwrap().unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.store.entries.len(), state.corpus.len());
    }

    #[tokio::test]
    async fn test_stale_persisted_store_rebuilt_before_serving() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        {
            let registry = registry_with_shop(dir.path(), embedder.clone());
            registry.ensure("shop", false).await.unwrap();
        }

        // Edit the knowledge file so the persisted store no longer
        // matches its corpus.
        let grown = r#"{
            "catalog": [
                {"name": "Ghế gỗ", "description": "Ghế gỗ tự nhiên, giá 1.200.000đ"},
                {"name": "Bàn tròn", "description": "Bàn tròn mặt đá, giá 3.500.000đ"},
                {"name": "Kệ sách", "description": "Kệ sách gỗ sồi, giá 2.100.000đ"}
            ]
        }"#;
        std::fs::write(dir.path().join("shop.json"), grown).unwrap();

        let registry = TenantRegistry::new(dir.path().to_path_buf(), 400, 64, embedder.clone());
        let state = registry.ensure("shop", false).await.unwrap().unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(state.store.entries.len(), state.corpus.len());
    }

    #[tokio::test]
    async fn test_record_does_not_build_index() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        let registry = registry_with_shop(dir.path(), embedder.clone());

        let record = registry.record("shop").unwrap().unwrap();
        assert_eq!(record.catalog.len(), 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_tenant_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            TenantRegistry::new(dir.path().to_path_buf(), 400, 64, CountingEmbedder::new());
        assert!(registry.ensure("ghost", false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_health_before_and_after_build() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();
        let registry = registry_with_shop(dir.path(), embedder);

        let before = registry.health("shop");
        assert!(!before.ready);
        assert_eq!(before.record_count, 2);
        assert_eq!(before.embedding_count, 0);

        registry.ensure("shop", false).await.unwrap();
        let after = registry.health("shop");
        assert!(after.ready);
        assert_eq!(after.chunk_count, after.embedding_count);
    }
}
