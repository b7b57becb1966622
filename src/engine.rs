//! The answer orchestrator.
//!
//! Ties the pipeline together as a linear state machine:
//! fast-path → retrieval → gate → generate → done, with clarify and
//! degraded terminal outcomes. Every failure is absorbed here or below;
//! the public [`AnswerEngine::answer`] contract is a non-empty reply
//! string, always, with no internal retry loop (retries belong to the
//! provider clients).

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::fastpath::match_triggers;
use crate::gate::{gate, render_prompt, sanitize_reply, GateDecision};
use crate::generate::{complete_with_fallback, Generator};
use crate::models::TenantHealth;
use crate::registry::TenantRegistry;
use crate::search::search;

/// Error for administrative operations on a tenant with no knowledge
/// file. Carried inside `anyhow::Error`; the HTTP layer downcasts to
/// it for the 404 mapping.
#[derive(Debug)]
pub struct UnknownTenant(pub String);

impl std::fmt::Display for UnknownTenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no knowledge source found for tenant '{}'", self.0)
    }
}

impl std::error::Error for UnknownTenant {}

pub struct AnswerEngine {
    config: Config,
    registry: Arc<TenantRegistry>,
    embedder: Arc<dyn Embedder>,
    generators: Vec<Arc<dyn Generator>>,
}

impl AnswerEngine {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generators: Vec<Arc<dyn Generator>>,
    ) -> Self {
        let registry = Arc::new(TenantRegistry::new(
            config.knowledge.dir.clone(),
            config.chunking.max_chars,
            config.embedding.batch_size,
            embedder.clone(),
        ));
        Self {
            config,
            registry,
            embedder,
            generators,
        }
    }

    /// Answer one question. Never fails and never returns an empty
    /// string; every failure path lands on one of the fixed messages.
    pub async fn answer(&self, tenant: &str, user_text: &str) -> String {
        let messages = &self.config.messages;

        if user_text.trim().is_empty() {
            return messages.clarify.clone();
        }

        // FAST_PATH: deterministic rules win before any retrieval cost,
        // and never touch the embedding store.
        let record = match self.registry.record(tenant) {
            Ok(Some(record)) => record,
            Ok(None) => return messages.loading.clone(),
            Err(e) => {
                tracing::error!(tenant, error = %e, "knowledge record unreadable");
                return messages.busy.clone();
            }
        };

        if let Some(reply) = match_triggers(&record, user_text) {
            tracing::debug!(tenant, "fast-path trigger hit");
            return if reply.is_empty() {
                messages.clarify.clone()
            } else {
                reply
            };
        }

        // RETRIEVAL: build the corpus and store lazily if absent.
        let state = match self.registry.ensure(tenant, false).await {
            Ok(Some(state)) => state,
            Ok(None) => return messages.loading.clone(),
            Err(e) => {
                tracing::error!(tenant, error = %e, "ensure failed");
                return messages.busy.clone();
            }
        };

        let query_vec = match self.embedder.embed(&[user_text.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => {
                tracing::error!(tenant, "query embedding returned no vector");
                return messages.busy.clone();
            }
            Err(e) => {
                tracing::warn!(tenant, error = %e, "query embedding failed");
                return messages.busy.clone();
            }
        };

        let hits = search(&query_vec, &state.store, self.config.retrieval.top_k);
        let top_score = hits.first().map(|h| h.score).unwrap_or(0.0);

        // GATE + GENERATE
        match gate(hits, self.config.retrieval.score_threshold) {
            GateDecision::Clarify => {
                tracing::debug!(tenant, top_score, "below retrieval threshold");
                messages.clarify.clone()
            }
            GateDecision::Generate(evidence) => {
                let persona = state.record.persona.clone().unwrap_or_default();
                let prompt = render_prompt(&persona, &evidence, &messages.clarify);

                match complete_with_fallback(&self.generators, &prompt, user_text).await {
                    Ok(reply) => sanitize_reply(&reply, &messages.clarify),
                    Err(e) => {
                        tracing::warn!(tenant, error = %e, "all generation providers failed");
                        messages.busy.clone()
                    }
                }
            }
        }
    }

    /// Administrative rebuild: reload the knowledge record and recompute
    /// the index. Structured errors are allowed here; the caller is an
    /// operator, not an end user.
    pub async fn rebuild(&self, tenant: &str, force: bool) -> Result<TenantHealth> {
        match self.registry.ensure(tenant, force).await? {
            Some(_) => Ok(self.registry.health(tenant)),
            None => Err(UnknownTenant(tenant.to_string()).into()),
        }
    }

    pub fn health(&self, tenant: &str) -> TenantHealth {
        self.registry.health(tenant)
    }

    pub fn tenants(&self) -> Result<Vec<String>> {
        self.registry.tenants()
    }

    /// Warm every tenant's index. Intended to be spawned in the
    /// background at startup; failures are logged, never propagated,
    /// and a request arriving before warm-up completes simply runs its
    /// own `ensure`.
    pub async fn prewarm(&self) {
        let tenants = match self.tenants() {
            Ok(tenants) => tenants,
            Err(e) => {
                tracing::warn!(error = %e, "prewarm could not list tenants");
                return;
            }
        };

        for tenant in tenants {
            match self.registry.ensure(&tenant, false).await {
                Ok(Some(state)) => {
                    tracing::info!(
                        tenant,
                        chunks = state.corpus.len(),
                        "prewarmed tenant index"
                    );
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(tenant, error = %e, "prewarm failed"),
            }
        }
    }
}
