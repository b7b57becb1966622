//! Core data models used throughout Answer Harness.
//!
//! These types represent the knowledge records, chunks, and retrieval
//! results that flow through the corpus-building and answer pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant's unit of source truth, loaded wholesale from
/// `<knowledge.dir>/<tenant>.json`. Immutable for the lifetime of a
/// snapshot; reloaded on rebuild.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgeRecord {
    /// Deterministic keyword rules consulted before retrieval.
    #[serde(default)]
    pub triggers: Vec<TriggerRule>,
    /// Catalog items (products, projects) with free-text descriptions.
    #[serde(default)]
    pub catalog: Vec<CatalogItem>,
    /// Narrative summaries (about-us text, policies, FAQ prose).
    #[serde(default)]
    pub summaries: Vec<Summary>,
    /// Optional persona used when assembling the generation prompt.
    #[serde(default)]
    pub persona: Option<Persona>,
    /// Trigger names to test first, in order. Remaining triggers follow
    /// in declared order.
    #[serde(default)]
    pub priority_triggers: Vec<String>,
}

/// A deterministic keyword rule: if any keyword matches the question at a
/// word boundary, one of the responses is returned without retrieval.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub response: ResponseText,
}

/// A trigger response: either a single text (possibly multi-line, one
/// variant per line) or an explicit list of variants.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResponseText {
    Text(String),
    Variants(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Summary {
    pub name: String,
    pub text: String,
}

/// Persona strings injected into the system prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct Persona {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_goal")]
    pub goal: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            role: default_role(),
            tone: default_tone(),
            goal: default_goal(),
        }
    }
}

fn default_role() -> String {
    "Trợ lý AI".to_string()
}
fn default_tone() -> String {
    "Thân thiện, chuyên nghiệp".to_string()
}
fn default_goal() -> String {
    "Hỗ trợ khách hàng.".to_string()
}

/// Provenance category of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Trigger,
    CatalogItem,
    Summary,
    Persona,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Trigger => "trigger",
            SourceType::CatalogItem => "catalog_item",
            SourceType::Summary => "summary",
            SourceType::Persona => "persona",
        }
    }
}

/// A bounded-size text fragment derived deterministically from a
/// knowledge record. The ordered sequence of chunks for a tenant is
/// its corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Deterministic id: `{source_type}:{source_key}#{index}`.
    pub id: String,
    pub tenant: String,
    /// Name of the originating record (trigger name, item name, ...).
    pub source_key: String,
    pub source_type: SourceType,
    pub text: String,
}

/// One persisted vector. Position in the store corresponds 1:1 to the
/// corpus chunk at the same index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    pub chunk_id: String,
    pub source_type: SourceType,
    pub source_key: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub dims: usize,
}

/// The persisted vector index for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStore {
    pub entries: Vec<EmbeddingEntry>,
    /// SHA-256 over the corpus ids and texts; a mismatch marks the
    /// store stale even when counts happen to agree.
    pub corpus_fingerprint: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// Ephemeral result of a single similarity query; never persisted.
#[derive(Debug, Clone)]
pub struct ScoredHit {
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    pub entry: EmbeddingEntry,
}

/// Introspection snapshot returned by `health`.
#[derive(Debug, Clone, Serialize)]
pub struct TenantHealth {
    pub tenant: String,
    pub record_count: usize,
    pub chunk_count: usize,
    pub embedding_count: usize,
    pub ready: bool,
}

impl KnowledgeRecord {
    /// Total number of named source records (triggers, catalog items,
    /// summaries, persona).
    pub fn record_count(&self) -> usize {
        self.triggers.len()
            + self.catalog.len()
            + self.summaries.len()
            + usize::from(self.persona.is_some())
    }
}
