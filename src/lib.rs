//! # Answer Harness
//!
//! A retrieval-gated answer engine for customer-support bots.
//!
//! Answer Harness turns per-tenant knowledge records (trigger rules,
//! catalog items, summaries, a persona) into a chunked, embedded corpus
//! and answers questions through a confidence-gated pipeline: a
//! deterministic keyword fast path first, then similarity retrieval,
//! then — only when the evidence is strong enough — a closed-world
//! generation call restricted to the retrieved context.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Knowledge     │──▶│  Corpus       │──▶│ Embedding     │
//! │ <tenant>.json │   │ Chunk + Tag  │   │ Store (JSON)  │
//! └───────────────┘   └──────────────┘   └──────┬────────┘
//!                                               │
//!          question ──▶ fast path ──▶ search ──▶│
//!                          │             │      ▼
//!                          ▼             ▼   gate ≥ 0.72 ──▶ generate
//!                        reply        clarify                  │
//!                                                              ▼
//!                                                           reply
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`knowledge`] | Per-tenant knowledge record loading |
//! | [`chunk`] | Sentence-boundary text chunking |
//! | [`corpus`] | Corpus construction and fingerprinting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Persisted per-tenant embedding store |
//! | [`search`] | Cosine similarity search |
//! | [`gate`] | Confidence gate and closed-world prompt assembly |
//! | [`fastpath`] | Deterministic keyword-trigger matching |
//! | [`generate`] | Generation strategies and provider fallback |
//! | [`registry`] | Per-tenant build locks and snapshots |
//! | [`engine`] | The answer orchestrator |
//! | [`server`] | HTTP answer API |

pub mod chunk;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod fastpath;
pub mod gate;
pub mod generate;
pub mod knowledge;
pub mod models;
pub mod registry;
pub mod search;
pub mod server;
pub mod store;
