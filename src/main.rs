//! # Answer Harness CLI (`ans`)
//!
//! The `ans` binary drives the retrieval-gated answer engine: one-shot
//! questions, index rebuilds, tenant introspection, and the HTTP answer
//! API.
//!
//! ## Usage
//!
//! ```bash
//! ans --config ./config/answer.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ans ask <tenant> <text>` | Answer one question from the CLI |
//! | `ans rebuild <tenant>` | Invalidate and recompute a tenant's index |
//! | `ans health <tenant>` | Show record/chunk/embedding counts |
//! | `ans tenants` | List tenants found in the knowledge directory |
//! | `ans serve` | Start the HTTP answer API |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use answer_harness::engine::AnswerEngine;
use answer_harness::{config, embedding, generate, server};

/// Answer Harness — a retrieval-gated answer engine for customer-support
/// bots.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/answer.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ans",
    about = "Answer Harness — a retrieval-gated answer engine for customer-support bots",
    version,
    long_about = "Answer Harness chunks and embeds per-tenant knowledge records, serves \
    similarity search over them, and gates a generative model behind a confidence threshold \
    so weak evidence yields a clarification instead of a fabricated answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/answer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question for a tenant and print the reply.
    Ask {
        /// Tenant identifier (knowledge file stem).
        tenant: String,
        /// The customer question.
        text: String,
    },

    /// Reload a tenant's knowledge record and recompute its index.
    Rebuild {
        tenant: String,
        /// Only recompute when the stored index no longer matches the
        /// knowledge file. Without this flag the index is always recomputed.
        #[arg(long)]
        if_stale: bool,
    },

    /// Show a tenant's record, chunk, and embedding counts.
    Health { tenant: String },

    /// List tenants found in the knowledge directory.
    Tenants,

    /// Start the HTTP answer API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("answer_harness=info,ans=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    let embedder = embedding::create_embedder(&config.embedding)?;
    let generators = generate::create_generators(&config.generation)?;
    let engine = Arc::new(AnswerEngine::new(config.clone(), embedder, generators));

    match cli.command {
        Commands::Ask { tenant, text } => {
            let reply = engine.answer(&tenant, &text).await;
            println!("{}", reply);
        }

        Commands::Rebuild { tenant, if_stale } => {
            let health = engine.rebuild(&tenant, !if_stale).await?;
            println!("rebuild {}", tenant);
            println!("  records: {}", health.record_count);
            println!("  chunks: {}", health.chunk_count);
            println!("  embeddings: {}", health.embedding_count);
            println!("  ready: {}", health.ready);
        }

        Commands::Health { tenant } => {
            let health = engine.health(&tenant);
            println!("health {}", tenant);
            println!("  records: {}", health.record_count);
            println!("  chunks: {}", health.chunk_count);
            println!("  embeddings: {}", health.embedding_count);
            println!("  ready: {}", health.ready);
        }

        Commands::Tenants => {
            let tenants = engine.tenants()?;
            if tenants.is_empty() {
                println!("No tenants found.");
            } else {
                for tenant in tenants {
                    println!("{}", tenant);
                }
            }
        }

        Commands::Serve => {
            server::run_server(engine, &config.server.bind, config.knowledge.prewarm).await?;
        }
    }

    Ok(())
}
