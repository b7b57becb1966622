use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub knowledge: KnowledgeConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// Directory holding one `<tenant>.json` knowledge file per tenant.
    /// Built indexes are persisted under `<dir>/index/`.
    pub dir: PathBuf,
    /// Warm every tenant's index in the background on server startup.
    #[serde(default = "default_prewarm")]
    pub prewarm: bool,
}

fn default_prewarm() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub max_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum top-hit cosine similarity required before the generative
    /// model is invoked at all.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_score_threshold() -> f32 {
    0.72
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embed_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embed_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Providers tried in order; the first success wins.
    #[serde(default = "default_gen_providers")]
    pub providers: Vec<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            providers: default_gen_providers(),
            openai_model: default_openai_model(),
            gemini_model: default_gemini_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_gen_providers() -> Vec<String> {
    vec!["openai".to_string(), "gemini".to_string()]
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Fixed, tenant-agnostic reply strings. Never empty; never carry
/// internal error text.
#[derive(Debug, Deserialize, Clone)]
pub struct MessagesConfig {
    #[serde(default = "default_clarify")]
    pub clarify: String,
    #[serde(default = "default_busy")]
    pub busy: String,
    #[serde(default = "default_loading")]
    pub loading: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            clarify: default_clarify(),
            busy: default_busy(),
            loading: default_loading(),
        }
    }
}

fn default_clarify() -> String {
    "Mình chưa rõ ý bạn lắm, bạn mô tả cụ thể hơn giúp mình nhé?".to_string()
}
fn default_busy() -> String {
    "Hệ thống đang bận, thử lại sau 1 phút nha 😅".to_string()
}
fn default_loading() -> String {
    "Dữ liệu đang nạp, thử lại sau 1 phút nha 😅".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(-1.0..=1.0).contains(&config.retrieval.score_threshold) {
        anyhow::bail!("retrieval.score_threshold must be in [-1.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    if config.generation.providers.is_empty() {
        anyhow::bail!("generation.providers must list at least one provider");
    }
    for provider in &config.generation.providers {
        match provider.as_str() {
            "openai" | "gemini" => {}
            other => anyhow::bail!(
                "Unknown generation provider: '{}'. Must be openai or gemini.",
                other
            ),
        }
    }

    if config.messages.clarify.trim().is_empty()
        || config.messages.busy.trim().is_empty()
        || config.messages.loading.trim().is_empty()
    {
        anyhow::bail!("messages.clarify, messages.busy, and messages.loading must not be empty");
    }

    Ok(())
}
