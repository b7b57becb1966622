//! Generation strategies and the provider fallback chain.
//!
//! Each [`Generator`] wraps one chat-completion provider. The
//! orchestrator holds an ordered list of them and tries each in turn;
//! the first success short-circuits. This replaces ad hoc
//! "try A, on failure try B" wiring with a uniform strategy list that
//! works the same for one provider or many.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;

/// An external chat-completion service. May fail; callers own the
/// fallback policy.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider label for logs (e.g. `"openai"`).
    fn name(&self) -> &str;
    /// Complete `user_text` under `system_prompt`, returning the reply
    /// text.
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

/// Try each generator in order; the first success wins.
pub async fn complete_with_fallback(
    generators: &[Arc<dyn Generator>],
    system_prompt: &str,
    user_text: &str,
) -> Result<String> {
    let mut last_err = None;

    for generator in generators {
        match generator.complete(system_prompt, user_text).await {
            Ok(reply) => {
                tracing::debug!(provider = generator.name(), "generation succeeded");
                return Ok(reply);
            }
            Err(e) => {
                tracing::warn!(provider = generator.name(), error = %e, "generation failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("No generation providers configured")))
}

/// Build the configured provider chain, in configured order.
pub fn create_generators(config: &GenerationConfig) -> Result<Vec<Arc<dyn Generator>>> {
    let mut generators: Vec<Arc<dyn Generator>> = Vec::new();

    for provider in &config.providers {
        match provider.as_str() {
            "openai" => generators.push(Arc::new(OpenAiGenerator::new(config)?)),
            "gemini" => generators.push(Arc::new(GeminiGenerator::new(config)?)),
            other => bail!("Unknown generation provider: {}", other),
        }
    }

    Ok(generators)
}

// ============ OpenAI ============

/// Chat completions via `POST /v1/chat/completions`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiGenerator {
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.openai_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI chat error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let reply = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing message content"))?;

        Ok(reply.trim().to_string())
    }
}

// ============ Gemini ============

/// Chat completions via the Gemini `generateContent` endpoint.
///
/// Requires the `GEMINI_API_KEY` environment variable.
pub struct GeminiGenerator {
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.gemini_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, api_key
        );

        let body = serde_json::json!({
            "system_instruction": {"parts": [{"text": system_prompt}]},
            "contents": [{"parts": [{"text": user_text}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        });

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let reply = json
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidate text"))?;

        Ok(reply.trim().to_string())
    }
}
