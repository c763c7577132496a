//! Language-model boundary.
//!
//! The [`LanguageModel`] trait is the only way the rest of Sage talks to a
//! model. Backends:
//! - **[`OllamaClient`]** — local Ollama, `POST {url}/api/generate` with
//!   `stream: false`.
//! - **[`OpenAiClient`]** — OpenAI chat completions; key from `OPENAI_API_KEY`.
//! - **[`DisabledModel`]** — always fails, so callers take their fallback.
//!
//! Transient failures are retried by the shared HTTP helper; the final
//! failure surfaces as [`LlmError`] and is mapped to a fallback by callers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::http::{self, PostError};

/// A text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short backend identifier used in logs.
    fn name(&self) -> &str;
    /// Complete `prompt`, returning the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Used when `llm.provider = "disabled"`.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

// ============ Ollama ============

pub struct OllamaClient {
    model: String,
    url: String,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Self {
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Self {
            model: config.model.clone(),
            url: format!("{}/api/generate", base.trim_end_matches('/')),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs),
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }

        let json = http::post_json(&self.client, &self.url, None, &body, self.max_retries)
            .await
            .map_err(|e| post_error("ollama", e))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> Result<String, LlmError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::Malformed {
            backend: "ollama".to_string(),
            message: "missing 'response' field".to_string(),
        })
}

// ============ OpenAI ============

pub struct OpenAiClient {
    model: String,
    url: String,
    api_key: String,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::Unavailable {
            backend: "openai".to_string(),
            message: "OPENAI_API_KEY environment variable not set".to_string(),
        })?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            model: config.model.clone(),
            url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }

        let json = http::post_json(
            &self.client,
            &self.url,
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await
        .map_err(|e| post_error("openai", e))?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::Malformed {
            backend: "openai".to_string(),
            message: "missing choices[0].message.content".to_string(),
        })
}

fn post_error(backend: &str, err: PostError) -> LlmError {
    match err {
        PostError::Decode(message) => LlmError::Malformed {
            backend: backend.to_string(),
            message,
        },
        other => LlmError::Unavailable {
            backend: backend.to_string(),
            message: other.to_string(),
        },
    }
}

/// Create the [`LanguageModel`] named by `config.provider`.
///
/// An OpenAI backend without `OPENAI_API_KEY` is an error here rather than
/// on every turn.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, LlmError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "ollama" => Ok(Arc::new(OllamaClient::new(config))),
        "openai" => Ok(Arc::new(OpenAiClient::new(config)?)),
        other => Err(LlmError::Unavailable {
            backend: other.to_string(),
            message: "unknown llm provider".to_string(),
        }),
    }
}
