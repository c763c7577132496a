//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]** — calls the OpenAI embeddings API.
//! - **[`OllamaProvider`]** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalProvider`** — runs a model locally via fastembed (feature
//!   `local-embeddings`); no network calls after the model download.
//!
//! Also provides vector utilities used by the index store:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`
//!
//! Use [`create_provider`] to instantiate the provider named in the
//! configuration:
//!
//! ```rust
//! # use sage::config::EmbeddingConfig;
//! # use sage::embedding::create_provider;
//! let config = EmbeddingConfig { provider: "disabled".to_string(), ..Default::default() };
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::http::{self, PostError};

/// An embedding backend.
///
/// `embed` returns one vector per input text, in input order, each of
/// length [`dims`](EmbeddingProvider::dims).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-small-en-v1.5"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Embed a single query text.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>, EmbeddingError> {
    provider
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EmbeddingError::Provider {
            provider: provider.model_name().to_string(),
            message: "empty embedding response".to_string(),
        })
}

/// Embed `texts` in batches of `batch_size`, checking that the provider
/// returns exactly one vector of the advertised size per text.
pub async fn embed_batched(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = provider.embed(batch).await?;
        if vectors.len() != batch.len() {
            return Err(EmbeddingError::Provider {
                provider: provider.model_name().to_string(),
                message: format!("expected {} vectors, got {}", batch.len(), vectors.len()),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != provider.dims()) {
            return Err(EmbeddingError::Provider {
                provider: provider.model_name().to_string(),
                message: format!(
                    "expected {}-dimensional vectors, got {}",
                    provider.dims(),
                    bad.len()
                ),
            });
        }
        out.extend(vectors);
    }
    Ok(out)
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"`. Building an index with it
/// fails with a descriptive error.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API (`POST /v1/embeddings`).
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let (model, dims) = require_model_and_dims(config, "openai")?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| EmbeddingError::Provider {
            provider: "openai".to_string(),
            message: "OPENAI_API_KEY environment variable not set".to_string(),
        })?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            model,
            dims,
            url: format!("{}/v1/embeddings", base.trim_end_matches('/')),
            api_key,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = http::post_json(
            &self.client,
            &self.url,
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await
        .map_err(|e| provider_error("openai", e))?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let malformed = |message: &str| EmbeddingError::Provider {
        provider: "openai".to_string(),
        message: message.to_string(),
    };

    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| malformed("invalid response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| malformed("invalid response: missing embedding"))?;
        indexed.push((index, to_f32_vec(embedding)));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance (`POST /api/embed`).
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let (model, dims) = require_model_and_dims(config, "ollama")?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims,
            url: format!("{}/api/embed", base.trim_end_matches('/')),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = http::post_json(&self.client, &self.url, None, &body, self.max_retries)
            .await
            .map_err(|e| provider_error("ollama", e))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let malformed = |message: &str| EmbeddingError::Provider {
        provider: "ollama".to_string(),
        message: message.to_string(),
    };

    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| malformed("invalid response: missing embeddings array"))?
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| malformed("invalid response: embedding is not an array"))
        })
        .collect()
}

// ============ Local Provider (fastembed) ============

/// Embedding provider for local inference via fastembed.
///
/// The model is downloaded from Hugging Face on first use and cached;
/// afterwards embeddings run entirely offline. Inference runs on a
/// blocking worker so the async runtime is never stalled.
#[cfg(feature = "local-embeddings")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    model: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let (model_name, dims) = resolve_local_model(config);
        // Reject unknown names up front rather than at the first embed.
        config_to_fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            dims,
            model: Arc::new(std::sync::Mutex::new(None)),
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let fastembed_model = config_to_fastembed_model(&self.model_name)?;
        let slot = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.batch_size;
        let local_error = |message: String| EmbeddingError::Provider {
            provider: "local".to_string(),
            message,
        };

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| local_error("embedding model lock poisoned".to_string()))?;
            if guard.is_none() {
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
                )
                .map_err(|e| local_error(format!("failed to initialize local model: {}", e)))?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| local_error("local model missing after init".to_string()))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| local_error(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| local_error(format!("embedding worker failed: {}", e)))?
    }
}

#[cfg(feature = "local-embeddings")]
fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| "bge-small-en-v1.5".to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        _ => 384,
    });

    (model_name, dims)
}

#[cfg(feature = "local-embeddings")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => Err(EmbeddingError::Provider {
            provider: "local".to_string(),
            message: format!(
                "unknown local embedding model '{}'. Supported: all-minilm-l6-v2, \
                 bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, nomic-embed-text-v1.5",
                other
            ),
        }),
    }
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (feature `local-embeddings`) |
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(EmbeddingError::Provider {
            provider: "local".to_string(),
            message: "local embeddings require building with --features local-embeddings"
                .to_string(),
        }),
        other => Err(EmbeddingError::Provider {
            provider: other.to_string(),
            message: "unknown embedding provider".to_string(),
        }),
    }
}

fn require_model_and_dims(
    config: &EmbeddingConfig,
    provider: &str,
) -> Result<(String, usize), EmbeddingError> {
    let missing = |field: &str| EmbeddingError::Provider {
        provider: provider.to_string(),
        message: format!("embedding.{} required", field),
    };
    let model = config.model.clone().ok_or_else(|| missing("model"))?;
    let dims = config.dims.filter(|d| *d > 0).ok_or_else(|| missing("dims"))?;
    Ok((model, dims))
}

fn provider_error(provider: &str, err: PostError) -> EmbeddingError {
    EmbeddingError::Provider {
        provider: provider.to_string(),
        message: err.to_string(),
    }
}

fn to_f32_vec(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use sage::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), Some(v));
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Returns `None` when the length is not a multiple of four, which only
/// happens for corrupt data.
pub fn blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
