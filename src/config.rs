//! TOML configuration.
//!
//! A single [`Config`] is loaded once at startup and passed by reference to
//! the index store, the language-model clients and the session. Every
//! section has defaults, so a config file only needs to name what it
//! changes. See `config/sage.example.toml` for a complete example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Files larger than this are skipped during the scan.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from("./mental_health_docs")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
        "**/*.docx".to_string(),
    ]
}
fn default_max_file_bytes() -> u64 {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted index. Its existence decides
    /// between building and loading at startup.
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            persist_dir: default_persist_dir(),
        }
    }
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("./mental-health-storage")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of nearest chunks handed to answer synthesis.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to count as relevant.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    2
}
fn default_similarity_threshold() -> f32 {
    0.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
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
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            temperature: None,
            max_retries: default_llm_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_model() -> String {
    "llama3.1".to_string()
}
fn default_llm_retries() -> u32 {
    1
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResponderConfig {
    /// User text beyond this many characters is cut before prompting.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Cap for each optional reference section in the prompt.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_max_input_chars() -> usize {
    1_000
}
fn default_max_context_chars() -> usize {
    1_500
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_farewell")]
    pub farewell: String,
    /// How long a single listen waits for speech to start.
    #[serde(default = "default_listen_timeout_secs")]
    pub listen_timeout_secs: u64,
    /// Upper bound on a single captured phrase.
    #[serde(default = "default_phrase_limit_secs")]
    pub phrase_limit_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            greeting: default_greeting(),
            farewell: default_farewell(),
            listen_timeout_secs: default_listen_timeout_secs(),
            phrase_limit_secs: default_phrase_limit_secs(),
        }
    }
}

impl SessionConfig {
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::from_secs(self.phrase_limit_secs)
    }
}

fn default_assistant_name() -> String {
    "Sage".to_string()
}
fn default_greeting() -> String {
    "Hello, I'm Sage. I'm here to listen and support you. How are you feeling today?".to_string()
}
fn default_farewell() -> String {
    "Goodbye! Take care of yourself.".to_string()
}
fn default_listen_timeout_secs() -> u64 {
    5
}
fn default_phrase_limit_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    /// `console` (typed lines stand in for transcribed speech).
    #[serde(default = "default_speech_input")]
    pub input: String,
    /// `console` or `command`.
    #[serde(default = "default_speech_output")]
    pub output: String,
    /// TTS program for the `command` output, e.g. `say` or `espeak`.
    #[serde(default)]
    pub command: Option<String>,
    /// Extra arguments placed before the spoken text.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            input: default_speech_input(),
            output: default_speech_output(),
            command: None,
            args: Vec::new(),
        }
    }
}

fn default_speech_input() -> String {
    "console".to_string()
}
fn default_speech_output() -> String {
    "console".to_string()
}

impl Config {
    /// Built-in defaults, for commands that run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(-1.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.llm.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }

    if config.session.listen_timeout_secs == 0 {
        anyhow::bail!("session.listen_timeout_secs must be > 0");
    }

    match config.speech.input.as_str() {
        "console" => {}
        other => anyhow::bail!("Unknown speech input: '{}'. Must be console.", other),
    }

    match config.speech.output.as_str() {
        "console" => {}
        "command" => {
            if config.speech.command.is_none() {
                anyhow::bail!("speech.command must be set when speech.output is 'command'");
            }
        }
        other => anyhow::bail!(
            "Unknown speech output: '{}'. Must be console or command.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.chunking.max_tokens, 256);
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model, "llama3.1");
        assert_eq!(config.session.listen_timeout_secs, 5);
        assert_eq!(config.session.phrase_limit_secs, 10);
        assert!(config.session.greeting.starts_with("Hello, I'm Sage."));
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let err = parse("[chunking]\nmax_tokens = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = parse("[retrieval]\ntop_k = 0\n").unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let err = parse("[retrieval]\nsimilarity_threshold = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
    }

    #[test]
    fn rejects_unknown_providers() {
        assert!(parse("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse("[llm]\nprovider = \"magic\"\n").is_err());
    }

    #[test]
    fn remote_embedding_requires_model_and_dims() {
        let err = parse("[embedding]\nprovider = \"ollama\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));

        let err = parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n")
            .unwrap();
    }

    #[test]
    fn rejects_zero_listen_timeout() {
        let err = parse("[session]\nlisten_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("listen_timeout_secs"));
    }

    #[test]
    fn command_output_requires_command() {
        assert!(parse("[speech]\noutput = \"command\"\n").is_err());
        let config = parse("[speech]\noutput = \"command\"\ncommand = \"espeak\"\n").unwrap();
        assert_eq!(config.speech.command.as_deref(), Some("espeak"));
    }
}
