//! Error taxonomy for Sage.
//!
//! Startup errors ([`IndexError`]) are fatal and surface to the operator.
//! Every per-turn error ([`RetrievalError`], [`LlmError`],
//! [`SpeechInputError`], [`SpeechOutputError`]) is recovered at its call
//! site and mapped to a supportive fallback; none of them ever reaches the
//! person on the other end of the conversation.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while building or loading the vector index at startup.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The corpus could not be turned into an index (missing, empty,
    /// unreadable, or embedding failed).
    #[error("IndexBuildError: {message}")]
    Build {
        /// A description of the failure.
        message: String,
    },

    /// The persisted index exists but cannot be used.
    #[error("IndexLoadError ({}): {message}", path.display())]
    Load {
        /// The persist directory that was being loaded.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },
}

impl IndexError {
    pub fn build(message: impl Into<String>) -> Self {
        IndexError::Build {
            message: message.into(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        IndexError::Load {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure while producing embedding vectors.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider is switched off in the configuration.
    #[error("embedding provider is disabled")]
    Disabled,

    /// The provider rejected the request or returned an unusable payload.
    #[error("embedding error ({provider}): {message}")]
    Provider {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

/// Failure of the language-model boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No language model is configured.
    #[error("language model is disabled")]
    Disabled,

    /// The service could not be reached (connection refused, timeout, ...).
    #[error("language model unavailable ({backend}): {message}")]
    Unavailable {
        /// The backend that was called.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The service answered but the payload could not be used.
    #[error("malformed language model response ({backend}): {message}")]
    Malformed {
        /// The backend that was called.
        backend: String,
        /// A description of the failure.
        message: String,
    },
}

/// Failure of a retrieval query during a turn.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("no passage cleared the similarity threshold")]
    NoRelevantPassages,

    #[error("answer synthesis failed: {0}")]
    Synthesis(#[from] LlmError),

    #[error("answer synthesis returned an empty answer")]
    EmptyAnswer,
}

/// Failure while waiting for or capturing speech input.
#[derive(Debug, Error)]
pub enum SpeechInputError {
    #[error("speech input closed")]
    Closed,

    #[error("speech input device error: {0}")]
    Device(String),
}

/// Failure while synthesizing speech output.
#[derive(Debug, Error)]
pub enum SpeechOutputError {
    #[error("refusing to synthesize empty text")]
    EmptyText,

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("speech worker failed: {0}")]
    Worker(String),
}
