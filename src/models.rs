//! Core data models used throughout Sage.
//!
//! These types represent the corpus documents, chunks and retrieval hits
//! that flow through the index pipeline, and the per-turn values that flow
//! through the conversation loop.

use chrono::{DateTime, Utc};

/// A document read from the corpus directory, before chunking.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path relative to the corpus root (stable identifier).
    pub source_id: String,
    pub title: String,
    pub content_type: String,
    pub body: String,
    pub modified_at: DateTime<Utc>,
}

/// A chunk of a document's body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk selected by nearest-neighbor search, with its cosine score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source_id: String,
    pub text: String,
    pub score: f32,
}

/// Which branch the orchestrator took for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Crisis language was detected; fixed resources were spoken.
    Crisis,
    /// The input looked like a question; retrieval informed the reply.
    Informational,
    /// Ordinary supportive reply.
    Supportive,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Crisis => "crisis",
            Branch::Informational => "informational",
            Branch::Supportive => "supportive",
        }
    }
}

/// One listen → evaluate → respond exchange. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub input: String,
    pub branch: Branch,
    pub output: String,
}
