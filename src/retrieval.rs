//! Retrieval query service: question in, grounded answer out.
//!
//! ```text
//! question ─▶ embed ─▶ nearest(top_k, threshold) ─▶ synthesis prompt ─▶ LLM ─▶ Answer
//! ```
//!
//! [`RetrievalService::try_query`] reports why a query failed;
//! [`RetrievalService::query`] never fails and substitutes
//! [`RETRIEVAL_FALLBACK`] instead. Answers are only synthesized from
//! passages that clear the similarity threshold.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::RetrievalError;
use crate::index::VectorIndex;
use crate::llm::LanguageModel;
use crate::models::RetrievedChunk;

pub const RETRIEVAL_FALLBACK: &str = "I'm having trouble accessing that information right now. Would you like to talk about what's on your mind?";

/// A synthesized answer and the passages it was drawn from.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Empty for the fallback answer.
    pub sources: Vec<RetrievedChunk>,
}

impl Answer {
    pub fn fallback() -> Self {
        Self {
            text: RETRIEVAL_FALLBACK.to_string(),
            sources: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.sources.is_empty() && self.text == RETRIEVAL_FALLBACK
    }
}

pub struct RetrievalService {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
    threshold: f32,
}

impl RetrievalService {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            top_k: config.top_k,
            threshold: config.similarity_threshold,
        }
    }

    /// Answer `question`, or [`Answer::fallback`] on any failure.
    pub async fn query(&self, question: &str) -> Answer {
        let started = Instant::now();
        match self.try_query(question).await {
            Ok(answer) => {
                info!(
                    question_chars = question.chars().count(),
                    hits = answer.sources.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "retrieval answered"
                );
                answer
            }
            Err(e) => {
                warn!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "retrieval failed, using fallback"
                );
                Answer::fallback()
            }
        }
    }

    pub async fn try_query(&self, question: &str) -> Result<Answer, RetrievalError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RetrievalError::EmptyQuestion);
        }

        let query_vec = embed_query(self.embedder.as_ref(), question).await?;
        let hits = self.index.nearest(&query_vec, self.top_k, self.threshold);
        if hits.is_empty() {
            return Err(RetrievalError::NoRelevantPassages);
        }
        for hit in &hits {
            debug!(source = %hit.source_id, score = hit.score, "retrieved passage");
        }

        let prompt = synthesis_prompt(question, &hits);
        let completion = self.llm.complete(&prompt).await?;
        let text = completion.trim();
        if text.is_empty() {
            return Err(RetrievalError::EmptyAnswer);
        }

        Ok(Answer {
            text: text.to_string(),
            sources: hits,
        })
    }
}

fn synthesis_prompt(question: &str, hits: &[RetrievedChunk]) -> String {
    let context = hits
        .iter()
        .map(|h| h.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\n\
         Answer: "
    )
}
