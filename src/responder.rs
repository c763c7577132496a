//! Empathetic response generation.
//!
//! Wraps the user's words in a fixed persona and guideline preamble and
//! asks the language model for a short supportive reply. Optional
//! reference sections (a retrieved answer, coping strategies) sit between
//! the guidelines and the user text. Any failure yields
//! [`RESPONSE_FALLBACK`]; the caller always gets something to say.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ResponderConfig;
use crate::llm::LanguageModel;

pub const RESPONSE_FALLBACK: &str = "I hear you, and I want you to know that your feelings are valid. Sometimes it helps to take things one moment at a time. What's one small thing that might help you feel a little better right now?";

/// Optional material the reply may draw on.
#[derive(Debug, Clone, Default)]
pub struct ResponseContext {
    /// An answer retrieved from the document corpus.
    pub reference: Option<String>,
    /// Coping strategies matched from the user's words.
    pub strategies: Option<String>,
}

pub struct Responder {
    llm: Arc<dyn LanguageModel>,
    assistant_name: String,
    max_input_chars: usize,
    max_context_chars: usize,
}

impl Responder {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &ResponderConfig, assistant_name: &str) -> Self {
        Self {
            llm,
            assistant_name: assistant_name.to_string(),
            max_input_chars: config.max_input_chars,
            max_context_chars: config.max_context_chars,
        }
    }

    pub async fn respond(&self, user_text: &str) -> String {
        self.respond_with(user_text, &ResponseContext::default()).await
    }

    pub async fn respond_with(&self, user_text: &str, context: &ResponseContext) -> String {
        let prompt = self.build_prompt(user_text, context);

        match self.llm.complete(&prompt).await {
            Ok(completion) => {
                let reply = completion.trim();
                if reply.is_empty() {
                    warn!(backend = self.llm.name(), "empty completion, using fallback");
                    return RESPONSE_FALLBACK.to_string();
                }
                info!(
                    backend = self.llm.name(),
                    reply_chars = reply.chars().count(),
                    with_reference = context.reference.is_some(),
                    with_strategies = context.strategies.is_some(),
                    "generated reply"
                );
                reply.to_string()
            }
            Err(e) => {
                warn!(backend = self.llm.name(), error = %e, "generation failed, using fallback");
                RESPONSE_FALLBACK.to_string()
            }
        }
    }

    fn build_prompt(&self, user_text: &str, context: &ResponseContext) -> String {
        let mut prompt = format!(
            "You are {}, a compassionate AI mental health support assistant.\n\
             \n\
             Guidelines:\n\
             - Provide emotional support and be empathetic\n\
             - Keep responses concise (2-3 sentences) but warm\n\
             - Validate the person's feelings\n\
             - Suggest coping strategies when appropriate\n\
             - Never diagnose or replace professional therapy\n",
            self.assistant_name
        );

        if let Some(reference) = &context.reference {
            prompt.push_str(&section(
                "Reference information",
                &truncate_chars(reference, self.max_context_chars),
            ));
        }
        if let Some(strategies) = &context.strategies {
            prompt.push_str(&section(
                "Coping strategies you may suggest",
                &truncate_chars(strategies, self.max_context_chars),
            ));
        }

        let user_text = truncate_chars(user_text.trim(), self.max_input_chars);
        prompt.push_str(&format!(
            "\nUser said: \"{}\"\n\nRespond with empathy and support:",
            user_text
        ));
        prompt
    }
}

fn section(title: &str, body: &str) -> String {
    format!("\n[{title}]\n{}\n[end {title}]\n", body.trim())
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
