//! # Sage
//!
//! A local-first, voice-driven mental-health support companion.
//!
//! Sage answers with short empathetic replies generated by a language
//! model, grounds informational answers in a locally indexed document
//! corpus, and puts a keyword-triggered crisis layer in front of
//! everything generative.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Corpus     │──▶│ Chunk+Embed  │──▶│ index.sqlite │
//! │ md/txt/pdf.. │   │              │   │  (vectors)   │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │ load once
//!  speech in ─▶ ┌─────────┐  crisis? ─▶ resources
//!               │ Session │──────────▶ retrieval + coping ─▶ responder ─▶ speech out
//!               └─────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors per boundary |
//! | [`connector_fs`] | Corpus directory scanning |
//! | [`extract`] | PDF / DOCX text extraction |
//! | [`chunk`] | Paragraph-boundary text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`db`] | Index database connection |
//! | [`migrate`] | Index schema |
//! | [`index`] | Build-or-load of the vector index |
//! | [`llm`] | Language-model boundary |
//! | [`retrieval`] | Question answering over the index |
//! | [`crisis`] | Crisis keyword detection and resources |
//! | [`coping`] | Coping-strategy lookup |
//! | [`responder`] | Empathetic reply generation |
//! | [`speech`] | Speech input/output boundaries |
//! | [`session`] | Conversation state machine |

pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod coping;
pub mod crisis;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
mod http;
pub mod index;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod responder;
pub mod retrieval;
pub mod session;
pub mod speech;
