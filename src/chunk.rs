//! Paragraph-boundary text chunker.
//!
//! Splits document text into [`Chunk`]s that respect a configurable
//! `max_tokens` limit. Splitting happens on paragraph boundaries (`\n\n`)
//! so a passage handed to the language model reads as a coherent unit;
//! paragraphs longer than the limit are cut at the last newline or space
//! that fits.
//!
//! Each chunk carries a SHA-256 hash of its text, stored with the index
//! manifest so a reload can be checked against what was embedded.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunks with contiguous indices starting at 0.
///
/// Whitespace-only text produces no chunks; the index builder skips such
/// documents.
pub fn chunk_text(document_id: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut pieces: Vec<String> = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let joined_len = if buf.is_empty() {
            para.len()
        } else {
            buf.len() + 2 + para.len()
        };

        if joined_len > max_chars && !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
        }

        if para.len() > max_chars {
            pieces.extend(hard_split(para, max_chars));
            continue;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }

    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(document_id, i as i64, piece))
        .collect()
}

/// Cut an oversized paragraph into pieces of at most `max_chars` bytes,
/// preferring newline then space boundaries and never splitting a UTF-8
/// character.
fn hard_split(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = paragraph;

    while !rest.is_empty() {
        if rest.len() <= max_chars {
            out.push(rest.trim().to_string());
            break;
        }

        let mut limit = max_chars;
        while !rest.is_char_boundary(limit) {
            limit -= 1;
        }
        let window = &rest[..limit];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map(|pos| pos + 1)
            .filter(|&pos| pos > 0)
            .unwrap_or(limit.max(next_char_len(rest)));

        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        rest = &rest[cut..];
    }

    out
}

fn next_char_len(s: &str) -> usize {
    s.chars().next().map(char::len_utf8).unwrap_or(0)
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
