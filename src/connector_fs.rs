//! Corpus directory scanner.
//!
//! Walks the configured corpus root, applies include/exclude globs, reads
//! each matching file (extracting text from PDF/DOCX) and returns the
//! documents sorted by relative path so index construction is
//! deterministic.

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::IndexError;
use crate::extract;
use crate::models::SourceDocument;

pub fn scan_corpus(corpus: &CorpusConfig) -> Result<Vec<SourceDocument>, IndexError> {
    let root = &corpus.root;
    if !root.is_dir() {
        return Err(IndexError::build(format!(
            "corpus directory does not exist or is not a directory: {}",
            root.display()
        )));
    }

    let include_set = build_globset(&corpus.include_globs)?;

    let mut excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    excludes.extend(corpus.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut docs = Vec::new();

    for entry in WalkDir::new(root).follow_links(corpus.follow_symlinks) {
        let entry = entry.map_err(|e| {
            IndexError::build(format!("failed to read corpus {}: {}", root.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > corpus.max_file_bytes {
            warn!(file = %rel_str, size, "skipping corpus file over size limit");
            continue;
        }

        match read_document(path, &rel_str) {
            Ok(Some(doc)) => docs.push(doc),
            Ok(None) => debug!(file = %rel_str, "skipping empty corpus file"),
            Err(message) => warn!(file = %rel_str, error = %message, "skipping unreadable corpus file"),
        }
    }

    docs.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    Ok(docs)
}

/// Read one file into a [`SourceDocument`]. `Ok(None)` for files with no
/// usable text.
fn read_document(path: &Path, relative_path: &str) -> Result<Option<SourceDocument>, String> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let content_type = extract::content_type_for(&extension);

    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let body = if extract::is_binary(content_type) {
        extract::extract_text(&bytes, content_type).map_err(|e| e.to_string())?
    } else {
        String::from_utf8(bytes).map_err(|_| "file is not valid UTF-8".to_string())?
    };

    if body.trim().is_empty() {
        return Ok(None);
    }

    let modified_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let title = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| relative_path.to_string());

    Ok(Some(SourceDocument {
        source_id: relative_path.to_string(),
        title,
        content_type: content_type.to_string(),
        body,
        modified_at,
    }))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IndexError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| IndexError::build(format!("invalid corpus glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| IndexError::build(format!("invalid corpus globs: {}", e)))
}
