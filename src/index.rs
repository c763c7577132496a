//! Document index store: build-or-load of the persisted vector index.
//!
//! [`ensure_index`] runs once at startup. When the persist directory is
//! absent it scans the corpus, chunks and embeds every document, and writes
//! the result to SQLite; when the directory exists it loads the index from
//! there without touching the corpus.
//!
//! ```text
//! persist_dir exists? ──no──▶ scan corpus ─▶ chunk ─▶ embed ─▶ write <dir>.partial ─▶ rename
//!         │
//!        yes
//!         ▼
//!   open index.sqlite ─▶ check manifest (schema, model, dims) ─▶ read chunks + vectors
//! ```
//!
//! A build is written to a sibling `.partial` directory and renamed into
//! place only once complete, so the persist directory existing always means
//! a finished index. The loaded [`VectorIndex`] is immutable; rebuilding
//! requires deleting the persist directory (see [`rebuild_index`]).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::connector_fs::scan_corpus;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, embed_batched, vec_to_blob, EmbeddingProvider};
use crate::error::IndexError;
use crate::migrate::{run_migrations, SCHEMA_VERSION};
use crate::models::RetrievedChunk;

/// Facts about how an index was built, stored alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexManifest {
    pub schema_version: i64,
    pub embedding_model: String,
    pub dims: usize,
    pub max_tokens: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    id: String,
    source_id: String,
    title: String,
    content_type: String,
    modified_at: i64,
    body: String,
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    id: String,
    document_id: String,
    source_id: String,
    chunk_index: i64,
    text: String,
    hash: String,
    vector: Vec<f32>,
}

/// An immutable, fully constructed vector index.
#[derive(Debug)]
pub struct VectorIndex {
    manifest: IndexManifest,
    documents: Vec<IndexedDocument>,
    chunks: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Brute-force nearest-neighbor search.
    ///
    /// Returns at most `top_k` chunks whose cosine similarity to
    /// `query_vec` is at least `threshold`, best first. Ties keep corpus
    /// order, so results are deterministic.
    pub fn nearest(&self, query_vec: &[f32], top_k: usize, threshold: f32) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine_similarity(query_vec, &c.vector)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, score)| {
                let c = &self.chunks[i];
                RetrievedChunk {
                    chunk_id: c.id.clone(),
                    source_id: c.source_id.clone(),
                    text: c.text.clone(),
                    score,
                }
            })
            .collect()
    }
}

/// Load the index from `config.index.persist_dir` if it exists, otherwise
/// build it from `config.corpus` and persist it there.
pub async fn ensure_index(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorIndex, IndexError> {
    let persist_dir = &config.index.persist_dir;

    if persist_dir.exists() {
        info!(path = %persist_dir.display(), "loading persisted index");
        let index = load_index(persist_dir, embedder).await?;
        info!(
            documents = index.document_count(),
            chunks = index.chunk_count(),
            model = %index.manifest.embedding_model,
            "index loaded"
        );
        return Ok(index);
    }

    info!(
        corpus = %config.corpus.root.display(),
        path = %persist_dir.display(),
        "no persisted index found, building"
    );
    let index = build_index(config, embedder).await?;
    persist_index(&index, persist_dir).await?;
    info!(
        documents = index.document_count(),
        chunks = index.chunk_count(),
        "index built and persisted"
    );
    Ok(index)
}

/// Delete the persisted index (if any) and build a fresh one.
pub async fn rebuild_index(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorIndex, IndexError> {
    let persist_dir = &config.index.persist_dir;
    if persist_dir.exists() {
        warn!(path = %persist_dir.display(), "removing persisted index for rebuild");
        std::fs::remove_dir_all(persist_dir).map_err(|e| {
            IndexError::build(format!("failed to remove {}: {}", persist_dir.display(), e))
        })?;
    }
    ensure_index(config, embedder).await
}

/// Build an index in memory from the configured corpus.
pub async fn build_index(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorIndex, IndexError> {
    let sources = scan_corpus(&config.corpus)?;
    if sources.is_empty() {
        return Err(IndexError::build(format!(
            "corpus {} contains no readable documents",
            config.corpus.root.display()
        )));
    }

    let mut documents = Vec::with_capacity(sources.len());
    let mut pending = Vec::new();

    for source in sources {
        let doc_id = Uuid::new_v4().to_string();
        for chunk in chunk_text(&doc_id, &source.body, config.chunking.max_tokens) {
            pending.push((source.source_id.clone(), chunk));
        }
        documents.push(IndexedDocument {
            id: doc_id,
            source_id: source.source_id,
            title: source.title,
            content_type: source.content_type,
            modified_at: source.modified_at.timestamp(),
            body: source.body,
        });
    }

    let texts: Vec<String> = pending.iter().map(|(_, c)| c.text.clone()).collect();
    let vectors = embed_batched(embedder, &texts, config.embedding.batch_size)
        .await
        .map_err(|e| IndexError::build(format!("embedding corpus failed: {}", e)))?;

    let chunks: Vec<IndexedChunk> = pending
        .into_iter()
        .zip(vectors)
        .map(|((source_id, chunk), vector)| IndexedChunk {
            id: chunk.id,
            document_id: chunk.document_id,
            source_id,
            chunk_index: chunk.chunk_index,
            text: chunk.text,
            hash: chunk.hash,
            vector,
        })
        .collect();

    let manifest = IndexManifest {
        schema_version: SCHEMA_VERSION,
        embedding_model: embedder.model_name().to_string(),
        dims: embedder.dims(),
        max_tokens: config.chunking.max_tokens,
        document_count: documents.len(),
        chunk_count: chunks.len(),
        built_at: Utc::now(),
    };

    Ok(VectorIndex {
        manifest,
        documents,
        chunks,
    })
}

/// Write `index` to `persist_dir`, which must not exist yet.
pub async fn persist_index(index: &VectorIndex, persist_dir: &Path) -> Result<(), IndexError> {
    let staging = staging_dir(persist_dir);
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| {
            IndexError::build(format!("failed to clear {}: {}", staging.display(), e))
        })?;
    }

    let written = write_index(index, &staging).await;
    let result = written.and_then(|_| {
        std::fs::rename(&staging, persist_dir).map_err(|e| {
            IndexError::build(format!(
                "failed to move index into {}: {}",
                persist_dir.display(),
                e
            ))
        })
    });

    if result.is_err() && staging.exists() {
        if let Err(e) = std::fs::remove_dir_all(&staging) {
            warn!(path = %staging.display(), error = %e, "failed to clean up partial index");
        }
    }
    result
}

fn staging_dir(persist_dir: &Path) -> PathBuf {
    let mut name = persist_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    persist_dir.with_file_name(name)
}

async fn write_index(index: &VectorIndex, dir: &Path) -> Result<(), IndexError> {
    let write_err = |e: sqlx::Error| IndexError::build(format!("failed to persist index: {}", e));

    let pool = db::create(dir).await.map_err(write_err)?;
    run_migrations(&pool).await.map_err(write_err)?;

    let mut tx = pool.begin().await.map_err(write_err)?;

    let m = &index.manifest;
    let entries = [
        ("schema_version", m.schema_version.to_string()),
        ("embedding_model", m.embedding_model.clone()),
        ("dims", m.dims.to_string()),
        ("max_tokens", m.max_tokens.to_string()),
        ("document_count", m.document_count.to_string()),
        ("chunk_count", m.chunk_count.to_string()),
        ("built_at", m.built_at.to_rfc3339()),
    ];
    for (key, value) in entries {
        sqlx::query("INSERT INTO manifest (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
    }

    for doc in &index.documents {
        sqlx::query(
            "INSERT INTO documents (id, source_id, title, content_type, modified_at, body) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.source_id)
        .bind(&doc.title)
        .bind(&doc.content_type)
        .bind(doc.modified_at)
        .bind(&doc.body)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;
    }

    for chunk in &index.chunks {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        sqlx::query("INSERT INTO embeddings (chunk_id, dims, vector) VALUES (?, ?, ?)")
            .bind(&chunk.id)
            .bind(chunk.vector.len() as i64)
            .bind(vec_to_blob(&chunk.vector))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
    }

    tx.commit().await.map_err(write_err)?;
    pool.close().await;
    Ok(())
}

/// Load a persisted index, checking it against the active embedder.
pub async fn load_index(
    persist_dir: &Path,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorIndex, IndexError> {
    let load_err = |message: String| IndexError::load(persist_dir, message);

    if !db::index_file(persist_dir).is_file() {
        return Err(load_err(format!(
            "{} is missing; delete the directory to rebuild",
            db::INDEX_FILE
        )));
    }

    let pool = db::open_existing(persist_dir)
        .await
        .map_err(|e| load_err(format!("cannot open index: {}", e)))?;

    let loaded = read_index(&pool, persist_dir, embedder).await;
    pool.close().await;
    loaded
}

async fn read_index(
    pool: &SqlitePool,
    persist_dir: &Path,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorIndex, IndexError> {
    let load_err = |message: String| IndexError::load(persist_dir, message);
    let sql_err = |e: sqlx::Error| IndexError::load(persist_dir, format!("corrupt index: {}", e));

    let rows = sqlx::query("SELECT key, value FROM manifest")
        .fetch_all(pool)
        .await
        .map_err(sql_err)?;
    let mut entries: HashMap<String, String> = HashMap::new();
    for row in rows {
        entries.insert(
            row.try_get("key").map_err(sql_err)?,
            row.try_get("value").map_err(sql_err)?,
        );
    }
    let manifest = parse_manifest(&entries).map_err(load_err)?;

    if manifest.schema_version != SCHEMA_VERSION {
        return Err(load_err(format!(
            "index schema version {} is not supported (expected {})",
            manifest.schema_version, SCHEMA_VERSION
        )));
    }
    if manifest.embedding_model != embedder.model_name() || manifest.dims != embedder.dims() {
        return Err(load_err(format!(
            "index was built with {} ({} dims) but the configured embedder is {} ({} dims); \
             delete the directory to rebuild",
            manifest.embedding_model,
            manifest.dims,
            embedder.model_name(),
            embedder.dims()
        )));
    }

    let doc_rows = sqlx::query(
        "SELECT id, source_id, title, content_type, modified_at, body \
         FROM documents ORDER BY source_id",
    )
    .fetch_all(pool)
    .await
    .map_err(sql_err)?;

    let mut documents = Vec::with_capacity(doc_rows.len());
    for row in doc_rows {
        documents.push(IndexedDocument {
            id: row.try_get("id").map_err(sql_err)?,
            source_id: row.try_get("source_id").map_err(sql_err)?,
            title: row.try_get("title").map_err(sql_err)?,
            content_type: row.try_get("content_type").map_err(sql_err)?,
            modified_at: row.try_get("modified_at").map_err(sql_err)?,
            body: row.try_get("body").map_err(sql_err)?,
        });
    }

    let chunk_rows = sqlx::query(
        "SELECT c.id, c.document_id, d.source_id, c.chunk_index, c.text, c.hash, e.vector \
         FROM chunks c \
         JOIN documents d ON d.id = c.document_id \
         JOIN embeddings e ON e.chunk_id = c.id \
         ORDER BY d.source_id, c.chunk_index",
    )
    .fetch_all(pool)
    .await
    .map_err(sql_err)?;

    let mut chunks = Vec::with_capacity(chunk_rows.len());
    for row in chunk_rows {
        let id: String = row.try_get("id").map_err(sql_err)?;
        let text: String = row.try_get("text").map_err(sql_err)?;
        let hash: String = row.try_get("hash").map_err(sql_err)?;
        let blob: Vec<u8> = row.try_get("vector").map_err(sql_err)?;

        let vector = blob_to_vec(&blob)
            .filter(|v| v.len() == manifest.dims)
            .ok_or_else(|| load_err(format!("chunk {} has a malformed vector", id)))?;
        if sha256_hex(&text) != hash {
            return Err(load_err(format!("chunk {} text does not match its hash", id)));
        }

        chunks.push(IndexedChunk {
            id,
            document_id: row.try_get("document_id").map_err(sql_err)?,
            source_id: row.try_get("source_id").map_err(sql_err)?,
            chunk_index: row.try_get("chunk_index").map_err(sql_err)?,
            text,
            hash,
            vector,
        });
    }

    if chunks.is_empty() {
        return Err(load_err("index contains no chunks".to_string()));
    }
    if chunks.len() != manifest.chunk_count || documents.len() != manifest.document_count {
        return Err(load_err(format!(
            "manifest lists {} documents / {} chunks but {} / {} were found",
            manifest.document_count,
            manifest.chunk_count,
            documents.len(),
            chunks.len()
        )));
    }

    Ok(VectorIndex {
        manifest,
        documents,
        chunks,
    })
}

fn parse_manifest(entries: &HashMap<String, String>) -> Result<IndexManifest, String> {
    fn field<'a>(entries: &'a HashMap<String, String>, key: &str) -> Result<&'a str, String> {
        entries
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| format!("manifest is missing '{}'", key))
    }
    fn number<T: std::str::FromStr>(entries: &HashMap<String, String>, key: &str) -> Result<T, String> {
        field(entries, key)?
            .parse()
            .map_err(|_| format!("manifest field '{}' is not a number", key))
    }

    let built_at = DateTime::parse_from_rfc3339(field(entries, "built_at")?)
        .map_err(|_| "manifest field 'built_at' is not a timestamp".to_string())?
        .with_timezone(&Utc);

    Ok(IndexManifest {
        schema_version: number(entries, "schema_version")?,
        embedding_model: field(entries, "embedding_model")?.to_string(),
        dims: number(entries, "dims")?,
        max_tokens: number(entries, "max_tokens")?,
        document_count: number(entries, "document_count")?,
        chunk_count: number(entries, "chunk_count")?,
        built_at,
    })
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
