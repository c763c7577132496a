use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};

/// File name of the index database inside the persist directory.
pub const INDEX_FILE: &str = "index.sqlite";

pub fn index_file(persist_dir: &Path) -> PathBuf {
    persist_dir.join(INDEX_FILE)
}

/// Open (creating if needed) the index database for writing a fresh build.
pub async fn create(persist_dir: &Path) -> Result<SqlitePool, sqlx::Error> {
    std::fs::create_dir_all(persist_dir)?;

    let options = SqliteConnectOptions::new()
        .filename(index_file(persist_dir))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// Open an existing index database read-only.
pub async fn open_existing(persist_dir: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(index_file(persist_dir))
        .create_if_missing(false)
        .read_only(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}
