//! SQLite-backed [`IndexStore`].
//!
//! The persist directory holds a single `index.sqlite` database:
//!
//! ```text
//! manifest(key TEXT PRIMARY KEY, value TEXT)
//! entries(position INTEGER PRIMARY KEY, id TEXT, text TEXT,
//!         metadata_json TEXT, embedding BLOB)
//! ```
//!
//! Vectors are little-endian `f32` BLOBs. A publish writes a complete
//! database into a sibling staging directory `<persist>.building-<uuid>`,
//! closes it, and only then swaps it into place. An interrupted publish
//! leaves either the previous index, no index, or a stray staging
//! directory, never a half-written `index.sqlite`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use rag_harness_core::embedding::{blob_to_vec, vec_to_blob};
use rag_harness_core::error::RetrievalError;
use rag_harness_core::models::{IndexEntry, IndexManifest, SourceMetadata};
use rag_harness_core::store::{IndexStore, StoredIndex};

/// Database file name inside the persist directory.
pub const INDEX_DB_FILE: &str = "index.sqlite";

const STAGING_MARKER: &str = ".building-";

pub struct SqliteIndexStore {
    persist_dir: PathBuf,
}

impl SqliteIndexStore {
    pub fn new(persist_dir: impl Into<PathBuf>) -> Self {
        Self {
            persist_dir: persist_dir.into(),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.persist_dir.join(INDEX_DB_FILE)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.persist_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn dir_name(&self) -> String {
        self.persist_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "vectors".to_string())
    }

    fn staging_dir(&self) -> PathBuf {
        self.parent_dir().join(format!(
            "{}{}{}",
            self.dir_name(),
            STAGING_MARKER,
            Uuid::new_v4()
        ))
    }

    /// Remove staging directories left behind by interrupted publishes.
    fn remove_stale_staging(&self) {
        let prefix = format!("{}{}", self.dir_name(), STAGING_MARKER);
        let Ok(read_dir) = std::fs::read_dir(self.parent_dir()) else {
            return;
        };
        for entry in read_dir.flatten() {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                debug!(path = %entry.path().display(), "removing stale staging directory");
                let _ = std::fs::remove_dir_all(entry.path());
            }
        }
    }

    async fn publish_inner(&self, manifest: &IndexManifest, entries: &[IndexEntry]) -> Result<()> {
        self.remove_stale_staging();
        std::fs::create_dir_all(self.parent_dir())
            .with_context(|| format!("Failed to create {}", self.parent_dir().display()))?;

        let staging = self.staging_dir();
        std::fs::create_dir_all(&staging)
            .with_context(|| format!("Failed to create {}", staging.display()))?;

        if let Err(e) = write_database(&staging.join(INDEX_DB_FILE), manifest, entries).await {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }

        if self.persist_dir.exists() {
            std::fs::remove_dir_all(&self.persist_dir).with_context(|| {
                format!("Failed to remove old index at {}", self.persist_dir.display())
            })?;
        }
        std::fs::rename(&staging, &self.persist_dir).with_context(|| {
            format!(
                "Failed to move {} to {}",
                staging.display(),
                self.persist_dir.display()
            )
        })?;

        Ok(())
    }

    async fn open_inner(&self) -> Result<StoredIndex> {
        let pool = connect(&self.db_path(), false).await?;
        let result = read_database(&pool).await;
        pool.close().await;
        result
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    fn label(&self) -> &str {
        "sqlite"
    }

    fn location(&self) -> String {
        self.persist_dir.display().to_string()
    }

    async fn publish(
        &self,
        manifest: &IndexManifest,
        entries: &[IndexEntry],
    ) -> Result<(), RetrievalError> {
        self.publish_inner(manifest, entries)
            .await
            .map_err(|e| RetrievalError::Store(format!("{:#}", e)))
    }

    async fn open(&self) -> Result<Option<StoredIndex>, RetrievalError> {
        if !self.persist_dir.exists() {
            return Ok(None);
        }
        if !self.db_path().is_file() {
            if self.file_count() == 0 {
                return Ok(None);
            }
            return Err(RetrievalError::IndexCorruption(format!(
                "{} holds files but no {}",
                self.persist_dir.display(),
                INDEX_DB_FILE
            )));
        }

        self.open_inner()
            .await
            .map(Some)
            .map_err(|e| RetrievalError::IndexCorruption(format!("{:#}", e)))
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        self.remove_stale_staging();
        if self.persist_dir.exists() {
            std::fs::remove_dir_all(&self.persist_dir).map_err(|e| {
                RetrievalError::Store(format!(
                    "Failed to remove {}: {}",
                    self.persist_dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    fn file_count(&self) -> usize {
        WalkDir::new(&self.persist_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count()
    }
}

async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    Ok(pool)
}

async fn write_database(
    db_path: &Path,
    manifest: &IndexManifest,
    entries: &[IndexEntry],
) -> Result<()> {
    let pool = connect(db_path, true).await?;

    sqlx::query("CREATE TABLE manifest (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .execute(&pool)
        .await?;
    sqlx::query(
        r#"
        CREATE TABLE entries (
            position INTEGER PRIMARY KEY,
            id TEXT NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    let mut tx = pool.begin().await?;

    let manifest_rows = [
        ("format_version", manifest.format_version.to_string()),
        ("model", manifest.model.clone()),
        ("dims", manifest.dims.to_string()),
        ("entry_count", manifest.entry_count.to_string()),
        ("built_at", manifest.built_at.clone()),
    ];
    for (key, value) in manifest_rows {
        sqlx::query("INSERT INTO manifest (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    for (position, entry) in entries.iter().enumerate() {
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        sqlx::query(
            "INSERT INTO entries (position, id, text, metadata_json, embedding) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(position as i64)
        .bind(&entry.id)
        .bind(&entry.text)
        .bind(metadata_json)
        .bind(vec_to_blob(&entry.vector))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    pool.close().await;
    Ok(())
}

async fn read_database(pool: &SqlitePool) -> Result<StoredIndex> {
    let rows = sqlx::query("SELECT key, value FROM manifest")
        .fetch_all(pool)
        .await?;
    let values: HashMap<String, String> = rows
        .iter()
        .map(|row| (row.get::<String, _>("key"), row.get::<String, _>("value")))
        .collect();

    let field = |key: &str| {
        values
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("manifest is missing '{}'", key))
    };
    let manifest = IndexManifest {
        format_version: field("format_version")?
            .parse()
            .context("manifest format_version is not a number")?,
        model: field("model")?,
        dims: field("dims")?.parse().context("manifest dims is not a number")?,
        entry_count: field("entry_count")?
            .parse()
            .context("manifest entry_count is not a number")?,
        built_at: field("built_at")?,
    };

    let rows = sqlx::query(
        "SELECT id, text, metadata_json, embedding FROM entries ORDER BY position",
    )
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: String = row.get("id");
        let metadata_json: String = row.get("metadata_json");
        let blob: Vec<u8> = row.get("embedding");

        let metadata: SourceMetadata = serde_json::from_str(&metadata_json)
            .with_context(|| format!("entry {} has invalid metadata", id))?;
        let Some(vector) = blob_to_vec(&blob) else {
            warn!(entry = %id, bytes = blob.len(), "truncated embedding blob");
            anyhow::bail!("entry {} has a truncated embedding", id);
        };

        entries.push(IndexEntry {
            id,
            vector,
            text: row.get("text"),
            metadata,
        });
    }

    Ok((manifest, entries))
}
