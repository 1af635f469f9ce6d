//! Local verse storage using SQLite
//!
//! This module owns the on-disk copy of downloaded translations:
//! - Schema creation (idempotent, safe on every start)
//! - Chapter reads as ordered verse maps
//! - Atomic chapter replacement (one transaction per chapter)
//! - Per-translation aggregation for availability checks

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{BookDescriptor, Chapter, TranslationSummary, Verse};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Verse store handle.
///
/// Cloning is cheap; clones share the pool and the write lock. Writes are
/// serialized through the lock so two chapter replacements never interleave,
/// while reads go straight to the pool and never wait on an import.
#[derive(Clone)]
pub struct VerseStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl VerseStore {
    /// Connect to the verse store configured in `config` and make sure the schema exists
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Open (creating if needed) a verse store at `db_path` and initialize it
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StorageInit(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::StorageInit(format!("{}: {}", db_path.display(), e)))?;

        let store = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Create the verse table and lookup index if they are missing
    pub async fn initialize(&self) -> Result<()> {
        debug!("Initializing verse store schema");
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StorageInit(e.to_string()))?;
        Ok(())
    }

    /// True if at least one verse of `translation` is stored.
    ///
    /// This says nothing about completeness; see [`crate::availability`].
    pub async fn has_translation(&self, translation: &str) -> Result<bool> {
        let hit: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM verses WHERE translation = ? LIMIT 1")
                .bind(translation)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hit.is_some())
    }

    /// Read one chapter; `None` when no verses are stored for it
    pub async fn get_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
    ) -> Result<Option<Chapter>> {
        let rows: Vec<(u32, String)> = sqlx::query_as(
            r#"
            SELECT verse, text FROM verses
            WHERE translation = ? AND book = ? AND chapter = ?
            ORDER BY verse
            "#,
        )
        .bind(translation)
        .bind(book)
        .bind(chapter)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(Chapter::from_verses(rows)))
    }

    /// Books stored for a translation with the highest chapter downloaded for each.
    ///
    /// Books come back in the order they were first written. After a wiping
    /// import that is the remote's book order. Rewriting a chapter keeps its
    /// surviving rows, so later write-backs do not reorder books; a book whose
    /// every verse gets replaced by new verse numbers does move to the end.
    pub async fn list_books(&self, translation: &str) -> Result<Vec<BookDescriptor>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT book, MAX(chapter) FROM verses
            WHERE translation = ?
            GROUP BY book
            ORDER BY MIN(rowid)
            "#,
        )
        .bind(translation)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, max_chapter)| BookDescriptor::new(name, max_chapter.max(0) as u32))
            .collect())
    }

    /// Replace every verse of one chapter atomically.
    ///
    /// Either the whole new verse set is committed or the chapter keeps exactly
    /// what it had before the call. Verses missing from `verses` are deleted and
    /// the rest are upserted in place.
    pub async fn write_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
        verses: &Chapter,
    ) -> Result<()> {
        if chapter == 0 {
            return Err(Error::InvalidPayload(format!(
                "{} {}: chapter numbers start at 1",
                translation, book
            )));
        }

        let keep = serde_json::to_string(&verses.verses.keys().collect::<Vec<_>>())?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM verses
            WHERE translation = ? AND book = ? AND chapter = ?
              AND verse NOT IN (SELECT value FROM json_each(?))
            "#,
        )
        .bind(translation)
        .bind(book)
        .bind(chapter)
        .bind(&keep)
        .execute(&mut *tx)
        .await?;

        for (verse, text) in verses.iter() {
            sqlx::query(
                r#"
                INSERT INTO verses (translation, book, chapter, verse, text)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (translation, book, chapter, verse) DO UPDATE SET text = excluded.text
                "#,
            )
            .bind(translation)
            .bind(book)
            .bind(chapter)
            .bind(verse)
            .bind(text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            translation,
            book,
            chapter,
            verses = verses.len(),
            "Chapter written"
        );
        Ok(())
    }

    /// Delete every verse of a translation, returning the number of rows removed
    pub async fn wipe_translation(&self, translation: &str) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM verses WHERE translation = ?")
            .bind(translation)
            .execute(&self.pool)
            .await?;
        info!(
            translation,
            rows = result.rows_affected(),
            "Wiped local translation"
        );
        Ok(result.rows_affected())
    }

    /// Number of verses stored for a translation
    pub async fn verse_count(&self, translation: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verses WHERE translation = ?")
            .bind(translation)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Every translation with at least one stored verse
    pub async fn list_translations(&self) -> Result<Vec<TranslationSummary>> {
        let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT v.translation, COUNT(DISTINCT v.book), c.chapters, COUNT(*)
            FROM verses v
            JOIN (
                SELECT translation, COUNT(*) AS chapters
                FROM (SELECT DISTINCT translation, book, chapter FROM verses)
                GROUP BY translation
            ) c ON c.translation = v.translation
            GROUP BY v.translation
            ORDER BY v.translation
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(translation, books, chapters, verses)| TranslationSummary {
                translation,
                book_count: books.max(0) as u32,
                chapter_count: chapters.max(0) as u32,
                verse_count: verses.max(0) as u32,
            })
            .collect())
    }

    /// Content hash over every stored verse of a translation, in key order.
    ///
    /// Two stores holding the same verse set produce the same digest.
    pub async fn translation_digest(&self, translation: &str) -> Result<String> {
        let rows = sqlx::query_as::<_, Verse>(
            r#"
            SELECT translation, book, chapter, verse, text FROM verses
            WHERE translation = ?
            ORDER BY book, chapter, verse
            "#,
        )
        .bind(translation)
        .fetch_all(&self.pool)
        .await?;

        let mut hasher = blake3::Hasher::new();
        for row in &rows {
            hasher.update(row.book.as_bytes());
            hasher.update(&[0]);
            hasher.update(&row.chapter.to_le_bytes());
            hasher.update(&row.verse.to_le_bytes());
            hasher.update(row.text.as_bytes());
            hasher.update(&[0]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}
