//! Full-translation download into the local verse store
//!
//! A run walks the remote book list in order and every chapter in ascending
//! order, one fetch and one store transaction per chapter. The store therefore
//! only ever holds whole chapters, and an interrupted run leaves a usable
//! prefix behind.
//!
//! Run states: `Idle -> InitializingStore -> FetchingBookList ->
//! ImportingBooks -> Finalizing -> Completed | Failed | Cancelled`.

mod retry;

pub use retry::*;

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::models::{BookDescriptor, Chapter, ChapterKey};
use crate::progress::{process_label, ProgressSink, SetupProgress, StepId};
use crate::remote::ScriptureSource;
use crate::store::VerseStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Import run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    InitializingStore,
    FetchingBookList,
    ImportingBooks,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::InitializingStore => "initializing_store",
            RunState::FetchingBookList => "fetching_book_list",
            RunState::ImportingBooks => "importing_books",
            RunState::Finalizing => "finalizing",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Cooperative cancellation flag, checked between chapters
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// True while another clone of this token is alive
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.0) > 1
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub retry: RetryPolicy,
    /// Remove every stored verse of the translation once the book list is in,
    /// before the first chapter is written
    pub wipe_before_import: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            retry: RetryPolicy::from(config),
            wipe_before_import: config.wipe_before_import,
        }
    }
}

/// Outcome of a completed import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub translation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub books: Vec<BookDescriptor>,
    pub chapters_written: u32,
    /// Chapters the remote listed but could not serve
    pub chapters_skipped: Vec<ChapterKey>,
    pub verses_written: u64,
    /// Verses stored for the translation once the run finished
    pub verses_stored: u64,
    pub retries: u32,
}

impl ImportReport {
    fn new(translation: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            translation: translation.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            books: Vec::new(),
            chapters_written: 0,
            chapters_skipped: Vec::new(),
            verses_written: 0,
            verses_stored: 0,
            retries: 0,
        }
    }
}

/// Drives full-translation downloads.
///
/// Cloning shares run bookkeeping, so a clone sees and respects runs started
/// through the original.
#[derive(Clone)]
pub struct ImportEngine {
    store: VerseStore,
    source: Arc<dyn ScriptureSource>,
    options: ImportOptions,
    states: Arc<Mutex<HashMap<String, RunState>>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Releases the per-translation run slot on every exit path
struct RunSlot {
    in_flight: Arc<Mutex<HashSet<String>>>,
    translation: String,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.translation);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ImportEngine {
    pub fn new(store: VerseStore, source: Arc<dyn ScriptureSource>, options: ImportOptions) -> Self {
        Self {
            store,
            source,
            options,
            states: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Current or last state of runs for `translation`
    pub fn state(&self, translation: &str) -> RunState {
        lock(&self.states)
            .get(translation)
            .copied()
            .unwrap_or(RunState::Idle)
    }

    pub fn is_running(&self, translation: &str) -> bool {
        lock(&self.in_flight).contains(translation)
    }

    fn set_state(&self, translation: &str, state: RunState) {
        debug!(translation, %state, "Import state");
        lock(&self.states).insert(translation.to_string(), state);
    }

    fn claim(&self, translation: &str) -> Result<RunSlot> {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight.insert(translation.to_string()) {
            return Err(Error::ImportInProgress(translation.to_string()));
        }
        Ok(RunSlot {
            in_flight: Arc::clone(&self.in_flight),
            translation: translation.to_string(),
        })
    }

    /// Download every chapter of `translation` into the local store.
    ///
    /// Progress goes to `sink`. Returns the run report on success. Fatal
    /// failures come back as the classified error with the step that was
    /// loading marked `error`; a cancelled run returns
    /// [`Error::ImportCancelled`]. A second call for a translation that is
    /// already importing is rejected with [`Error::ImportInProgress`].
    pub async fn download_and_install(
        &self,
        translation: &str,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<ImportReport> {
        let _slot = self.claim(translation)?;

        let mut report = ImportReport::new(translation);
        let mut progress = SetupProgress::new(sink);
        info!(translation, run_id = %report.run_id, "Starting import");

        match self.run(translation, &mut progress, cancel, &mut report).await {
            Ok(()) => {
                self.set_state(translation, RunState::Completed);
                info!(
                    translation,
                    chapters = report.chapters_written,
                    skipped = report.chapters_skipped.len(),
                    verses = report.verses_stored,
                    retries = report.retries,
                    "Import completed"
                );
                Ok(report)
            }
            Err(Error::ImportCancelled(t)) => {
                // Back to pending: the step neither finished nor broke
                if let Some(step) = progress.current() {
                    progress.reset(step);
                }
                self.set_state(translation, RunState::Cancelled);
                info!(
                    translation,
                    chapters = report.chapters_written,
                    "Import cancelled"
                );
                Err(Error::ImportCancelled(t))
            }
            Err(e) => {
                if let Some(step) = progress.current() {
                    progress.fail(step);
                }
                self.set_state(translation, RunState::Failed);
                warn!(translation, "Import failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        translation: &str,
        progress: &mut SetupProgress<'_>,
        cancel: &CancelToken,
        report: &mut ImportReport,
    ) -> Result<()> {
        // db
        self.set_state(translation, RunState::InitializingStore);
        progress.start(StepId::Db);
        self.store.initialize().await?;
        progress.complete(StepId::Db);
        check_cancelled(cancel, translation)?;

        // download
        self.set_state(translation, RunState::FetchingBookList);
        progress.start(StepId::Download);
        let books = self.source.fetch_book_list(translation).await?;
        info!(translation, books = books.len(), "Fetched book list");
        report.books = books.clone();

        // Only drop the old copy once the remote has answered
        check_cancelled(cancel, translation)?;
        if self.options.wipe_before_import {
            self.store.wipe_translation(translation).await?;
        }
        progress.complete(StepId::Download);

        // process
        self.set_state(translation, RunState::ImportingBooks);
        progress.start(StepId::Process);
        progress.set_label(StepId::Process, process_label(0, books.len()));

        for (index, book) in books.iter().enumerate() {
            debug!(translation, book = %book.name, chapters = book.chapter_count, "Importing book");

            for chapter in 1..=book.chapter_count {
                check_cancelled(cancel, translation)?;
                self.import_chapter(translation, &book.name, chapter, cancel, report)
                    .await?;

                let books_completed = if chapter == book.chapter_count {
                    index + 1
                } else {
                    index
                };
                progress.set_label(StepId::Process, process_label(books_completed, books.len()));
            }

            progress.set_label(StepId::Process, process_label(index + 1, books.len()));
        }
        progress.complete(StepId::Process);

        // finalize
        self.set_state(translation, RunState::Finalizing);
        progress.start(StepId::Finalize);
        report.verses_stored = self.store.verse_count(translation).await?;
        if self.options.wipe_before_import && report.verses_stored != report.verses_written {
            warn!(
                translation,
                written = report.verses_written,
                stored = report.verses_stored,
                "Stored verse count differs from verses written"
            );
        }
        report.finished_at = Some(Utc::now());
        progress.complete(StepId::Finalize);

        Ok(())
    }

    /// Fetch one chapter (retrying transport failures) and commit it
    async fn import_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
        cancel: &CancelToken,
        report: &mut ImportReport,
    ) -> Result<()> {
        match self
            .fetch_with_retry(translation, book, chapter, cancel, report)
            .await
        {
            Ok(verses) if verses.is_empty() => {
                warn!(translation, book, chapter, "Remote returned no verses, skipping chapter");
                report
                    .chapters_skipped
                    .push(ChapterKey::new(translation, book, chapter));
                Ok(())
            }
            Ok(verses) => {
                self.store
                    .write_chapter(translation, book, chapter, &verses)
                    .await?;
                report.chapters_written += 1;
                report.verses_written += verses.len() as u64;
                Ok(())
            }
            Err(Error::NotFound(what)) => {
                warn!(translation, book, chapter, "Chapter missing on remote, skipping: {}", what);
                report
                    .chapters_skipped
                    .push(ChapterKey::new(translation, book, chapter));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_with_retry(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
        cancel: &CancelToken,
        report: &mut ImportReport,
    ) -> Result<Chapter> {
        let policy = self.options.retry;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.source.fetch_chapter(translation, book, chapter).await {
                Ok(verses) => return Ok(verses),
                Err(e) if e.is_retryable() && policy.allows_another(attempts) => {
                    let delay = policy.backoff(attempts);
                    warn!(
                        translation,
                        book,
                        chapter,
                        attempt = attempts,
                        "Fetch failed ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    report.retries += 1;
                    tokio::time::sleep(delay).await;
                    check_cancelled(cancel, translation)?;
                }
                Err(Error::Network(msg)) => {
                    return Err(Error::Network(format!(
                        "{} (gave up after {} attempts)",
                        msg, attempts
                    )))
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn check_cancelled(cancel: &CancelToken, translation: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::ImportCancelled(translation.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{all_completed, NoopSink, SetupStep, StepStatus};
    use crate::test_support::{sample_chapter, temp_store, Failure, FixtureSource};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        snapshots: Mutex<Vec<Vec<SetupStep>>>,
    }

    impl Recorder {
        fn last(&self) -> Vec<SetupStep> {
            self.snapshots.lock().unwrap().last().cloned().unwrap()
        }

        fn status(&self, id: StepId) -> StepStatus {
            self.last().iter().find(|s| s.id == id).unwrap().status
        }

        fn process_labels(&self) -> Vec<String> {
            let mut labels: Vec<String> = self
                .snapshots
                .lock()
                .unwrap()
                .iter()
                .map(|steps| steps[2].label.clone())
                .collect();
            labels.dedup();
            labels
        }
    }

    impl ProgressSink for Recorder {
        fn on_progress(&self, steps: &[SetupStep]) {
            self.snapshots.lock().unwrap().push(steps.to_vec());
        }
    }

    fn fast_options() -> ImportOptions {
        ImportOptions {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
            wipe_before_import: true,
        }
    }

    fn engine(store: &VerseStore, source: &Arc<FixtureSource>) -> ImportEngine {
        let source: Arc<dyn ScriptureSource> = source.clone();
        ImportEngine::new(store.clone(), source, fast_options())
    }

    #[tokio::test]
    async fn test_full_import_writes_every_chapter() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 3), ("Exodus", 2)]));
        let recorder = Recorder::default();

        let report = engine(&store, &source)
            .download_and_install("KJV", &recorder, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.chapters_written, 5);
        assert_eq!(report.verses_written, 15);
        assert_eq!(report.verses_stored, 15);
        assert!(report.chapters_skipped.is_empty());
        assert!(report.finished_at.is_some());
        assert!(all_completed(&recorder.last()));

        for (book, chapter) in [("Genesis", 1), ("Genesis", 3), ("Exodus", 2)] {
            assert_eq!(
                store.get_chapter("KJV", book, chapter).await.unwrap(),
                Some(sample_chapter(book, chapter))
            );
        }
    }

    #[tokio::test]
    async fn test_progress_labels_are_monotonic() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[
            ("Genesis", 2),
            ("Exodus", 1),
            ("Leviticus", 1),
            ("Numbers", 1),
        ]));
        let recorder = Recorder::default();

        engine(&store, &source)
            .download_and_install("KJV", &recorder, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            recorder.process_labels(),
            vec![
                "Installing scripture".to_string(),
                "Installing scripture (0%)".to_string(),
                "Installing scripture (25%)".to_string(),
                "Installing scripture (50%)".to_string(),
                "Installing scripture (75%)".to_string(),
                "Installing scripture (100%)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_long_book_emits_only_on_percentage_changes() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Psalms", 40)]));
        let recorder = Recorder::default();

        engine(&store, &source)
            .download_and_install("KJV", &recorder, &CancelToken::new())
            .await
            .unwrap();

        // initial + 2 per step + the "0%" and "100%" labels
        assert_eq!(recorder.snapshots.lock().unwrap().len(), 11);
        assert_eq!(source.total_chapter_calls(), 40);
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 2), ("Ruth", 4)]));
        let engine = engine(&store, &source);

        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();
        let first = store.translation_digest("KJV").await.unwrap();
        let first_count = store.verse_count("KJV").await.unwrap();

        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(store.translation_digest("KJV").await.unwrap(), first);
        assert_eq!(store.verse_count("KJV").await.unwrap(), first_count);
    }

    #[tokio::test]
    async fn test_reimport_without_wipe_replaces_chapters() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 2)]));
        let source_dyn: Arc<dyn ScriptureSource> = source.clone();
        let options = ImportOptions {
            wipe_before_import: false,
            ..fast_options()
        };
        let engine = ImportEngine::new(store.clone(), source_dyn, options);

        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();
        let first = store.translation_digest("KJV").await.unwrap();
        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(store.translation_digest("KJV").await.unwrap(), first);
        assert_eq!(store.verse_count("KJV").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_failed_book_list_keeps_previous_copy() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 2)]));
        let engine = engine(&store, &source);

        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();
        let before = store.translation_digest("KJV").await.unwrap();

        source.fail_book_list(Failure::Network(None));
        let err = engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(engine.state("KJV"), RunState::Failed);
        assert_eq!(store.verse_count("KJV").await.unwrap(), 6);
        assert_eq!(store.translation_digest("KJV").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_reimport_drops_chapters_the_remote_no_longer_lists() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 3)]));
        let engine = engine(&store, &source);

        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();
        assert!(store.get_chapter("KJV", "Genesis", 3).await.unwrap().is_some());

        let shrunk = vec![BookDescriptor::new("Genesis", 2)];
        source.set_books(shrunk.clone());
        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();

        assert!(store.get_chapter("KJV", "Genesis", 3).await.unwrap().is_none());
        assert_eq!(store.verse_count("KJV").await.unwrap(), 6);
        assert!(crate::availability::is_fully_downloaded(&store, "KJV", &shrunk)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_reimport_without_wipe_keeps_stale_chapters() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 3)]));
        let source_dyn: Arc<dyn ScriptureSource> = source.clone();
        let options = ImportOptions {
            wipe_before_import: false,
            ..fast_options()
        };
        let engine = ImportEngine::new(store.clone(), source_dyn, options);

        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();
        source.set_books(vec![BookDescriptor::new("Genesis", 2)]);
        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            store.get_chapter("KJV", "Genesis", 3).await.unwrap(),
            Some(sample_chapter("Genesis", 3))
        );
        assert_eq!(store.verse_count("KJV").await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_missing_chapter_is_skipped() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 3)]));
        source.fail_chapter("Genesis", 2, Failure::NotFound);
        let engine = engine(&store, &source);

        let report = engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(engine.state("KJV"), RunState::Completed);
        assert_eq!(
            report.chapters_skipped,
            vec![ChapterKey::new("KJV", "Genesis", 2)]
        );
        assert!(store.get_chapter("KJV", "Genesis", 1).await.unwrap().is_some());
        assert!(store.get_chapter("KJV", "Genesis", 2).await.unwrap().is_none());
        assert!(store.get_chapter("KJV", "Genesis", 3).await.unwrap().is_some());
        // NotFound is not retried
        assert_eq!(source.chapter_calls("Genesis", 2), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 2)]));
        source.fail_chapter("Genesis", 2, Failure::Network(Some(2)));

        let report = engine(&store, &source)
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.retries, 2);
        assert_eq!(source.chapter_calls("Genesis", 2), 3);
        assert!(store.get_chapter("KJV", "Genesis", 2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_run_and_keeps_prefix() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 2), ("Exodus", 3)]));
        source.fail_chapter("Exodus", 2, Failure::Network(None));
        let recorder = Recorder::default();
        let engine = engine(&store, &source);

        let err = engine
            .download_and_install("KJV", &recorder, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network(_)));
        assert_eq!(engine.state("KJV"), RunState::Failed);
        assert_eq!(source.chapter_calls("Exodus", 2), 3);
        assert_eq!(source.chapter_calls("Exodus", 3), 0);

        assert_eq!(recorder.status(StepId::Db), StepStatus::Completed);
        assert_eq!(recorder.status(StepId::Download), StepStatus::Completed);
        assert_eq!(recorder.status(StepId::Process), StepStatus::Error);
        assert_eq!(recorder.status(StepId::Finalize), StepStatus::Pending);

        for (book, chapter) in [("Genesis", 1), ("Genesis", 2), ("Exodus", 1)] {
            assert_eq!(
                store.get_chapter("KJV", book, chapter).await.unwrap(),
                Some(sample_chapter(book, chapter))
            );
        }
        assert!(store.get_chapter("KJV", "Exodus", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_book_list_failure_is_fatal() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 1)]));
        source.fail_book_list(Failure::Network(Some(1)));
        let recorder = Recorder::default();
        let engine = engine(&store, &source);

        let err = engine
            .download_and_install("KJV", &recorder, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(source.book_list_calls(), 1);
        assert_eq!(source.total_chapter_calls(), 0);
        assert_eq!(recorder.status(StepId::Download), StepStatus::Error);
        assert_eq!(recorder.status(StepId::Process), StepStatus::Pending);
        assert_eq!(engine.state("KJV"), RunState::Failed);
    }

    #[tokio::test]
    async fn test_unknown_translation_fails_on_download_step() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::new());
        let recorder = Recorder::default();

        let err = engine(&store, &source)
            .download_and_install("XYZ", &recorder, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(recorder.status(StepId::Download), StepStatus::Error);
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_chapters() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 4)]));
        let gate = source.gate_chapter("Genesis", 2);
        let engine = engine(&store, &source);
        let cancel = CancelToken::new();

        let task = {
            let engine = engine.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                engine
                    .download_and_install("KJV", &NoopSink, &cancel)
                    .await
            })
        };

        gate.reached.notified().await;
        cancel.cancel();
        gate.release.notify_one();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ImportCancelled(_)));
        assert_eq!(engine.state("KJV"), RunState::Cancelled);

        // The chapter in flight when cancel arrived still commits whole
        assert!(store.get_chapter("KJV", "Genesis", 1).await.unwrap().is_some());
        assert!(store.get_chapter("KJV", "Genesis", 2).await.unwrap().is_some());
        assert!(store.get_chapter("KJV", "Genesis", 3).await.unwrap().is_none());
        assert_eq!(source.chapter_calls("Genesis", 3), 0);
        assert!(!engine.is_running("KJV"));
    }

    #[tokio::test]
    async fn test_concurrent_run_for_same_translation_is_rejected() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Genesis", 2)]));
        let gate = source.gate_chapter("Genesis", 1);
        let engine = engine(&store, &source);

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .download_and_install("KJV", &NoopSink, &CancelToken::new())
                    .await
            })
        };
        gate.reached.notified().await;
        assert!(engine.is_running("KJV"));

        let err = engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ImportInProgress(_)));

        gate.release.notify_one();
        task.await.unwrap().unwrap();
        assert!(!engine.is_running("KJV"));

        // The slot is free again once the first run ended
        engine
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_chapter_payload_is_skipped() {
        let (store, _tmp) = temp_store().await;
        let source = Arc::new(FixtureSource::with_books(&[("Jude", 1)]));
        source.set_chapter("Jude", 1, Chapter::new());

        let report = engine(&store, &source)
            .download_and_install("KJV", &NoopSink, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.chapters_written, 0);
        assert_eq!(report.chapters_skipped.len(), 1);
        assert!(!store.has_translation("KJV").await.unwrap());
    }
}
