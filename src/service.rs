//! `OfflineBible`: one handle over store, remote, importer and reader
//!
//! If the local store cannot be opened the service still starts, in a
//! degraded network-only mode: chapter reads go straight to the remote and
//! everything that needs the store reports it as unavailable.

use crate::availability::{self, AvailabilityReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::import::{CancelToken, ImportEngine, ImportOptions, ImportReport, RunState};
use crate::models::{BookDescriptor, Chapter, TranslationSummary};
use crate::progress::ProgressSink;
use crate::reader::{ChapterRead, ChapterReader};
use crate::remote::{HttpScriptureSource, ScriptureSource};
use crate::store::VerseStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct OfflineBible {
    config: Config,
    store: Option<VerseStore>,
    source: Arc<dyn ScriptureSource>,
    engine: Option<ImportEngine>,
    reader: ChapterReader,
    cancels: Mutex<HashMap<String, CancelToken>>,
}

impl OfflineBible {
    /// Open the service against the HTTP scripture API from `config`
    pub async fn open(config: Config) -> Result<Self> {
        let source: Arc<dyn ScriptureSource> = Arc::new(HttpScriptureSource::new(&config.remote)?);
        Self::with_source(config, source).await
    }

    /// Open the service against any scripture source
    pub async fn with_source(config: Config, source: Arc<dyn ScriptureSource>) -> Result<Self> {
        let store = match VerseStore::connect(&config).await {
            Ok(store) => Some(store),
            Err(Error::StorageInit(reason)) => {
                warn!("Offline storage unavailable, continuing network-only: {}", reason);
                None
            }
            Err(e) => return Err(e),
        };

        let (engine, reader) = match &store {
            Some(store) => (
                Some(ImportEngine::new(
                    store.clone(),
                    Arc::clone(&source),
                    ImportOptions::from(&config.import),
                )),
                ChapterReader::new(store.clone(), Arc::clone(&source), config.reader.write_back),
            ),
            None => (None, ChapterReader::network_only(Arc::clone(&source))),
        };

        Ok(Self {
            config,
            store,
            source,
            engine,
            reader,
            cancels: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True when the local store could not be opened
    pub fn is_degraded(&self) -> bool {
        self.store.is_none()
    }

    fn unavailable(&self) -> Error {
        Error::StorageInit(format!(
            "{} could not be opened",
            self.config.paths.db_file.display()
        ))
    }

    fn store(&self) -> Result<&VerseStore> {
        self.store.as_ref().ok_or_else(|| self.unavailable())
    }

    fn cancels(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancelToken>> {
        self.cancels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Token that cancels the current (or next) import of `translation`.
    ///
    /// Tokens nobody holds anymore are dropped here unless they were
    /// cancelled; a cancelled one waits for the next run to consume it.
    pub fn cancel_token(&self, translation: &str) -> CancelToken {
        let mut cancels = self.cancels();
        cancels.retain(|t, token| t == translation || token.is_shared() || token.is_cancelled());
        cancels
            .entry(translation.to_string())
            .or_default()
            .clone()
    }

    /// Download `translation` in full, reporting step progress to `sink`
    pub async fn download_and_install(
        &self,
        translation: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ImportReport> {
        let engine = self.engine.as_ref().ok_or_else(|| self.unavailable())?;

        let cancel = self.cancel_token(translation);
        let result = engine.download_and_install(translation, sink, &cancel).await;

        // A rejected duplicate must not drop the running import's token
        if !matches!(result, Err(Error::ImportInProgress(_))) {
            self.cancels().remove(translation);
        }
        result
    }

    /// State of the latest import of `translation`
    pub fn import_state(&self, translation: &str) -> RunState {
        self.engine
            .as_ref()
            .map(|engine| engine.state(translation))
            .unwrap_or(RunState::Idle)
    }

    /// Read one chapter, local first
    pub async fn get_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
    ) -> Result<Option<Chapter>> {
        self.reader.get_chapter(translation, book, chapter).await
    }

    /// Read one chapter and report whether it came from the local store
    pub async fn read_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
    ) -> Result<Option<ChapterRead>> {
        self.reader.read(translation, book, chapter).await
    }

    /// Whether any verse of `translation` is stored locally.
    ///
    /// Cheap, but a partial import also counts; use
    /// [`is_fully_downloaded`](Self::is_fully_downloaded) for completeness.
    pub async fn is_bible_downloaded(&self, translation: &str) -> Result<bool> {
        match &self.store {
            Some(store) => store.has_translation(translation).await,
            None => Ok(false),
        }
    }

    /// Whether every book the remote lists is stored in full. Needs the network.
    pub async fn is_fully_downloaded(&self, translation: &str) -> Result<bool> {
        Ok(self.availability(translation).await?.is_complete())
    }

    /// Missing and incomplete books compared to the remote book list
    pub async fn availability(&self, translation: &str) -> Result<AvailabilityReport> {
        let expected = self.source.fetch_book_list(translation).await?;
        match &self.store {
            Some(store) => availability::check_availability(store, translation, &expected).await,
            None => Ok(availability::compare_books(translation, &[], &expected)),
        }
    }

    /// Locally stored books of `translation`, in the order they were first written
    pub async fn list_books(&self, translation: &str) -> Result<Vec<BookDescriptor>> {
        match &self.store {
            Some(store) => store.list_books(translation).await,
            None => Ok(Vec::new()),
        }
    }

    /// Delete every stored verse of `translation`; returns the number removed
    pub async fn wipe_translation(&self, translation: &str) -> Result<u64> {
        if self
            .engine
            .as_ref()
            .is_some_and(|engine| engine.is_running(translation))
        {
            return Err(Error::ImportInProgress(translation.to_string()));
        }
        let removed = self.store()?.wipe_translation(translation).await?;
        info!(translation, removed, "Wiped translation");
        Ok(removed)
    }

    /// Content digest of the stored translation, `None` when nothing is stored
    pub async fn translation_digest(&self, translation: &str) -> Result<Option<String>> {
        match &self.store {
            Some(store) if store.has_translation(translation).await? => {
                Ok(Some(store.translation_digest(translation).await?))
            }
            _ => Ok(None),
        }
    }

    pub async fn list_translations(&self) -> Result<Vec<TranslationSummary>> {
        match &self.store {
            Some(store) => store.list_translations().await,
            None => Ok(Vec::new()),
        }
    }
}
