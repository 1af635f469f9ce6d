//! Interactive chapter reads: local store first, network second
//!
//! A read is single-shot: no retries and no progress reporting. When the
//! chapter has to come from the network it can be written back so the next
//! read of the same chapter is served offline.

use crate::error::{Error, Result};
use crate::models::Chapter;
use crate::remote::ScriptureSource;
use crate::store::VerseStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a chapter read was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadOrigin {
    Local,
    Remote,
}

/// A chapter together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRead {
    pub chapter: Chapter,
    pub origin: ReadOrigin,
}

#[derive(Clone)]
pub struct ChapterReader {
    /// `None` when the local store could not be opened
    store: Option<VerseStore>,
    source: Arc<dyn ScriptureSource>,
    write_back: bool,
}

impl ChapterReader {
    pub fn new(store: VerseStore, source: Arc<dyn ScriptureSource>, write_back: bool) -> Self {
        Self {
            store: Some(store),
            source,
            write_back,
        }
    }

    /// Reader for when the local store is unavailable; every read goes to the network
    pub fn network_only(source: Arc<dyn ScriptureSource>) -> Self {
        Self {
            store: None,
            source,
            write_back: false,
        }
    }

    pub fn is_network_only(&self) -> bool {
        self.store.is_none()
    }

    /// Read a chapter.
    ///
    /// `Ok(None)` means the chapter does not exist (the remote said so).
    /// [`Error::ChapterUnavailable`] means it is not stored locally and the
    /// remote could not be reached.
    pub async fn get_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
    ) -> Result<Option<Chapter>> {
        Ok(self
            .read(translation, book, chapter)
            .await?
            .map(|read| read.chapter))
    }

    /// Like [`get_chapter`](Self::get_chapter), but also reports the origin
    pub async fn read(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
    ) -> Result<Option<ChapterRead>> {
        if let Some(store) = &self.store {
            match store.get_chapter(translation, book, chapter).await {
                Ok(Some(local)) => {
                    debug!(translation, book, chapter, "Served chapter from local store");
                    return Ok(Some(ChapterRead {
                        chapter: local,
                        origin: ReadOrigin::Local,
                    }));
                }
                Ok(None) => {}
                Err(e) => warn!(
                    translation,
                    book, chapter, "Local read failed, falling back to network: {}", e
                ),
            }
        }

        let remote = match self.source.fetch_chapter(translation, book, chapter).await {
            Ok(remote) => remote,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => {
                debug!(translation, book, chapter, "Remote read failed: {}", e);
                return Err(Error::ChapterUnavailable {
                    translation: translation.to_string(),
                    book: book.to_string(),
                    chapter,
                });
            }
        };

        if remote.is_empty() {
            return Ok(None);
        }

        if self.write_back {
            if let Some(store) = &self.store {
                // The read already succeeded; a failed cache fill only costs a later refetch
                if let Err(e) = store.write_chapter(translation, book, chapter, &remote).await {
                    warn!(translation, book, chapter, "Write-back failed: {}", e);
                }
            }
        }

        Ok(Some(ChapterRead {
            chapter: remote,
            origin: ReadOrigin::Remote,
        }))
    }
}
