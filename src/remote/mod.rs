//! Remote scripture API client
//!
//! This module provides:
//! - The [`ScriptureSource`] seam the importer and reader depend on
//! - An HTTP implementation with per-request timeouts and request pacing
//!
//! Nothing here retries. Callers decide whether a [`Error::Network`] is worth
//! another attempt.

mod rate_limit;

pub use rate_limit::*;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::{BookDescriptor, Chapter};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Where book lists and chapter payloads come from
#[async_trait]
pub trait ScriptureSource: Send + Sync {
    /// Books of a translation with their canonical chapter counts.
    ///
    /// Fails with [`Error::NotFound`] when the translation is unknown.
    async fn fetch_book_list(&self, translation: &str) -> Result<Vec<BookDescriptor>>;

    /// One chapter's verses.
    ///
    /// Fails with [`Error::NotFound`] when the remote has no such chapter.
    async fn fetch_chapter(&self, translation: &str, book: &str, chapter: u32)
        -> Result<Chapter>;
}

/// Chapter payload as served by `/bible/chapter`; `version`, `book` and
/// `chapter` echo the request and are ignored
#[derive(Debug, Deserialize)]
struct ChapterPayload {
    verses: BTreeMap<String, String>,
}

impl ChapterPayload {
    fn into_chapter(self, what: &str) -> Result<Chapter> {
        let mut chapter = Chapter::new();
        for (key, text) in self.verses {
            let number: u32 = key.trim().parse().map_err(|_| {
                Error::InvalidPayload(format!("{}: verse key '{}' is not a number", what, key))
            })?;
            if number == 0 {
                return Err(Error::InvalidPayload(format!(
                    "{}: verse numbers start at 1",
                    what
                )));
            }
            if chapter.verses.insert(number, text).is_some() {
                return Err(Error::InvalidPayload(format!(
                    "{}: verse {} appears more than once",
                    what, number
                )));
            }
        }
        Ok(chapter)
    }
}

/// HTTP client for the scripture API
pub struct HttpScriptureSource {
    client: Client,
    base_url: Url,
    limiter: Option<RequestPacer>,
}

impl HttpScriptureSource {
    /// Create a client from remote configuration
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            limiter: Some(RequestPacer::new(config.requests_per_second)),
        })
    }

    /// Disable client-side pacing
    pub fn without_pacing(mut self) -> Self {
        self.limiter = None;
        self
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid scripture API URL: {}", e)))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    /// GET `url` and return the body, classifying every failure
    async fn get_text(&self, url: Url, what: &str) -> Result<String> {
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }

        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", what, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Network(format!("{}: HTTP {}", what, status)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", what, e)))
    }
}

#[async_trait]
impl ScriptureSource for HttpScriptureSource {
    async fn fetch_book_list(&self, translation: &str) -> Result<Vec<BookDescriptor>> {
        let what = format!("book list for {}", translation);
        let url = self.endpoint("bible/books", &[("version", translation)])?;
        let body = self.get_text(url, &what).await?;

        let books: Vec<BookDescriptor> = serde_json::from_str(&body)
            .map_err(|e| Error::InvalidPayload(format!("{}: {}", what, e)))?;

        if books.is_empty() {
            return Err(Error::NotFound(what));
        }
        Ok(books)
    }

    async fn fetch_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
    ) -> Result<Chapter> {
        let what = format!("{} {} {}", translation, book, chapter);
        let chapter_param = chapter.to_string();
        let url = self.endpoint(
            "bible/chapter",
            &[
                ("version", translation),
                ("book", book),
                ("chapter", chapter_param.as_str()),
            ],
        )?;
        let body = self.get_text(url, &what).await?;

        let payload: ChapterPayload = serde_json::from_str(&body)
            .map_err(|e| Error::InvalidPayload(format!("{}: {}", what, e)))?;
        payload.into_chapter(&what)
    }
}
