//! Scripted in-memory scripture source for engine and reader tests

use crate::error::{Error, Result};
use crate::models::{BookDescriptor, Chapter};
use crate::remote::ScriptureSource;
use crate::store::VerseStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    NotFound,
    /// Network errors for the next `n` calls, or forever when `None`
    Network(Option<u32>),
}

/// Pauses the next fetch of one chapter until the test releases it
#[derive(Clone)]
pub struct Gate {
    pub reached: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct FixtureSource {
    books: Mutex<Option<Vec<BookDescriptor>>>,
    book_list_failure: Mutex<Option<Failure>>,
    chapters: Mutex<HashMap<(String, u32), Chapter>>,
    failures: Mutex<HashMap<(String, u32), Failure>>,
    gates: Mutex<HashMap<(String, u32), Gate>>,
    chapter_calls: Mutex<HashMap<(String, u32), u32>>,
    book_list_calls: Mutex<u32>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Books where chapter `n` of every book holds verses `1..=3`
    pub fn with_books(books: &[(&str, u32)]) -> Self {
        let source = Self::new();
        source.set_books(
            books
                .iter()
                .map(|(name, count)| BookDescriptor::new(*name, *count))
                .collect(),
        );
        for (name, count) in books {
            for chapter in 1..=*count {
                source.set_chapter(name, chapter, sample_chapter(name, chapter));
            }
        }
        source
    }

    pub fn set_books(&self, books: Vec<BookDescriptor>) {
        *self.books.lock().unwrap() = Some(books);
    }

    pub fn set_chapter(&self, book: &str, chapter: u32, verses: Chapter) {
        self.chapters
            .lock()
            .unwrap()
            .insert((book.to_string(), chapter), verses);
    }

    pub fn fail_book_list(&self, failure: Failure) {
        *self.book_list_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_chapter(&self, book: &str, chapter: u32, failure: Failure) {
        self.failures
            .lock()
            .unwrap()
            .insert((book.to_string(), chapter), failure);
    }

    pub fn gate_chapter(&self, book: &str, chapter: u32) -> Gate {
        let gate = Gate {
            reached: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        self.gates
            .lock()
            .unwrap()
            .insert((book.to_string(), chapter), gate.clone());
        gate
    }

    pub fn chapter_calls(&self, book: &str, chapter: u32) -> u32 {
        self.chapter_calls
            .lock()
            .unwrap()
            .get(&(book.to_string(), chapter))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_chapter_calls(&self) -> u32 {
        self.chapter_calls.lock().unwrap().values().sum()
    }

    pub fn book_list_calls(&self) -> u32 {
        *self.book_list_calls.lock().unwrap()
    }

    fn take_failure(slot: &mut Option<Failure>) -> Option<Failure> {
        match *slot {
            Some(Failure::Network(Some(0))) => {
                *slot = None;
                None
            }
            Some(Failure::Network(Some(n))) => {
                *slot = Some(Failure::Network(Some(n - 1)));
                Some(Failure::Network(Some(n)))
            }
            other => other,
        }
    }

    fn into_error(failure: Failure, what: &str) -> Error {
        match failure {
            Failure::NotFound => Error::NotFound(what.to_string()),
            Failure::Network(_) => Error::Network(format!("{}: connection reset", what)),
        }
    }
}

#[async_trait]
impl ScriptureSource for FixtureSource {
    async fn fetch_book_list(&self, translation: &str) -> Result<Vec<BookDescriptor>> {
        *self.book_list_calls.lock().unwrap() += 1;
        let what = format!("book list for {}", translation);

        let failure = Self::take_failure(&mut self.book_list_failure.lock().unwrap());
        if let Some(failure) = failure {
            return Err(Self::into_error(failure, &what));
        }

        self.books
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::NotFound(what))
    }

    async fn fetch_chapter(
        &self,
        translation: &str,
        book: &str,
        chapter: u32,
    ) -> Result<Chapter> {
        let key = (book.to_string(), chapter);
        *self.chapter_calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;
        let what = format!("{} {} {}", translation, book, chapter);

        let gate = self.gates.lock().unwrap().remove(&key);
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.release.notified().await;
        }

        let failure = {
            let mut failures = self.failures.lock().unwrap();
            let mut slot = failures.get(&key).copied();
            let failure = Self::take_failure(&mut slot);
            match slot {
                Some(remaining) => failures.insert(key.clone(), remaining),
                None => failures.remove(&key),
            };
            failure
        };
        if let Some(failure) = failure {
            return Err(Self::into_error(failure, &what));
        }

        self.chapters
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or(Error::NotFound(what))
    }
}

pub fn sample_chapter(book: &str, chapter: u32) -> Chapter {
    Chapter::from_verses(
        (1..=3).map(|verse| (verse, format!("{} {}:{} text", book, chapter, verse))),
    )
}

pub async fn temp_store() -> (VerseStore, TempDir) {
    let tmp = TempDir::new().unwrap();
    let store = VerseStore::open(&tmp.path().join("scripture.db"))
        .await
        .unwrap();
    (store, tmp)
}
