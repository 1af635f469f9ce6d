//! Is a translation fully available offline?
//!
//! [`VerseStore::has_translation`] only says "something is downloaded". The
//! check here compares the local books against the remote's canonical book
//! list, which is what "the whole Bible is offline" actually means.

use crate::error::Result;
use crate::models::BookDescriptor;
use crate::store::VerseStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Books that are missing or incomplete locally
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub translation: String,
    pub expected_books: usize,
    /// Expected books with no local chapters at all
    pub missing_books: Vec<String>,
    /// Expected books whose local max chapter is below the canonical count
    pub incomplete_books: Vec<IncompleteBook>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteBook {
    pub name: String,
    pub local_chapters: u32,
    pub expected_chapters: u32,
}

impl AvailabilityReport {
    pub fn is_complete(&self) -> bool {
        self.missing_books.is_empty() && self.incomplete_books.is_empty()
    }
}

/// Compare local books with an expected book list
pub fn compare_books(
    translation: &str,
    local: &[BookDescriptor],
    expected: &[BookDescriptor],
) -> AvailabilityReport {
    let local: HashMap<&str, u32> = local
        .iter()
        .map(|b| (b.name.as_str(), b.chapter_count))
        .collect();

    let mut report = AvailabilityReport {
        translation: translation.to_string(),
        expected_books: expected.len(),
        ..AvailabilityReport::default()
    };

    for book in expected {
        match local.get(book.name.as_str()) {
            None => report.missing_books.push(book.name.clone()),
            Some(&have) if have < book.chapter_count => {
                report.incomplete_books.push(IncompleteBook {
                    name: book.name.clone(),
                    local_chapters: have,
                    expected_chapters: book.chapter_count,
                })
            }
            Some(_) => {}
        }
    }

    report
}

/// Availability of `translation` against `expected`
pub async fn check_availability(
    store: &VerseStore,
    translation: &str,
    expected: &[BookDescriptor],
) -> Result<AvailabilityReport> {
    let local = store.list_books(translation).await?;
    Ok(compare_books(translation, &local, expected))
}

/// True only if every expected book is stored up to its expected chapter count
pub async fn is_fully_downloaded(
    store: &VerseStore,
    translation: &str,
    expected: &[BookDescriptor],
) -> Result<bool> {
    Ok(check_availability(store, translation, expected)
        .await?
        .is_complete())
}
