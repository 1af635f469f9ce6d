//! Core data model: verses, chapters and book descriptors

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single stored verse row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Verse {
    pub translation: String,
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

/// Lookup key for one chapter of one translation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterKey {
    pub translation: String,
    pub book: String,
    pub chapter: u32,
}

impl ChapterKey {
    pub fn new(translation: impl Into<String>, book: impl Into<String>, chapter: u32) -> Self {
        Self {
            translation: translation.into(),
            book: book.into(),
            chapter,
        }
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.translation, self.book, self.chapter)
    }
}

/// All verses of one chapter, ordered by verse number.
///
/// Verse numbers are not required to be contiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub verses: BTreeMap<u32, String>,
}

impl Chapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_verses<I, S>(verses: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            verses: verses.into_iter().map(|(n, t)| (n, t.into())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }

    pub fn get(&self, verse: u32) -> Option<&str> {
        self.verses.get(&verse).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.verses.iter().map(|(n, t)| (*n, t.as_str()))
    }
}

/// A book and how many chapters it has.
///
/// When sourced from the remote this is the canonical count. When derived
/// from the local store it is the highest chapter actually downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDescriptor {
    pub name: String,
    #[serde(rename = "chapters")]
    pub chapter_count: u32,
}

impl BookDescriptor {
    pub fn new(name: impl Into<String>, chapter_count: u32) -> Self {
        Self {
            name: name.into(),
            chapter_count,
        }
    }
}

/// Summary of one locally stored translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSummary {
    pub translation: String,
    pub book_count: u32,
    pub chapter_count: u32,
    pub verse_count: u32,
}
