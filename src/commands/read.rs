//! Read command implementation

use crate::error::{Error, Result};
use crate::reader::ReadOrigin;
use crate::service::OfflineBible;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerseLine {
    pub verse: u32,
    pub text: String,
}

/// One chapter as shown to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterView {
    pub translation: String,
    pub book: String,
    pub chapter: u32,
    pub origin: ReadOrigin,
    pub verses: Vec<VerseLine>,
}

/// Read a chapter, local first
pub async fn cmd_read(
    bible: &OfflineBible,
    translation: &str,
    book: &str,
    chapter: u32,
) -> Result<ChapterView> {
    let read = bible
        .read_chapter(translation, book, chapter)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {} {}", translation, book, chapter)))?;

    Ok(ChapterView {
        translation: translation.to_string(),
        book: book.to_string(),
        chapter,
        origin: read.origin,
        verses: read
            .chapter
            .iter()
            .map(|(verse, text)| VerseLine {
                verse,
                text: text.to_string(),
            })
            .collect(),
    })
}

pub fn print_chapter(view: &ChapterView) {
    println!("\n{} {} ({})\n", view.book, view.chapter, view.translation);
    for line in &view.verses {
        println!("{:>3}  {}", line.verse, line.text);
    }
    if view.origin == ReadOrigin::Remote {
        println!("\n(fetched from the network)");
    }
}
