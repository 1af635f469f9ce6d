//! Books command implementation

use crate::error::Result;
use crate::models::BookDescriptor;
use crate::service::OfflineBible;

/// Locally stored books of a translation
pub async fn cmd_books(bible: &OfflineBible, translation: &str) -> Result<Vec<BookDescriptor>> {
    bible.list_books(translation).await
}

pub fn print_books(translation: &str, books: &[BookDescriptor]) {
    println!("\n📚 {} (offline)\n", translation);

    if books.is_empty() {
        println!(
            "Nothing stored. Use 'offline-bible install {}' to download it.",
            translation
        );
        return;
    }

    for book in books {
        println!("• {} ({} chapters)", book.name, book.chapter_count);
    }
}
