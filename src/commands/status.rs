//! Status command implementation

use crate::availability::AvailabilityReport;
use crate::error::Result;
use crate::models::TranslationSummary;
use crate::service::OfflineBible;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub api_url: String,
    /// Local store could not be opened; reads go to the network
    pub degraded: bool,
    pub translations: Vec<TranslationSummary>,
    pub translation: Option<TranslationStatus>,
}

/// Details for one translation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationStatus {
    pub translation: String,
    pub downloaded: bool,
    pub digest: Option<String>,
    /// Only filled when the remote book list was checked
    pub availability: Option<AvailabilityReport>,
    pub remote_error: Option<String>,
}

/// Get system status, optionally with details for one translation
pub async fn cmd_status(
    bible: &OfflineBible,
    translation: Option<&str>,
    check_remote: bool,
) -> Result<StatusInfo> {
    info!("Getting status");
    let config = bible.config();

    let translation = match translation {
        Some(t) => Some(translation_status(bible, t, check_remote).await?),
        None => None,
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        api_url: config.remote.base_url.clone(),
        degraded: bible.is_degraded(),
        translations: bible.list_translations().await?,
        translation,
    })
}

async fn translation_status(
    bible: &OfflineBible,
    translation: &str,
    check_remote: bool,
) -> Result<TranslationStatus> {
    let (availability, remote_error) = if check_remote {
        match bible.availability(translation).await {
            Ok(report) => (Some(report), None),
            Err(e) => {
                tracing::debug!("Remote availability check failed: {:?}", e);
                (None, Some(e.to_string()))
            }
        }
    } else {
        (None, None)
    };

    Ok(TranslationStatus {
        translation: translation.to_string(),
        downloaded: bible.is_bible_downloaded(translation).await?,
        digest: bible.translation_digest(translation).await?,
        availability,
        remote_error,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 offline-bible Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Scripture API: {}", status.api_url);
    if status.degraded {
        println!("  ⚠ Local store unavailable, reads go to the network");
    }

    println!("\nTranslations:");
    if status.translations.is_empty() {
        println!("  (none stored)");
    }
    for summary in &status.translations {
        println!(
            "  • {}: {} books, {} chapters, {} verses",
            summary.translation, summary.book_count, summary.chapter_count, summary.verse_count
        );
    }

    let Some(detail) = &status.translation else {
        return;
    };

    println!("\n{}:", detail.translation);
    println!(
        "  Downloaded: {}",
        if detail.downloaded { "✓ yes" } else { "✗ no" }
    );
    if let Some(digest) = &detail.digest {
        println!("  Digest: {}", digest);
    }
    if let Some(error) = &detail.remote_error {
        println!("  Remote check failed: {}", error);
    }
    if let Some(report) = &detail.availability {
        if report.is_complete() {
            println!("  Complete: ✓ all {} books", report.expected_books);
        } else {
            println!(
                "  Complete: ✗ {} missing, {} incomplete of {} books",
                report.missing_books.len(),
                report.incomplete_books.len(),
                report.expected_books
            );
            for book in &report.incomplete_books {
                println!(
                    "    - {} ({}/{} chapters)",
                    book.name, book.local_chapters, book.expected_chapters
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::progress::NoopSink;
    use crate::test_support::{Failure, FixtureSource};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_with_remote_check() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("scripture.db");
        let source = Arc::new(FixtureSource::with_books(&[("Ruth", 4)]));
        let bible = OfflineBible::with_source(config, source.clone())
            .await
            .unwrap();
        bible.download_and_install("KJV", &NoopSink).await.unwrap();

        let status = cmd_status(&bible, Some("KJV"), true).await.unwrap();
        assert!(!status.degraded);
        assert_eq!(status.translations.len(), 1);
        let detail = status.translation.unwrap();
        assert!(detail.downloaded);
        assert!(detail.digest.is_some());
        assert!(detail.availability.unwrap().is_complete());

        // An unreachable remote is reported, not fatal
        source.fail_book_list(Failure::Network(None));
        let status = cmd_status(&bible, Some("KJV"), true).await.unwrap();
        let detail = status.translation.unwrap();
        assert!(detail.availability.is_none());
        assert!(detail.remote_error.is_some());
    }
}
