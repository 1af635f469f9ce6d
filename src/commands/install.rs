//! Install command implementation

use crate::error::Result;
use crate::import::ImportReport;
use crate::progress::{NoopSink, ProgressSink, TerminalProgress};
use crate::service::OfflineBible;
use tracing::info;

/// Download a whole translation.
///
/// Cancel through [`OfflineBible::cancel_token`]; the spinner is only drawn
/// when `show_progress` is set.
pub async fn cmd_install(
    bible: &OfflineBible,
    translation: &str,
    show_progress: bool,
) -> Result<ImportReport> {
    info!(translation, "Installing translation");

    if !show_progress {
        return bible.download_and_install(translation, &NoopSink).await;
    }

    let terminal = TerminalProgress::new(translation);
    let result = bible
        .download_and_install(translation, &terminal as &dyn ProgressSink)
        .await;
    match &result {
        Ok(_) => terminal.finish("done"),
        Err(e) => terminal.finish(&e.to_string()),
    }
    result
}

pub fn print_install_report(report: &ImportReport) {
    println!("\n📖 Install Complete\n");
    println!("Translation: {}", report.translation);
    println!("Run: {}", report.run_id);
    println!("Books: {}", report.books.len());
    println!("Chapters written: {}", report.chapters_written);
    println!("Verses stored: {}", report.verses_stored);
    if report.retries > 0 {
        println!("Retries: {}", report.retries);
    }
    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        println!("Elapsed: {}s", elapsed.num_seconds());
    }

    if !report.chapters_skipped.is_empty() {
        println!("\nSkipped (not served by the remote):");
        for key in &report.chapters_skipped {
            println!("- {}", key);
        }
    }
}
