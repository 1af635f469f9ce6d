//! Wipe command implementation

use crate::error::{Error, Result};
use crate::service::OfflineBible;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeStats {
    pub translation: String,
    pub verses_removed: u64,
}

/// Remove a translation from the local store
pub async fn cmd_wipe(bible: &OfflineBible, translation: &str, yes: bool) -> Result<WipeStats> {
    if !yes {
        return Err(Error::Config(format!(
            "Refusing to wipe {} without --yes",
            translation
        )));
    }

    let verses_removed = bible.wipe_translation(translation).await?;
    Ok(WipeStats {
        translation: translation.to_string(),
        verses_removed,
    })
}

pub fn print_wipe_stats(stats: &WipeStats) {
    if stats.verses_removed == 0 {
        println!("Nothing stored for {}", stats.translation);
    } else {
        println!(
            "✓ Removed {} verses of {}",
            stats.verses_removed, stats.translation
        );
    }
}
