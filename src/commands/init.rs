//! Init command implementation

use crate::config::{Config, PathsConfig};
use crate::error::{Error, Result};
use crate::store::VerseStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

/// What `init` created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitInfo {
    pub config_path: String,
    pub db_path: String,
    pub default_translation: String,
    pub api_url: String,
}

/// Write a default config and create the verse store
pub async fn cmd_init(options: InitOptions) -> Result<InitInfo> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.paths = PathsConfig {
        db_file: base_dir.join("scripture.db"),
        config_file: config_path,
        base_dir,
    };
    config.validate()?;
    config.save()?;

    VerseStore::connect(&config).await?;
    info!("Created verse store at {:?}", config.paths.db_file);

    Ok(InitInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        default_translation: config.default_translation.clone(),
        api_url: config.remote.base_url.clone(),
    })
}

pub fn print_init(info: &InitInfo) {
    println!("✓ offline-bible initialized");
    println!("  Config: {}", info.config_path);
    println!("  Database: {}", info.db_path);
    println!("  Scripture API: {}", info.api_url);
    println!("\nNext steps:");
    println!(
        "  offline-bible install {}          # Download a translation",
        info.default_translation
    );
    println!(
        "  offline-bible read {} Genesis 1   # Read a chapter",
        info.default_translation
    );
}
