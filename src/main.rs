//! offline-bible CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use offline_bible::{
    commands::{
        cmd_books, cmd_init, cmd_install, cmd_read, cmd_status, cmd_wipe, print_books,
        print_chapter, print_init, print_install_report, print_status, print_wipe_stats,
        InitOptions,
    },
    config::Config,
    error::Result,
    progress::LogWriterFactory,
    service::OfflineBible,
};
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "offline-bible")]
#[command(version, about = "Download scripture translations for offline reading", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "OFFLINE_BIBLE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the local verse store
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Download a whole translation for offline use
    ///
    /// Ctrl-C stops after the chapter being fetched; everything stored so far stays.
    Install {
        /// Translation identifier (e.g. KJV)
        translation: Option<String>,
    },

    /// Read one chapter, from the local store when possible
    Read {
        /// Translation identifier
        translation: String,
        /// Book name as the scripture API spells it
        book: String,
        /// Chapter number, starting at 1
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        chapter: u32,
    },

    /// List the books stored for a translation
    Books {
        /// Translation identifier
        translation: Option<String>,
    },

    /// Show local store status
    Status {
        /// Show details for one translation
        translation: Option<String>,

        /// Compare against the remote book list (needs the network)
        #[arg(long)]
        check_remote: bool,
    },

    /// Delete a translation from the local store
    Wipe {
        /// Translation identifier
        translation: String,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force, cli.json).await;
    }

    // Handle completions command (doesn't need config/store)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "offline-bible", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let default_translation = config.default_translation.clone();
    let bible = OfflineBible::open(config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Install { translation } => {
            let translation = translation.unwrap_or(default_translation);
            spawn_cancel_on_ctrl_c(&bible, &translation);

            let report = cmd_install(&bible, &translation, !cli.json).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_install_report(&report);
            }
        }

        Commands::Read {
            translation,
            book,
            chapter,
        } => {
            let view = cmd_read(&bible, &translation, &book, chapter).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_chapter(&view);
            }
        }

        Commands::Books { translation } => {
            let translation = translation.unwrap_or(default_translation);
            let books = cmd_books(&bible, &translation).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&books)?);
            } else {
                print_books(&translation, &books);
            }
        }

        Commands::Status {
            translation,
            check_remote,
        } => {
            let status = cmd_status(&bible, translation.as_deref(), check_remote).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Wipe { translation, yes } => {
            if !yes {
                eprintln!("⚠️  This will delete every stored verse of {}!", translation);
                eprintln!("Run with --yes to confirm.");
                std::process::exit(1);
            }
            let stats = cmd_wipe(&bible, &translation, yes).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_wipe_stats(&stats);
            }
        }
    }

    Ok(())
}

/// First Ctrl-C cancels the import cooperatively
fn spawn_cancel_on_ctrl_c(bible: &OfflineBible, translation: &str) {
    let cancel = bible.cancel_token(translation);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancelling after the current chapter...");
            cancel.cancel();
        }
    });
}

async fn handle_init(config: Option<PathBuf>, force: bool, json: bool) -> Result<()> {
    // A .toml path names the config file itself, anything else its directory
    let (base_dir, config_path) = match config {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path)
        }
        Some(dir) => (dir.clone(), dir.join("config.toml")),
        None => {
            let base = Config::default_base_dir();
            (base.clone(), base.join("config.toml"))
        }
    };

    let info = cmd_init(InitOptions {
        base_dir,
        config_path,
        force,
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_init(&info);
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                eprintln!(
                    "Config file not found: {}\nRun 'offline-bible init' first.",
                    path.display()
                );
                std::process::exit(1);
            }
            Config::load(path)
        }
        // No config yet is fine; defaults (and OFFLINE_BIBLE_API_URL) apply
        None => Config::load_from(None),
    }
}
