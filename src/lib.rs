//! offline-bible - offline scripture sync and local reads
//!
//! This crate provides:
//! - A SQLite verse store that only ever holds whole chapters
//! - A bulk importer that downloads a translation chapter by chapter, with
//!   bounded retries, cancellation and step progress
//! - A chapter reader that serves locally and falls back to the network
//! - A CLI around all of the above

pub mod availability;
pub mod commands;
pub mod config;
pub mod error;
pub mod import;
pub mod models;
pub mod progress;
pub mod reader;
pub mod remote;
pub mod service;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, Result};
pub use service::OfflineBible;
