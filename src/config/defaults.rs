//! Default values for configuration

/// Default scripture API base URL
pub fn default_remote_base_url() -> String {
    std::env::var("OFFLINE_BIBLE_API_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
}

/// Default per-request timeout in seconds
pub fn default_remote_timeout() -> u64 {
    15
}

/// Default user agent string
pub fn default_remote_user_agent() -> String {
    format!("offline-bible/{}", env!("CARGO_PKG_VERSION"))
}

/// Default request pacing against the scripture API
pub fn default_remote_requests_per_second() -> u32 {
    20
}

/// Default attempts per chapter during bulk import (first try included)
pub fn default_import_max_attempts() -> u32 {
    4
}

/// Default initial backoff between chapter retries
pub fn default_import_initial_backoff_ms() -> u64 {
    500
}

/// Default backoff ceiling
pub fn default_import_max_backoff_ms() -> u64 {
    8_000
}

/// Default: wipe a translation before re-downloading it
pub fn default_import_wipe_before_import() -> bool {
    true
}

/// Default: backfill the local store after a network read
pub fn default_reader_write_back() -> bool {
    true
}

/// Default translation used by the CLI
pub fn default_translation() -> String {
    "KJV".to_string()
}
