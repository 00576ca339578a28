//! Environment-driven application configuration.

use chrono::Duration;
use std::env;
use std::path::PathBuf;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Runtime configuration for ingestion and search.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the durable store. Its absence triggers the bootstrap.
    pub db_path: PathBuf,
    /// Directory walked for raw .eml message files.
    pub mail_dir: PathBuf,
    /// Maximum gap between consecutive same-subject messages for the
    /// threading fallback to chain them into one conversation.
    pub fallback_window_days: i64,
    /// Default number of hits returned per search signal.
    pub search_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: PathBuf::from(env_string("MAILDEX_DB_PATH", "./db/emails.db")),
            mail_dir: PathBuf::from(env_string("MAILDEX_MAIL_DIR", "./mail")),
            fallback_window_days: env_i64("MAILDEX_FALLBACK_WINDOW_DAYS", 14).max(0),
            search_limit: env_usize("MAILDEX_SEARCH_LIMIT", 20).max(1),
        }
    }

    pub fn fallback_window(&self) -> Duration {
        Duration::days(self.fallback_window_days)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
