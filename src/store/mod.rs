//! SQLite-backed corpus store.
//!
//! The store has exactly two externally visible states: absent (no database
//! file on disk) and ready (a fully committed database). Commits write to a
//! staging file and promote it with an atomic rename, so a crash mid-commit
//! never leaves a partially populated store behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{Email, EmailDoc, EmailRow, ThreadDetail, ThreadRow};
use crate::threading::ThreadGroup;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("recipient encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("another instance is bootstrapping the store")]
    Locked,
}

/// Coarse lifecycle state of the store, derived from file presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Unbuilt,
    Ready,
}

pub fn state(db_path: &Path) -> StoreState {
    if db_path.is_file() {
        StoreState::Ready
    } else {
        StoreState::Unbuilt
    }
}

/// Exclusive advisory lock guarding the bootstrap of a store.
///
/// Acquisition creates `<db_path>.lock` with `create_new`, so exactly one of
/// several concurrently starting instances wins. The file is removed on drop;
/// a stale lock left by a crashed process has to be cleared by the operator.
pub struct BootstrapLock {
    path: PathBuf,
}

impl BootstrapLock {
    pub fn acquire(db_path: &Path) -> Result<Self, StoreError> {
        let path = sibling_path(db_path, "lock");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(BootstrapLock { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(StoreError::Locked),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for BootstrapLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove bootstrap lock {}: {}", self.path.display(), e);
        }
    }
}

fn sibling_path(db_path: &Path, suffix: &str) -> PathBuf {
    let mut os = db_path.as_os_str().to_owned();
    os.push(".");
    os.push(suffix);
    PathBuf::from(os)
}

/// Persist a loaded buffer and its thread assignment in one atomic commit.
///
/// Everything is written into a staging database inside a single transaction,
/// then the staging file is renamed over `db_path`. Any failure discards the
/// staging file and leaves the store absent.
pub async fn commit_buffer(
    db_path: &Path,
    buffer: &[Email],
    threads: &[ThreadGroup],
) -> Result<(), StoreError> {
    let staging = sibling_path(db_path, "staging");
    if staging.exists() {
        warn!("Removing stale staging file {}", staging.display());
        fs::remove_file(&staging)?;
    }

    let result = write_staging(&staging, buffer, threads).await;
    if let Err(e) = result {
        if staging.exists() {
            let _ = fs::remove_file(&staging);
        }
        return Err(e);
    }

    fs::rename(&staging, db_path)?;
    info!(
        "Committed {} emails in {} threads to {}",
        buffer.len(),
        threads.len(),
        db_path.display()
    );
    Ok(())
}

async fn write_staging(
    staging: &Path,
    buffer: &[Email],
    threads: &[ThreadGroup],
) -> Result<(), StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(staging)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;

    let mut tx = pool.begin().await?;

    let email_by_id: HashMap<i64, &Email> = buffer.iter().map(|e| (e.id, e)).collect();

    for email in buffer {
        let recipients = serde_json::to_string(&email.recipients)?;
        sqlx::query(
            "INSERT INTO emails (id, message_id, subject, normalized_subject, sender_name, \
             sender_email, recipients, date, body, source_path) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(email.id)
        .bind(&email.message_id)
        .bind(&email.subject)
        .bind(&email.normalized_subject)
        .bind(&email.sender_name)
        .bind(&email.sender_email)
        .bind(recipients)
        .bind(email.date)
        .bind(&email.body)
        .bind(&email.source_path)
        .execute(&mut *tx)
        .await?;

        for referenced in &email.references {
            sqlx::query(
                "INSERT INTO email_references (email_id, referenced_message_id) VALUES (?, ?)",
            )
            .bind(email.id)
            .bind(referenced)
            .execute(&mut *tx)
            .await?;
        }
    }

    for (index, thread) in threads.iter().enumerate() {
        let thread_id = index as i64 + 1;
        let root = email_by_id
            .get(&thread.root_email_id)
            .ok_or_else(|| sqlx::Error::RowNotFound)?;
        let first = thread.email_ids.first().and_then(|id| email_by_id.get(id));
        let last = thread.email_ids.last().and_then(|id| email_by_id.get(id));
        let start_date = first.map(|e| e.date).unwrap_or(root.date);
        let last_date = last.map(|e| e.date).unwrap_or(root.date);

        sqlx::query(
            "INSERT INTO threads (id, root_email_id, subject, start_date, last_date, \
             message_count) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(thread.root_email_id)
        .bind(&root.subject)
        .bind(start_date)
        .bind(last_date)
        .bind(thread.email_ids.len() as i64)
        .execute(&mut *tx)
        .await?;

        for (position, email_id) in thread.email_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO thread_memberships (thread_id, email_id, position) VALUES (?, ?, ?)",
            )
            .bind(thread_id)
            .bind(email_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    pool.close().await;
    Ok(())
}

/// Open a pool against an existing, committed store.
pub async fn open_pool(db_path: &Path) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(false)
        .journal_mode(SqliteJournalMode::Delete);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Load the searchable projection of every committed email.
pub async fn load_corpus(pool: &SqlitePool) -> Result<Vec<EmailDoc>, sqlx::Error> {
    sqlx::query_as::<_, EmailDoc>("SELECT id, subject, body FROM emails ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn list_threads(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> Result<Vec<ThreadRow>, sqlx::Error> {
    sqlx::query_as::<_, ThreadRow>(
        "SELECT id, root_email_id, subject, start_date, last_date, message_count \
         FROM threads ORDER BY last_date DESC, id ASC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn get_thread(pool: &SqlitePool, thread_id: i64) -> Result<ThreadDetail, sqlx::Error> {
    let thread = sqlx::query_as::<_, ThreadRow>(
        "SELECT id, root_email_id, subject, start_date, last_date, message_count \
         FROM threads WHERE id = ?",
    )
    .bind(thread_id)
    .fetch_one(pool)
    .await?;

    let emails = sqlx::query_as::<_, EmailRow>(
        "SELECT e.id, e.message_id, e.subject, e.sender_name, e.sender_email, e.date, e.body \
         FROM emails e \
         JOIN thread_memberships tm ON tm.email_id = e.id \
         WHERE tm.thread_id = ? \
         ORDER BY tm.position ASC",
    )
    .bind(thread_id)
    .fetch_all(pool)
    .await?;

    Ok(ThreadDetail { thread, emails })
}

/// Resolve (subject, thread_id) for a batch of email ids in one query.
pub async fn fetch_hit_meta(
    pool: &SqlitePool,
    email_ids: &[i64],
) -> Result<HashMap<i64, (String, i64)>, sqlx::Error> {
    if email_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; email_ids.len()].join(", ");
    let sql = format!(
        "SELECT e.id, e.subject, tm.thread_id \
         FROM emails e \
         JOIN thread_memberships tm ON tm.email_id = e.id \
         WHERE e.id IN ({placeholders})"
    );

    let mut query = sqlx::query_as::<_, (i64, String, i64)>(&sql);
    for id in email_ids {
        query = query.bind(id);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|(id, subject, thread_id)| (id, (subject, thread_id)))
        .collect())
}

pub async fn count_emails(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM emails")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_threads(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM threads")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
