//! Corpus ingestion: loading raw messages, threading them, and committing
//! the result into the store exactly once.

pub mod loader;
pub mod parser;

pub use loader::{load_and_buffer, IngestError};

use log::info;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::AppConfig;
use crate::store::{self, BootstrapLock, StoreError, StoreState};
use crate::threading;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Open the store, bootstrapping it first when it does not exist yet.
///
/// The full pipeline (load, thread, commit) runs only when the database file
/// is absent; an existing store is opened as-is and the mail directory is not
/// touched. Concurrent first launches are serialized by [`BootstrapLock`]:
/// the loser gets [`StoreError::Locked`] and should be restarted once the
/// winner has finished.
pub async fn bootstrap_if_absent(config: &AppConfig) -> Result<SqlitePool, BootstrapError> {
    if store::state(&config.db_path) == StoreState::Ready {
        info!("Store {} already exists, skipping ingestion", config.db_path.display());
        return Ok(store::open_pool(&config.db_path).await?);
    }

    let lock = BootstrapLock::acquire(&config.db_path)?;

    // The store may have been committed between the state check and the lock
    // acquisition by an instance that has already released its lock.
    if store::state(&config.db_path) == StoreState::Ready {
        drop(lock);
        return Ok(store::open_pool(&config.db_path).await?);
    }

    info!(
        "Bootstrapping store {} from {}",
        config.db_path.display(),
        config.mail_dir.display()
    );

    let buffer = load_and_buffer(&config.mail_dir)?;
    let threads = threading::compute_threads(&buffer, config.fallback_window());
    store::commit_buffer(&config.db_path, &buffer, &threads).await?;
    drop(lock);

    Ok(store::open_pool(&config.db_path).await?)
}
