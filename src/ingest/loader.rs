//! The record loader: reads raw message files into an in-memory buffer.
//!
//! Walks the configured mail directory for `.eml` files in lexicographic
//! path order so that id assignment is deterministic across runs. Malformed
//! records are logged and skipped; only an unreadable mail directory is
//! fatal. This stage performs no durable writes.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::ingest::parser::parse_email;
use crate::models::Email;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("mail directory {path} is not readable: {source}")]
    MailDir {
        path: String,
        source: walkdir::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read all raw message sources into normalized, id-assigned `Email`
/// records, preserving source order.
pub fn load_and_buffer(mail_dir: &Path) -> Result<Vec<Email>, IngestError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(mail_dir).follow_links(true) {
        let entry = entry.map_err(|source| IngestError::MailDir {
            path: mail_dir.display().to_string(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut buffer: Vec<Email> = Vec::with_capacity(files.len());
    let mut skipped = 0usize;

    for path in files {
        let raw = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("failed to read {}: {}, skipping", path.display(), err);
                skipped += 1;
                continue;
            }
        };

        match parse_email(&raw) {
            Ok(parsed) => {
                let id = buffer.len() as i64 + 1;
                let references = parsed.referenced_ids();
                let mut recipients = parsed.to_addrs;
                recipients.extend(parsed.cc_addrs);
                buffer.push(Email {
                    id,
                    message_id: parsed.message_id,
                    references,
                    subject: parsed.subject,
                    normalized_subject: parsed.normalized_subject,
                    sender_name: parsed.sender_name,
                    sender_email: parsed.sender_email,
                    recipients,
                    date: parsed.date,
                    body: parsed.body,
                    source_path: path.display().to_string(),
                });
            }
            Err(err) => {
                log::warn!("skipping malformed email {}: {}", path.display(), err);
                skipped += 1;
            }
        }
    }

    log::info!(
        "loaded {} emails from {} ({} skipped)",
        buffer.len(),
        mail_dir.display(),
        skipped
    );

    Ok(buffer)
}
