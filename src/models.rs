use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ===== In-memory ingestion model =====

/// A normalized email record buffered by the loader.
///
/// Ids are assigned sequentially in source order during loading and double as
/// the ingestion-order tie-breaker when sorting threads chronologically.
#[derive(Debug, Clone)]
pub struct Email {
    pub id: i64,
    /// Message-ID header, absent when the source omitted or mangled it.
    /// Emails without one still thread, as singletons or via subject fallback.
    pub message_id: Option<String>,
    /// Referenced message ids: the References chain plus In-Reply-To.
    pub references: Vec<String>,
    pub subject: String,
    pub normalized_subject: String,
    pub sender_name: String,
    pub sender_email: String,
    /// (name, address) pairs from To and Cc.
    pub recipients: Vec<(String, String)>,
    pub date: DateTime<Utc>,
    pub body: String,
    pub source_path: String,
}

// ===== Persisted rows =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailRow {
    pub id: i64,
    pub message_id: Option<String>,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub date: DateTime<Utc>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ThreadRow {
    pub id: i64,
    pub root_email_id: i64,
    pub subject: String,
    pub start_date: DateTime<Utc>,
    pub last_date: DateTime<Utc>,
    pub message_count: i64,
}

/// Minimal projection used to build the search indices.
#[derive(Debug, Clone, FromRow)]
pub struct EmailDoc {
    pub id: i64,
    pub subject: String,
    pub body: String,
}

// ===== API response shapes =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub thread: ThreadRow,
    /// Chronologically ordered members of the thread.
    pub emails: Vec<EmailRow>,
}

/// One ranked search hit, enriched with its owning thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub email_id: i64,
    pub thread_id: i64,
    pub subject: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub lexical: Vec<SearchHit>,
    pub semantic: Vec<SearchHit>,
    /// Names of signals that could not be served for this query
    /// (e.g. "semantic" when only the lexical index is available).
    pub degraded: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_emails: i64,
    pub total_threads: i64,
}
