use std::collections::HashMap;
use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::{SearchHit, SearchResponse};
use crate::search::HybridEngine;
use crate::store;

fn enrich(
    ranked: Vec<(i64, f32)>,
    meta: &HashMap<i64, (String, i64)>,
) -> Vec<SearchHit> {
    ranked
        .into_iter()
        .filter_map(|(email_id, score)| {
            meta.get(&email_id).map(|(subject, thread_id)| SearchHit {
                email_id,
                thread_id: *thread_id,
                subject: subject.clone(),
                score,
            })
        })
        .collect()
}

/// Hybrid search over the committed corpus.
///
/// Both signals are ranked independently against the same query and returned
/// side by side; `degraded` names any signal that could not be served.
#[get("/search?<q>&<limit>")]
pub async fn search(
    pool: &State<SqlitePool>,
    engine: &State<Arc<HybridEngine>>,
    config: &State<AppConfig>,
    q: Option<String>,
    limit: Option<usize>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = match q {
        Some(ref q) if !q.trim().is_empty() => q.trim().to_string(),
        _ => {
            return Err(ApiError::BadRequest(
                "Query parameter 'q' is required".to_string(),
            ))
        }
    };

    let limit = limit.unwrap_or(config.search_limit).clamp(1, 100);
    let ranked = engine.search(&query, limit)?;

    let mut ids: Vec<i64> = ranked
        .lexical
        .iter()
        .chain(ranked.semantic.iter())
        .map(|(id, _)| *id)
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let meta = store::fetch_hit_meta(pool, &ids).await?;

    Ok(Json(SearchResponse {
        query,
        lexical: enrich(ranked.lexical, &meta),
        semantic: enrich(ranked.semantic, &meta),
        degraded: ranked.degraded,
    }))
}
