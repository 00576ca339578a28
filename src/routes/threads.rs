use rocket::serde::json::Json;
use rocket::State;
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::models::{ThreadDetail, ThreadRow};
use crate::store;

#[get("/threads?<page>&<limit>")]
pub async fn list_threads(
    pool: &State<SqlitePool>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<ThreadRow>>, ApiError> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * limit;

    let threads = store::list_threads(pool, limit, offset).await?;
    Ok(Json(threads))
}

#[get("/threads/<thread_id>")]
pub async fn get_thread(
    pool: &State<SqlitePool>,
    thread_id: i64,
) -> Result<Json<ThreadDetail>, ApiError> {
    let detail = store::get_thread(pool, thread_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                ApiError::NotFound(format!("Thread {} not found", thread_id))
            }
            other => ApiError::DatabaseError(other),
        })?;
    Ok(Json(detail))
}
