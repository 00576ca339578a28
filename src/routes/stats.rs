use rocket::serde::json::Json;
use rocket::State;
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::models::StatsResponse;
use crate::store;

#[get("/stats")]
pub async fn get_stats(pool: &State<SqlitePool>) -> Result<Json<StatsResponse>, ApiError> {
    let total_emails = store::count_emails(pool).await?;
    let total_threads = store::count_threads(pool).await?;
    Ok(Json(StatsResponse {
        total_emails,
        total_threads,
    }))
}
