// src/handlers/question.rs

use axum::{Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{error::AppError, models::question::Question};

/// Returns the full question catalog grouped by category.
///
/// Shape: `{ "demographic": [...], "health": [...], "financial": [...] }`,
/// with questions ordered by id inside each group. The form wizard renders
/// one step per category from this.
pub async fn list_questions(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, title, description, type, category
        FROM questions
        ORDER BY id ASC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions: {:?}", e);
        AppError::from(e)
    })?;

    let mut grouped: serde_json::Map<String, serde_json::Value> = serde_json::Map::new();
    for question in questions {
        let bucket = grouped
            .entry(question.category.clone())
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if let Some(items) = bucket.as_array_mut() {
            items.push(serde_json::to_value(&question)?);
        }
    }

    Ok(Json(serde_json::Value::Object(grouped)))
}
