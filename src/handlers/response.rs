// src/handlers/response.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError, models::response::SubmitResponsesRequest, reconcile, utils::jwt::Claims,
};

/// Parses the raw body into a submission, mapping any structural problem
/// (missing/non-array `responses`, non-string answer) to `InvalidSubmission`.
/// Per-entry problems are handled later, during normalization.
fn parse_submission(payload: serde_json::Value) -> Result<SubmitResponsesRequest, AppError> {
    serde_json::from_value(payload).map_err(|e| AppError::InvalidSubmission(e.to_string()))
}

/// Replaces the caller's entire stored answer set with this submission.
///
/// Runs delete-then-insert inside one serializable transaction, so the
/// stored state afterwards equals the normalized submission exactly.
/// Answers to questions absent from the submission are discarded; this is
/// full replacement, not a merge.
pub async fn submit_responses(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);

    let submission = parse_submission(payload)?;
    let normalized = reconcile::normalize(&submission.responses)?;

    let mut tx = reconcile::begin_serializable(&pool).await?;
    let saved_count = reconcile::replace_set(&mut *tx, user_id, &normalized).await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Responses saved (replaced previous set).",
            "savedCount": saved_count,
        })),
    ))
}

/// Merges this submission into the caller's stored answers: update where a
/// row exists, insert where it does not. Untouched questions keep their
/// previous answers.
///
/// The response reports both intended and actually-affected counts so a
/// client can detect anomalies (e.g. an update that matched zero rows).
pub async fn upsert_responses(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);

    let submission = parse_submission(payload)?;
    let normalized = reconcile::normalize(&submission.responses)?;

    let mut tx = reconcile::begin_serializable(&pool).await?;
    let outcome = reconcile::upsert_set(&mut *tx, user_id, &normalized).await?;
    tx.commit().await?;

    Ok(Json(json!({
        "message": "Responses processed.",
        "updatedRowsAffected": outcome.updated_rows_affected,
        "createdCount": outcome.created_count,
        "intended": {
            "toUpdate": outcome.intended_updates,
            "toCreate": outcome.intended_creates,
        },
    })))
}

/// Returns the caller's stored responses with question metadata attached.
/// Empty array (not an error) when nothing has been submitted yet.
pub async fn get_my_responses(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);

    let mut conn = pool.acquire().await?;
    let responses = reconcile::fetch_responses(&mut conn, user_id).await?;

    Ok(Json(responses))
}
