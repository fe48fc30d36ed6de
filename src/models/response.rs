// src/models/response.rs

use serde::{Deserialize, Serialize};

use crate::models::question::Question;

/// One raw entry of a submission as received on the wire.
///
/// `question_id` stays raw JSON on purpose: a malformed id (string, float,
/// null) must drop only that entry during normalization, not fail the whole
/// request body at deserialization time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    #[serde(default)]
    pub question_id: Option<serde_json::Value>,
    #[serde(default)]
    pub answer: Option<String>,
}

/// Request body shared by the replace and upsert submission endpoints.
#[derive(Debug, Deserialize)]
pub struct SubmitResponsesRequest {
    pub responses: Vec<AnswerEntry>,
}

/// A stored response joined with its question metadata, as returned by
/// `GET /api/responses`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub question_id: i64,
    pub answer: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub question: Question,
}
