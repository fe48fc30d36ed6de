// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Represents the 'questions' table in the database.
///
/// The catalog is seeded once at startup and treated as immutable after
/// that; there is no management API for it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The question text shown to the user.
    pub title: String,

    /// Optional helper text below the title.
    pub description: Option<String>,

    /// Input type: 'text' or 'number'.
    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: String,

    /// Survey section: 'demographic', 'health' or 'financial'.
    pub category: String,
}
