// src/reconcile.rs

//! Survey response reconciliation.
//!
//! A raw submission is first collapsed into a normalized answer set (one
//! final answer per question, last occurrence wins), then written to storage
//! under one of two semantics: full replacement of the user's stored set
//! ([`replace_set`]) or a per-question merge ([`upsert_set`]). Both writers
//! take an explicit connection and expect to run inside the single
//! serializable transaction obtained from [`begin_serializable`], so the
//! upsert's update-vs-insert decision can never race against its own writes.

use std::collections::{BTreeMap, HashSet};

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};

use crate::{
    error::AppError,
    models::{
        question::Question,
        response::{AnswerEntry, UserResponse},
    },
};

/// Upper bound for any single statement inside a reconciliation transaction.
/// A statement that exceeds it fails the whole transaction (rolled back).
const STATEMENT_TIMEOUT_MS: u32 = 5_000;

/// Opens a transaction at SERIALIZABLE isolation with a bounded statement
/// timeout. All reconciliation writes go through one of these.
pub async fn begin_serializable(pool: &PgPool) -> Result<Transaction<'_, Postgres>, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("SET LOCAL statement_timeout = {STATEMENT_TIMEOUT_MS}"))
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

/// Collapses a submission into a map of question id to final answer.
///
/// * Rejects an empty submission outright with `InvalidSubmission`.
/// * Keeps an entry only when `questionId` is an exact JSON integer; string
///   or fractional ids drop just that entry, never the whole request.
/// * When the same question appears more than once, the last entry in
///   submission order wins.
/// * A missing or null `answer` is stored as an empty string.
pub fn normalize(entries: &[AnswerEntry]) -> Result<BTreeMap<i64, String>, AppError> {
    if entries.is_empty() {
        return Err(AppError::InvalidSubmission(
            "Responses must be a non-empty array.".to_string(),
        ));
    }

    let mut latest: BTreeMap<i64, String> = BTreeMap::new();
    for entry in entries {
        let Some(question_id) = entry.question_id.as_ref().and_then(|v| v.as_i64()) else {
            continue;
        };
        latest.insert(question_id, entry.answer.clone().unwrap_or_default());
    }

    Ok(latest)
}

/// Replaces the user's entire stored answer set with `answers`.
///
/// Deletes every existing row for the user, then bulk-inserts the new set.
/// After commit the stored state equals `answers` exactly; prior answers to
/// questions absent from `answers` are gone. Returns the inserted row count.
pub async fn replace_set(
    conn: &mut PgConnection,
    user_id: i64,
    answers: &BTreeMap<i64, String>,
) -> Result<u64, AppError> {
    sqlx::query("DELETE FROM responses WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    // A submission whose entries were all malformed normalizes to an empty
    // set; the delete above still applies.
    if answers.is_empty() {
        return Ok(0);
    }

    let mut builder =
        QueryBuilder::<Postgres>::new("INSERT INTO responses (user_id, question_id, answer) ");
    builder.push_values(answers, |mut row, (question_id, answer)| {
        row.push_bind(user_id)
            .push_bind(*question_id)
            .push_bind(answer.as_str());
    });

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Counts reported by [`upsert_set`].
///
/// `intended_*` reflect the partition decided from the membership check;
/// `updated_rows_affected` and `created_count` are what the store actually
/// did. The caller surfaces both so a divergence (e.g. an update matching
/// zero rows) is observable instead of hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub updated_rows_affected: u64,
    pub created_count: u64,
    pub intended_updates: usize,
    pub intended_creates: usize,
}

/// Merges `answers` into the user's stored set: update where a row already
/// exists for (user, question), insert where none does. Rows for questions
/// absent from `answers` are left untouched.
///
/// The membership check and the writes run on the same connection, i.e.
/// inside the caller's transaction; splitting them across transactions would
/// reopen the lost-update race this function exists to close.
pub async fn upsert_set(
    conn: &mut PgConnection,
    user_id: i64,
    answers: &BTreeMap<i64, String>,
) -> Result<UpsertOutcome, AppError> {
    if answers.is_empty() {
        return Ok(UpsertOutcome {
            updated_rows_affected: 0,
            created_count: 0,
            intended_updates: 0,
            intended_creates: 0,
        });
    }

    // 1. Which of the submitted questions already have a row for this user?
    let mut builder =
        QueryBuilder::<Postgres>::new("SELECT question_id FROM responses WHERE user_id = ");
    builder.push_bind(user_id);
    builder.push(" AND question_id IN (");
    let mut separated = builder.separated(",");
    for question_id in answers.keys() {
        separated.push_bind(*question_id);
    }
    separated.push_unseparated(")");

    let existing: HashSet<i64> = builder
        .build_query_scalar::<i64>()
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .collect();

    // 2. Partition into updates and creates.
    let (to_update, to_create): (Vec<_>, Vec<_>) = answers
        .iter()
        .partition(|(question_id, _)| existing.contains(*question_id));

    // 3. One update per existing row, one bulk insert for the rest.
    let mut updated_rows_affected = 0u64;
    for (question_id, answer) in &to_update {
        let result =
            sqlx::query("UPDATE responses SET answer = $1 WHERE user_id = $2 AND question_id = $3")
                .bind(answer.as_str())
                .bind(user_id)
                .bind(**question_id)
                .execute(&mut *conn)
                .await?;
        updated_rows_affected += result.rows_affected();
    }

    let created_count = if to_create.is_empty() {
        0
    } else {
        let mut builder =
            QueryBuilder::<Postgres>::new("INSERT INTO responses (user_id, question_id, answer) ");
        builder.push_values(&to_create, |mut row, (question_id, answer)| {
            row.push_bind(user_id)
                .push_bind(**question_id)
                .push_bind(answer.as_str());
        });
        builder.build().execute(&mut *conn).await?.rows_affected()
    };

    Ok(UpsertOutcome {
        updated_rows_affected,
        created_count,
        intended_updates: to_update.len(),
        intended_creates: to_create.len(),
    })
}

/// Row shape for the reader's join query.
#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: i64,
    question_id: i64,
    answer: String,
    created_at: chrono::DateTime<chrono::Utc>,
    title: String,
    description: Option<String>,
    question_type: String,
    category: String,
}

/// Loads the user's stored responses joined with question metadata.
/// Read-only; returns an empty vec when the user has no responses.
pub async fn fetch_responses(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Vec<UserResponse>, AppError> {
    let rows = sqlx::query_as::<_, ResponseRow>(
        r#"
        SELECT
            r.id,
            r.question_id,
            r.answer,
            r.created_at,
            q.title,
            q.description,
            q.type AS question_type,
            q.category
        FROM responses r
        JOIN questions q ON r.question_id = q.id
        WHERE r.user_id = $1
        ORDER BY r.question_id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| UserResponse {
            id: row.id,
            question_id: row.question_id,
            answer: row.answer,
            created_at: row.created_at,
            question: Question {
                id: row.question_id,
                title: row.title,
                description: row.description,
                question_type: row.question_type,
                category: row.category,
            },
        })
        .collect())
}
