use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::AnswerKey;

const COLUMNS: &str = "id, exam_id, file_path, questions, updated_at";

pub(crate) async fn find_by_exam(
    pool: &PgPool,
    exam_id: i32,
) -> Result<Option<AnswerKey>, sqlx::Error> {
    sqlx::query_as::<_, AnswerKey>(&format!(
        "SELECT {COLUMNS} FROM answer_keys WHERE exam_id = $1"
    ))
    .bind(exam_id)
    .fetch_optional(pool)
    .await
}

/// Wholesale replacement: a re-uploaded key overwrites the previous one.
pub(crate) async fn upsert(
    pool: &PgPool,
    exam_id: i32,
    file_path: &str,
    questions: serde_json::Value,
    updated_at: time::PrimitiveDateTime,
) -> Result<AnswerKey, sqlx::Error> {
    sqlx::query_as::<_, AnswerKey>(&format!(
        "INSERT INTO answer_keys (exam_id, file_path, questions, updated_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (exam_id) DO UPDATE SET
            file_path = EXCLUDED.file_path,
            questions = EXCLUDED.questions,
            updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}",
    ))
    .bind(exam_id)
    .bind(file_path)
    .bind(Json(questions))
    .bind(updated_at)
    .fetch_one(pool)
    .await
}
