use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::{GeneratedPaper, PageStamp};

const COLUMNS: &str = "id, exam_id, student_id, generated_at";

const STAMP_COLUMNS: &str = "id, paper_id, page_number, barcode_value";

/// Regeneration replaces the previous paper record and its page stamps
/// instead of accumulating duplicates.
pub(crate) async fn upsert_paper(
    tx: &mut Transaction<'_, Postgres>,
    exam_id: i32,
    student_id: i32,
    generated_at: time::PrimitiveDateTime,
) -> Result<GeneratedPaper, sqlx::Error> {
    let paper = sqlx::query_as::<_, GeneratedPaper>(&format!(
        "INSERT INTO generated_papers (exam_id, student_id, generated_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (exam_id, student_id) DO UPDATE SET
            generated_at = EXCLUDED.generated_at
         RETURNING {COLUMNS}",
    ))
    .bind(exam_id)
    .bind(student_id)
    .bind(generated_at)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM page_stamps WHERE paper_id = $1")
        .bind(paper.id)
        .execute(&mut **tx)
        .await?;

    Ok(paper)
}

pub(crate) async fn insert_stamp(
    tx: &mut Transaction<'_, Postgres>,
    paper_id: i32,
    page_number: i32,
    barcode_value: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO page_stamps (paper_id, page_number, barcode_value)
         VALUES ($1, $2, $3)",
    )
    .bind(paper_id)
    .bind(page_number)
    .bind(barcode_value)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn list_stamps(
    pool: &PgPool,
    paper_id: i32,
) -> Result<Vec<PageStamp>, sqlx::Error> {
    sqlx::query_as::<_, PageStamp>(&format!(
        "SELECT {STAMP_COLUMNS} FROM page_stamps WHERE paper_id = $1 ORDER BY page_number"
    ))
    .bind(paper_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_paper(
    pool: &PgPool,
    exam_id: i32,
    student_id: i32,
) -> Result<Option<GeneratedPaper>, sqlx::Error> {
    sqlx::query_as::<_, GeneratedPaper>(&format!(
        "SELECT {COLUMNS} FROM generated_papers WHERE exam_id = $1 AND student_id = $2"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}
