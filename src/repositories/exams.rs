use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::{Exam, ExamPage};

const COLUMNS: &str = "\
    id, title, subject, owner_id, template_path, page_count, \
    barcode_x, barcode_y, created_at";

const PAGE_COLUMNS: &str = "id, exam_id, page_number, barcode_x, barcode_y";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: i32,
    owner_id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE id = $1 AND owner_id = $2"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_id_any_owner(
    pool: &PgPool,
    id: i32,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_title(
    pool: &PgPool,
    title: &str,
    owner_id: &str,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM exams WHERE title = $1 AND owner_id = $2")
        .bind(title)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_owner(pool: &PgPool, owner_id: &str) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE owner_id = $1 ORDER BY created_at DESC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateExam<'a> {
    pub title: &'a str,
    pub subject: &'a str,
    pub owner_id: &'a str,
    pub template_path: &'a str,
    pub page_count: i32,
    pub barcode_x: f64,
    pub barcode_y: f64,
    pub created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    tx: &mut Transaction<'_, Postgres>,
    params: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            title, subject, owner_id, template_path, page_count,
            barcode_x, barcode_y, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(params.title)
    .bind(params.subject)
    .bind(params.owner_id)
    .bind(params.template_path)
    .bind(params.page_count)
    .bind(params.barcode_x)
    .bind(params.barcode_y)
    .bind(params.created_at)
    .fetch_one(&mut **tx)
    .await
}

pub(crate) async fn insert_page(
    tx: &mut Transaction<'_, Postgres>,
    exam_id: i32,
    page_number: i32,
    barcode_x: Option<f64>,
    barcode_y: Option<f64>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_pages (exam_id, page_number, barcode_x, barcode_y)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(exam_id)
    .bind(page_number)
    .bind(barcode_x)
    .bind(barcode_y)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn list_pages(pool: &PgPool, exam_id: i32) -> Result<Vec<ExamPage>, sqlx::Error> {
    sqlx::query_as::<_, ExamPage>(&format!(
        "SELECT {PAGE_COLUMNS} FROM exam_pages WHERE exam_id = $1 ORDER BY page_number"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: i32, owner_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
