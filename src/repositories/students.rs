use sqlx::PgPool;

use crate::db::models::Student;

const COLUMNS: &str = "id, full_name, class_id, is_disabled, owner_id, created_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: i32,
    owner_id: &str,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "SELECT {COLUMNS} FROM students WHERE id = $1 AND owner_id = $2"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
}

/// Active roster of a class, in a stable order. Disabled students are
/// excluded so they never receive generated papers.
pub(crate) async fn list_active_by_class(
    pool: &PgPool,
    class_id: i32,
    owner_id: &str,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "SELECT {COLUMNS}
         FROM students
         WHERE class_id = $1 AND owner_id = $2 AND is_disabled = FALSE
         ORDER BY id"
    ))
    .bind(class_id)
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Full roster including disabled students, for management views.
pub(crate) async fn list_by_class(
    pool: &PgPool,
    class_id: i32,
    owner_id: &str,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "SELECT {COLUMNS}
         FROM students
         WHERE class_id = $1 AND owner_id = $2
         ORDER BY id"
    ))
    .bind(class_id)
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(
    pool: &PgPool,
    full_name: &str,
    class_id: i32,
    owner_id: &str,
    created_at: time::PrimitiveDateTime,
) -> Result<Student, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "INSERT INTO students (full_name, class_id, is_disabled, owner_id, created_at)
         VALUES ($1, $2, FALSE, $3, $4)
         RETURNING {COLUMNS}",
    ))
    .bind(full_name)
    .bind(class_id)
    .bind(owner_id)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn set_disabled(
    pool: &PgPool,
    id: i32,
    owner_id: &str,
    is_disabled: bool,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE students SET is_disabled = $3 WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .bind(is_disabled)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn names_by_ids(
    pool: &PgPool,
    ids: &[i32],
) -> Result<Vec<(i32, String)>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, (i32, String)>(
        "SELECT id, full_name FROM students WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
}
