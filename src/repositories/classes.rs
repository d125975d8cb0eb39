use sqlx::PgPool;

use crate::db::models::Class;

const COLUMNS: &str = "id, name, owner_id, created_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: i32,
    owner_id: &str,
) -> Result<Option<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!(
        "SELECT {COLUMNS} FROM classes WHERE id = $1 AND owner_id = $2"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_owner(
    pool: &PgPool,
    owner_id: &str,
) -> Result<Vec<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!(
        "SELECT {COLUMNS} FROM classes WHERE owner_id = $1 ORDER BY name"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn exists_by_name(
    pool: &PgPool,
    name: &str,
    owner_id: &str,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM classes WHERE name = $1 AND owner_id = $2")
        .bind(name)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn create(
    pool: &PgPool,
    name: &str,
    owner_id: &str,
    created_at: time::PrimitiveDateTime,
) -> Result<Class, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!(
        "INSERT INTO classes (name, owner_id, created_at)
         VALUES ($1, $2, $3)
         RETURNING {COLUMNS}",
    ))
    .bind(name)
    .bind(owner_id)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: i32, owner_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM classes WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
