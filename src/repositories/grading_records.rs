use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::GradingRecord;

const COLUMNS: &str = "\
    id, exam_id, student_id, owner_id, final_score, total_points, \
    outcomes, annotated_image_url, graded_at";

pub(crate) struct UpsertRecord<'a> {
    pub exam_id: i32,
    pub student_id: i32,
    pub owner_id: &'a str,
    pub final_score: f64,
    pub total_points: f64,
    pub outcomes: serde_json::Value,
    pub annotated_image_url: Option<&'a str>,
    pub graded_at: time::PrimitiveDateTime,
}

/// Administrative write path: no owner filter on the conflict target.
/// Re-grading a sheet must land on the same (exam, student) row no
/// matter which session produced the earlier record; ownership comes
/// from the parent exam, not from the caller.
pub(crate) async fn upsert(
    pool: &PgPool,
    params: UpsertRecord<'_>,
) -> Result<GradingRecord, sqlx::Error> {
    sqlx::query_as::<_, GradingRecord>(&format!(
        "INSERT INTO grading_records (
            exam_id, student_id, owner_id, final_score, total_points,
            outcomes, annotated_image_url, graded_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        ON CONFLICT (exam_id, student_id) DO UPDATE SET
            final_score = EXCLUDED.final_score,
            total_points = EXCLUDED.total_points,
            outcomes = EXCLUDED.outcomes,
            annotated_image_url = EXCLUDED.annotated_image_url,
            graded_at = EXCLUDED.graded_at
        RETURNING {COLUMNS}",
    ))
    .bind(params.exam_id)
    .bind(params.student_id)
    .bind(params.owner_id)
    .bind(params.final_score)
    .bind(params.total_points)
    .bind(sqlx::types::Json(params.outcomes))
    .bind(params.annotated_image_url)
    .bind(params.graded_at)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Default)]
pub(crate) struct RecordFilter {
    pub exam_id: Option<i32>,
    pub class_id: Option<i32>,
    pub search: Option<String>,
}

pub(crate) async fn list_by_owner(
    pool: &PgPool,
    owner_id: &str,
    filter: &RecordFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<GradingRecord>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT r.{} FROM grading_records r",
        COLUMNS.replace(", ", ", r.")
    ));

    if filter.class_id.is_some() || filter.search.is_some() {
        builder.push(" JOIN students s ON s.id = r.student_id");
    }

    builder.push(" WHERE r.owner_id = ");
    builder.push_bind(owner_id);

    if let Some(exam_id) = filter.exam_id {
        builder.push(" AND r.exam_id = ");
        builder.push_bind(exam_id);
    }
    if let Some(class_id) = filter.class_id {
        builder.push(" AND s.class_id = ");
        builder.push_bind(class_id);
    }
    if let Some(search) = &filter.search {
        builder.push(" AND s.full_name ILIKE ");
        builder.push_bind(format!("%{search}%"));
    }

    builder.push(" ORDER BY r.graded_at DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    builder.build_query_as::<GradingRecord>().fetch_all(pool).await
}

pub(crate) async fn count_by_owner(
    pool: &PgPool,
    owner_id: &str,
    filter: &RecordFilter,
) -> Result<i64, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM grading_records r");

    if filter.class_id.is_some() || filter.search.is_some() {
        builder.push(" JOIN students s ON s.id = r.student_id");
    }

    builder.push(" WHERE r.owner_id = ");
    builder.push_bind(owner_id);

    if let Some(exam_id) = filter.exam_id {
        builder.push(" AND r.exam_id = ");
        builder.push_bind(exam_id);
    }
    if let Some(class_id) = filter.class_id {
        builder.push(" AND s.class_id = ");
        builder.push_bind(class_id);
    }
    if let Some(search) = &filter.search {
        builder.push(" AND s.full_name ILIKE ");
        builder.push_bind(format!("%{search}%"));
    }

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::core::{config::Settings, time::primitive_now_utc};
    use crate::test_support;

    #[tokio::test]
    async fn regrading_a_pair_keeps_one_row_with_the_latest_outcome() {
        let _guard = test_support::env_lock();
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");
        let pool = test_support::prepare_db(&settings).await;

        let owner = test_support::insert_user(&pool, "teacher1", "Teacher One").await;
        let (exam_id, student_id) = test_support::seed_exam_with_student(&pool, &owner.id).await;

        let first = upsert(
            &pool,
            UpsertRecord {
                exam_id,
                student_id,
                owner_id: &owner.id,
                final_score: 2.0,
                total_points: 5.0,
                outcomes: json!([{"question_id": "1", "is_correct": true}]),
                annotated_image_url: None,
                graded_at: primitive_now_utc(),
            },
        )
        .await
        .expect("first upsert");

        let second = upsert(
            &pool,
            UpsertRecord {
                exam_id,
                student_id,
                owner_id: &owner.id,
                final_score: 4.5,
                total_points: 5.0,
                outcomes: json!([{"question_id": "1", "is_correct": false}]),
                annotated_image_url: Some("http://grader/annotated/1.png"),
                graded_at: primitive_now_utc(),
            },
        )
        .await
        .expect("second upsert");

        assert_eq!(second.id, first.id);

        let row_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM grading_records WHERE exam_id = $1 AND student_id = $2",
        )
        .bind(exam_id)
        .bind(student_id)
        .fetch_one(&pool)
        .await
        .expect("count");
        assert_eq!(row_count, 1);

        let stored = list_by_owner(&pool, &owner.id, &RecordFilter::default(), 10, 0)
            .await
            .expect("list records");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].final_score, 4.5);
        assert_eq!(stored[0].outcomes.0, json!([{"question_id": "1", "is_correct": false}]));
        assert_eq!(stored[0].annotated_image_url.as_deref(), Some("http://grader/annotated/1.png"));
    }
}
