//! The grading pipeline: scan barcodes, load the answer key, grade,
//! reconcile, persist. Stages run strictly in sequence per submission;
//! every stage failure is a discriminated outcome, and nothing is
//! persisted unless reconciliation produced a usable result.

use sqlx::PgPool;
use thiserror::Error;

use crate::core::time::primitive_now_utc;
use crate::db::models::GradingRecord;
use crate::repositories::{answer_keys, exams, grading_records};
use crate::services::answer_key::{self, AnswerKeyIndex};
use crate::services::grading_gateway::{GatewayError, GradingGateway};
use crate::services::reconcile;

#[derive(Debug, Error)]
pub(crate) enum PipelineError {
    #[error("no file provided")]
    NoFileProvided,
    #[error("barcode scan failed: {0}")]
    ScanFailed(String),
    #[error("no barcodes found in submission")]
    NoBarcodesFound,
    #[error("exam {0} not found")]
    ExamNotFound(i32),
    #[error("exam {0} has no answer key")]
    ExamKeyNotFound(i32),
    #[error("answer key for exam {0} is malformed")]
    InvalidAnswerKey(i32),
    #[error("grading failed: {0}")]
    GradingFailed(String),
    #[error("database failure")]
    Database(#[from] sqlx::Error),
}

impl From<GatewayError> for PipelineError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NoBarcodesFound => PipelineError::NoBarcodesFound,
            GatewayError::ScanFailed(context) | GatewayError::Client(context) => {
                PipelineError::ScanFailed(context)
            }
            GatewayError::GradingFailed(context) => PipelineError::GradingFailed(context),
        }
    }
}

/// Runs the full pipeline for one scanned submission and returns the
/// persisted records. Results whose student identity cannot be resolved
/// are skipped with a log line, not failed.
pub(crate) async fn process_submission(
    pool: &PgPool,
    gateway: &GradingGateway,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<Vec<GradingRecord>, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::NoFileProvided);
    }

    let scan = gateway.scan_barcodes(filename, bytes.clone()).await?;

    let exam_id = scan
        .barcodes
        .first()
        .and_then(|barcode| barcode.exam_id.trim().parse::<i32>().ok())
        .ok_or_else(|| PipelineError::ScanFailed("malformed exam id in barcode".to_string()))?;

    let exam = exams::find_by_id_any_owner(pool, exam_id)
        .await?
        .ok_or(PipelineError::ExamNotFound(exam_id))?;

    // The key index is rebuilt from stored state on every run so the
    // teacher's latest edit is always honored.
    let stored_key = answer_keys::find_by_exam(pool, exam_id)
        .await?
        .ok_or(PipelineError::ExamKeyNotFound(exam_id))?;
    let document = answer_key::parse_document(&stored_key.questions.0).map_err(|err| {
        tracing::error!(exam_id, error = %err, "Stored answer key failed to parse");
        PipelineError::InvalidAnswerKey(exam_id)
    })?;
    let index = AnswerKeyIndex::build(&document);
    let payload = answer_key::gateway_payload(&stored_key.questions.0);

    let graded = gateway.grade_submission(filename, bytes, &payload).await?;

    let mut records = Vec::new();
    for (position, result) in graded.results.iter().enumerate() {
        let Some(reconciled) = reconcile::reconcile(result, position, &scan.barcodes, &index)
        else {
            continue;
        };

        let outcomes = serde_json::to_value(&reconciled.outcomes)
            .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()));

        let record = grading_records::upsert(
            pool,
            grading_records::UpsertRecord {
                exam_id,
                student_id: reconciled.student_id,
                owner_id: &exam.owner_id,
                final_score: reconciled.final_score,
                total_points: reconciled.total_points,
                outcomes,
                annotated_image_url: reconciled.annotated_image_url.as_deref(),
                graded_at: primitive_now_utc(),
            },
        )
        .await?;

        tracing::info!(
            exam_id,
            student_id = record.student_id,
            final_score = record.final_score,
            total_points = record.total_points,
            "Persisted grading record"
        );
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn empty_scan_handler(mut multipart: Multipart) -> Json<serde_json::Value> {
        let mut filename = String::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() == Some("file") {
                filename = field.file_name().unwrap_or("unknown").to_string();
                let _ = field.bytes().await.unwrap();
            }
        }
        Json(json!({ "filename": filename, "barcodes": [], "count": 0 }))
    }

    async fn spawn_gateway(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn zero_barcodes_surface_as_no_barcodes_found() {
        let base_url =
            spawn_gateway(Router::new().route("/scan-barcode", post(empty_scan_handler))).await;
        let gateway = GradingGateway::with_base_url(base_url, 5, 10).unwrap();

        let err = gateway
            .scan_barcodes("sheet.jpg", b"fake image".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoBarcodesFound));
        assert!(matches!(PipelineError::from(err), PipelineError::NoBarcodesFound));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_scan_failed() {
        // Nothing is listening on this port.
        let gateway =
            GradingGateway::with_base_url("http://127.0.0.1:9".to_string(), 1, 2).unwrap();
        let err = gateway
            .scan_barcodes("sheet.jpg", b"fake image".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ScanFailed(_)));
    }

    #[test]
    fn gateway_errors_map_onto_pipeline_variants() {
        assert!(matches!(
            PipelineError::from(GatewayError::ScanFailed("boom".into())),
            PipelineError::ScanFailed(_)
        ));
        assert!(matches!(
            PipelineError::from(GatewayError::GradingFailed("boom".into())),
            PipelineError::GradingFailed(_)
        ));
    }
}
