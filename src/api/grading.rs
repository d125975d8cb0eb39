use axum::{
    extract::{Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{self, PaginatedResponse};
use crate::core::state::AppState;
use crate::repositories::grading_records::{self, RecordFilter};
use crate::repositories::students;
use crate::schemas::grading::{GradingRecordResponse, SubmissionResponse};
use crate::services::pipeline::{self, PipelineError};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/submissions", post(submit_scans))
        .route("/results", get(list_results))
}

async fn submit_scans(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("Invalid multipart payload: {err}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("scan").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(format!("Failed to read file: {err}")))?;
            upload = Some((filename, bytes.to_vec()));
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    let records =
        pipeline::process_submission(state.db(), state.gateway(), &filename, bytes)
            .await
            .map_err(map_pipeline_error)?;

    metrics::counter!("submissions_graded_total").increment(records.len() as u64);

    Ok(Json(SubmissionResponse {
        count: records.len(),
        records: records.iter().map(GradingRecordResponse::from).collect(),
    }))
}

fn map_pipeline_error(err: PipelineError) -> ApiError {
    match err {
        PipelineError::NoFileProvided => {
            ApiError::BadRequest("No file provided".to_string())
        }
        PipelineError::NoBarcodesFound => {
            ApiError::BadRequest("No recognizable barcodes found in the upload".to_string())
        }
        PipelineError::ExamNotFound(exam_id) => {
            ApiError::NotFound(format!("Exam {exam_id} not found"))
        }
        PipelineError::ExamKeyNotFound(exam_id) => {
            ApiError::NotFound(format!("Exam {exam_id} has no answer key"))
        }
        PipelineError::InvalidAnswerKey(exam_id) => ApiError::internal(
            format!("answer key for exam {exam_id} is not valid"),
            "Stored answer key failed to parse",
        ),
        PipelineError::ScanFailed(reason) => {
            ApiError::BadGateway(format!("Barcode scan failed: {reason}"))
        }
        PipelineError::GradingFailed(reason) => {
            ApiError::BadGateway(format!("Grading failed: {reason}"))
        }
        PipelineError::Database(err) => ApiError::internal(err, "Failed to persist grades"),
    }
}

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    exam_id: Option<i32>,
    class_id: Option<i32>,
    search: Option<String>,
    #[serde(default)]
    skip: i64,
    #[serde(default = "pagination::default_limit")]
    limit: i64,
}

async fn list_results(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<PaginatedResponse<GradingRecordResponse>>, ApiError> {
    if query.limit < 1 || query.limit > 500 {
        return Err(ApiError::BadRequest("limit must be between 1 and 500".to_string()));
    }
    if query.skip < 0 {
        return Err(ApiError::BadRequest("skip must not be negative".to_string()));
    }

    let filter = RecordFilter {
        exam_id: query.exam_id,
        class_id: query.class_id,
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
    };

    let records =
        grading_records::list_by_owner(state.db(), &user.id, &filter, query.limit, query.skip)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list grading records"))?;
    let total_count = grading_records::count_by_owner(state.db(), &user.id, &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count grading records"))?;

    let student_ids: Vec<i32> = records.iter().map(|record| record.student_id).collect();
    let names: std::collections::HashMap<i32, String> =
        students::names_by_ids(state.db(), &student_ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load student names"))?
            .into_iter()
            .collect();

    let items = records
        .iter()
        .map(|record| {
            let mut item = GradingRecordResponse::from(record);
            item.student_name = names.get(&record.student_id).cloned();
            item
        })
        .collect();

    Ok(Json(PaginatedResponse {
        items,
        total_count,
        skip: query.skip,
        limit: query.limit,
    }))
}
