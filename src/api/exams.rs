use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Exam, ExamPage, Student};
use crate::repositories::{answer_keys, classes, exams, papers, students};
use crate::schemas::exam::{
    AnswerKeyResponse, ExamResponse, PageAnchorInput, PaperBatchResponse, PaperDetailResponse,
    PaperFailure, PageStampResponse,
};
use crate::services::answer_key::{self, AnswerKeyIndex};
use crate::services::compose::{self, ComposeError, FontResource, PageAnchor, TemplateKind};
use crate::services::storage::{self, StorageService};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_exam).get(list_exams))
        .route("/:exam_id", get(get_exam).delete(delete_exam))
        .route("/:exam_id/answer-key", post(upload_answer_key))
        .route("/:exam_id/papers", post(generate_papers))
        .route("/:exam_id/papers/:student_id", get(get_paper))
}

struct TemplateUpload {
    title: String,
    subject: String,
    barcode_x: f64,
    barcode_y: f64,
    page_anchors: Vec<PageAnchorInput>,
    filename: String,
    bytes: Vec<u8>,
}

async fn read_template_upload(mut multipart: Multipart) -> Result<TemplateUpload, ApiError> {
    let mut title = None;
    let mut subject = None;
    let mut barcode_x = None;
    let mut barcode_y = None;
    let mut page_anchors = Vec::new();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("Invalid multipart payload: {err}")))?
    {
        match field.name() {
            Some("title") => {
                title = Some(read_text(field).await?);
            }
            Some("subject") => {
                subject = Some(read_text(field).await?);
            }
            Some("barcode_x") => {
                barcode_x = Some(read_f64(field, "barcode_x").await?);
            }
            Some("barcode_y") => {
                barcode_y = Some(read_f64(field, "barcode_y").await?);
            }
            Some("page_anchors") => {
                let raw = read_text(field).await?;
                page_anchors = serde_json::from_str(&raw).map_err(|err| {
                    ApiError::BadRequest(format!("Invalid page_anchors JSON: {err}"))
                })?;
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("template").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(format!("Failed to read file: {err}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    }

    Ok(TemplateUpload {
        title: title.ok_or_else(|| ApiError::BadRequest("Missing title".to_string()))?,
        subject: subject.ok_or_else(|| ApiError::BadRequest("Missing subject".to_string()))?,
        barcode_x: barcode_x
            .ok_or_else(|| ApiError::BadRequest("Missing barcode_x".to_string()))?,
        barcode_y: barcode_y
            .ok_or_else(|| ApiError::BadRequest("Missing barcode_y".to_string()))?,
        page_anchors,
        filename,
        bytes,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::BadRequest(format!("Failed to read field: {err}")))
}

async fn read_f64(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<f64, ApiError> {
    let raw = read_text(field).await?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {name}: {raw}")))
}

async fn create_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    let upload = read_template_upload(multipart).await?;
    if upload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title must not be empty".to_string()));
    }

    let extension = validation::validate_template_upload(
        &upload.filename,
        &state.settings().storage().allowed_template_extensions,
    )?;
    let kind = TemplateKind::from_extension(&extension)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported template type '{extension}'")))?;

    let max_bytes = state.settings().storage().max_upload_size_mb * 1024 * 1024;
    if upload.bytes.len() as u64 > max_bytes {
        return Err(ApiError::BadRequest("Template exceeds the maximum upload size".to_string()));
    }

    let duplicate = exams::exists_by_title(state.db(), upload.title.trim(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check exam title"))?;
    if duplicate.is_some() {
        return Err(ApiError::Conflict("An exam with this title already exists".to_string()));
    }

    let page_count = compose::template_page_count(kind, &upload.bytes)
        .map_err(|err| ApiError::BadRequest(format!("Unreadable template: {err}")))?;

    let template_key =
        StorageService::template_key(&storage::slugify(upload.title.trim()), &extension);
    state
        .storage()
        .upload_bytes(&template_key, upload.bytes)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store template"))?;

    let overrides: HashMap<i32, (f64, f64)> = upload
        .page_anchors
        .iter()
        .map(|anchor| (anchor.page, (anchor.x, anchor.y)))
        .collect();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to open transaction"))?;

    let exam = exams::create(
        &mut tx,
        exams::CreateExam {
            title: upload.title.trim(),
            subject: upload.subject.trim(),
            owner_id: &user.id,
            template_path: &template_key,
            page_count,
            barcode_x: upload.barcode_x,
            barcode_y: upload.barcode_y,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    for page_number in 1..=page_count {
        let (x, y) = match overrides.get(&page_number) {
            Some(&(x, y)) => (Some(x), Some(y)),
            None => (None, None),
        };
        exams::insert_page(&mut tx, exam.id, page_number, x, y)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to record exam page"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam"))?;

    let pages = exams::list_pages(state.db(), exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam pages"))?;

    metrics::counter!("exams_created_total").increment(1);

    Ok((StatusCode::CREATED, Json(ExamResponse::from_parts(&exam, &pages))))
}

async fn list_exams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = exams::list_by_owner(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(exams.iter().map(|exam| ExamResponse::from_parts(exam, &[])).collect()))
}

async fn get_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<i32>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = find_owned_exam(&state, exam_id, &user.id).await?;
    let pages = exams::list_pages(state.db(), exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam pages"))?;

    Ok(Json(ExamResponse::from_parts(&exam, &pages)))
}

async fn delete_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let deleted = exams::delete(state.db(), exam_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Exam not found".to_string()))
    }
}

async fn upload_answer_key(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<AnswerKeyResponse>, ApiError> {
    let exam = find_owned_exam(&state, exam_id, &user.id).await?;

    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("Invalid multipart payload: {err}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("key").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(format!("Failed to read file: {err}")))?;
            file = Some((filename, bytes.to_vec()));
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    }
    validation::validate_answer_key_upload(&filename)?;

    let questions: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::BadRequest(format!("Answer key is not valid JSON: {err}")))?;
    let document = answer_key::parse_document(&questions)
        .map_err(|err| ApiError::BadRequest(format!("Invalid answer key: {err}")))?;
    let index = AnswerKeyIndex::build(&document);

    let key = StorageService::answer_key_key(exam.id);
    state
        .storage()
        .upload_bytes(&key, bytes)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store answer key"))?;

    let stored = answer_keys::upsert(state.db(), exam.id, &key, questions, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to save answer key"))?;

    Ok(Json(AnswerKeyResponse {
        exam_id: exam.id,
        question_count: document.questions.len(),
        total_points: index.total_points(),
        updated_at: crate::core::time::format_primitive(stored.updated_at),
    }))
}

#[derive(Debug, Deserialize)]
struct GeneratePapersQuery {
    class_id: i32,
    #[serde(default)]
    include_names: bool,
}

async fn generate_papers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<i32>,
    Query(query): Query<GeneratePapersQuery>,
) -> Result<Json<PaperBatchResponse>, ApiError> {
    let exam = find_owned_exam(&state, exam_id, &user.id).await?;

    let class = classes::find_by_id(state.db(), query.class_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load class"))?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;

    let roster = students::list_active_by_class(state.db(), class.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load class roster"))?;
    if roster.is_empty() {
        return Err(ApiError::BadRequest("Class has no active students".to_string()));
    }

    let extension = storage::extension_of(&exam.template_path)
        .ok_or_else(|| ApiError::internal("template path has no extension", "Corrupt exam row"))?;
    let kind = TemplateKind::from_extension(&extension).ok_or_else(|| {
        ApiError::internal("template path has unsupported extension", "Corrupt exam row")
    })?;

    let template_bytes = match state.storage().read_bytes(&exam.template_path).await {
        Ok(bytes) => bytes,
        Err(crate::services::storage::StorageError::NotFound(_)) => {
            return Err(ApiError::NotFound("Template file is missing".to_string()));
        }
        Err(err) => return Err(ApiError::internal(err, "Failed to read template")),
    };

    // The font is only required when names are actually stamped.
    let font = if query.include_names {
        let bytes = match state.storage().read_font().await {
            Ok(bytes) => bytes,
            Err(crate::services::storage::StorageError::NotFound(_)) => {
                return Err(ApiError::NotFound("Name font resource is missing".to_string()));
            }
            Err(err) => return Err(ApiError::internal(err, "Failed to read name font")),
        };
        Some(
            FontResource::new(bytes)
                .map_err(|_| ApiError::NotFound("Name font resource is missing".to_string()))?,
        )
    } else {
        None
    };

    let page_rows = exams::list_pages(state.db(), exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam pages"))?;
    let overrides = anchor_overrides(&page_rows);
    let default_anchor = PageAnchor { x: exam.barcode_x, y: exam.barcode_y };

    let mut documents = Vec::with_capacity(roster.len());
    let mut generated = Vec::new();
    let mut failures = Vec::new();

    for student in &roster {
        match compose_one(
            &state,
            &exam,
            student,
            kind,
            &template_bytes,
            default_anchor,
            &overrides,
            font.as_ref(),
        )
        .await
        {
            Ok(document) => {
                documents.push(document);
                generated.push(student.id);
            }
            Err(reason) => {
                tracing::warn!(
                    exam_id = exam.id,
                    student_id = student.id,
                    error = %reason,
                    "Paper composition failed for student"
                );
                failures.push(PaperFailure {
                    student_id: student.id,
                    full_name: student.full_name.clone(),
                    reason,
                });
            }
        }
    }

    if documents.is_empty() {
        return Err(ApiError::internal(
            "every student in the batch failed",
            "Paper generation produced no documents",
        ));
    }

    let combined = compose::merge_documents(documents)
        .map_err(|e| ApiError::internal(e, "Failed to merge generated papers"))?;

    let output_key = StorageService::papers_key(exam.id, class.id);
    state
        .storage()
        .upload_bytes(&output_key, combined)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store generated papers"))?;

    metrics::counter!("papers_generated_total").increment(generated.len() as u64);

    Ok(Json(PaperBatchResponse {
        exam_id: exam.id,
        class_id: class.id,
        file_path: output_key,
        generated,
        failures,
    }))
}

/// Composes and records one student's paper. The PageStamp replacement
/// and the paper row commit together; a failure leaves the previous
/// generation intact.
#[allow(clippy::too_many_arguments)]
async fn compose_one(
    state: &AppState,
    exam: &Exam,
    student: &Student,
    kind: TemplateKind,
    template_bytes: &[u8],
    default_anchor: PageAnchor,
    overrides: &HashMap<i32, PageAnchor>,
    font: Option<&FontResource>,
) -> Result<lopdf::Document, String> {
    let plan =
        compose::build_stamp_plan(exam.id, student.id, exam.page_count, default_anchor, overrides);

    let name_stamp = font.map(|font| (state.shaping().shape(&student.full_name), font));
    let document = compose::compose_student(
        kind,
        template_bytes,
        &plan,
        name_stamp.as_ref().map(|(name, font)| (name.as_str(), *font)),
    )
    .map_err(|err| match err {
        ComposeError::TemplateMissing => "TemplateMissing".to_string(),
        ComposeError::FontMissing => "FontMissing".to_string(),
        other => other.to_string(),
    })?;

    let mut tx = state.db().begin().await.map_err(|err| err.to_string())?;
    let paper = papers::upsert_paper(&mut tx, exam.id, student.id, primitive_now_utc())
        .await
        .map_err(|err| err.to_string())?;
    for spec in &plan {
        papers::insert_stamp(&mut tx, paper.id, spec.page_number, &spec.barcode_value)
            .await
            .map_err(|err| err.to_string())?;
    }
    tx.commit().await.map_err(|err| err.to_string())?;

    Ok(document)
}

async fn get_paper(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((exam_id, student_id)): Path<(i32, i32)>,
) -> Result<Json<PaperDetailResponse>, ApiError> {
    let exam = find_owned_exam(&state, exam_id, &user.id).await?;

    let paper = papers::find_paper(state.db(), exam.id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load generated paper"))?
        .ok_or_else(|| ApiError::NotFound("No paper generated for this student".to_string()))?;

    let stamps = papers::list_stamps(state.db(), paper.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load page stamps"))?;

    Ok(Json(PaperDetailResponse {
        exam_id: paper.exam_id,
        student_id: paper.student_id,
        generated_at: crate::core::time::format_primitive(paper.generated_at),
        stamps: stamps
            .iter()
            .map(|stamp| PageStampResponse {
                page_number: stamp.page_number,
                barcode_value: stamp.barcode_value.clone(),
            })
            .collect(),
    }))
}

fn anchor_overrides(pages: &[ExamPage]) -> HashMap<i32, PageAnchor> {
    pages
        .iter()
        .filter_map(|page| match (page.barcode_x, page.barcode_y) {
            (Some(x), Some(y)) => Some((page.page_number, PageAnchor { x, y })),
            _ => None,
        })
        .collect()
}

async fn find_owned_exam(
    state: &AppState,
    exam_id: i32,
    owner_id: &str,
) -> Result<Exam, ApiError> {
    exams::find_by_id(state.db(), exam_id, owner_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_overrides_skip_partial_coordinates() {
        let pages = vec![
            ExamPage { id: 1, exam_id: 1, page_number: 1, barcode_x: Some(10.0), barcode_y: Some(20.0) },
            ExamPage { id: 2, exam_id: 1, page_number: 2, barcode_x: Some(10.0), barcode_y: None },
            ExamPage { id: 3, exam_id: 1, page_number: 3, barcode_x: None, barcode_y: None },
        ];
        let overrides = anchor_overrides(&pages);
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[&1], PageAnchor { x: 10.0, y: 20.0 });
    }
}
