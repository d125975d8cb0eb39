use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{Exam, ExamPage};

#[derive(Debug, Serialize)]
pub(crate) struct ExamPageResponse {
    pub(crate) page_number: i32,
    pub(crate) barcode_x: Option<f64>,
    pub(crate) barcode_y: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: i32,
    pub(crate) title: String,
    pub(crate) subject: String,
    pub(crate) template_path: String,
    pub(crate) page_count: i32,
    pub(crate) barcode_x: f64,
    pub(crate) barcode_y: f64,
    pub(crate) created_at: String,
    pub(crate) pages: Vec<ExamPageResponse>,
}

impl ExamResponse {
    pub(crate) fn from_parts(exam: &Exam, pages: &[ExamPage]) -> Self {
        Self {
            id: exam.id,
            title: exam.title.clone(),
            subject: exam.subject.clone(),
            template_path: exam.template_path.clone(),
            page_count: exam.page_count,
            barcode_x: exam.barcode_x,
            barcode_y: exam.barcode_y,
            created_at: format_primitive(exam.created_at),
            pages: pages
                .iter()
                .map(|page| ExamPageResponse {
                    page_number: page.page_number,
                    barcode_x: page.barcode_x,
                    barcode_y: page.barcode_y,
                })
                .collect(),
        }
    }
}

/// Optional per-page anchor overrides supplied alongside the template.
#[derive(Debug, Deserialize)]
pub(crate) struct PageAnchorInput {
    pub(crate) page: i32,
    pub(crate) x: f64,
    pub(crate) y: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerKeyResponse {
    pub(crate) exam_id: i32,
    pub(crate) question_count: usize,
    pub(crate) total_points: f64,
    pub(crate) updated_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PageStampResponse {
    pub(crate) page_number: i32,
    pub(crate) barcode_value: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PaperDetailResponse {
    pub(crate) exam_id: i32,
    pub(crate) student_id: i32,
    pub(crate) generated_at: String,
    pub(crate) stamps: Vec<PageStampResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PaperFailure {
    pub(crate) student_id: i32,
    pub(crate) full_name: String,
    pub(crate) reason: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PaperBatchResponse {
    pub(crate) exam_id: i32,
    pub(crate) class_id: i32,
    pub(crate) file_path: String,
    pub(crate) generated: Vec<i32>,
    pub(crate) failures: Vec<PaperFailure>,
}
