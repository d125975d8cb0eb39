use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::GradingRecord;

#[derive(Debug, Serialize)]
pub(crate) struct GradingRecordResponse {
    pub(crate) id: i32,
    pub(crate) exam_id: i32,
    pub(crate) student_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_name: Option<String>,
    pub(crate) final_score: f64,
    pub(crate) total_points: f64,
    pub(crate) outcomes: serde_json::Value,
    pub(crate) annotated_image_url: Option<String>,
    pub(crate) graded_at: String,
}

impl From<&GradingRecord> for GradingRecordResponse {
    fn from(record: &GradingRecord) -> Self {
        Self {
            id: record.id,
            exam_id: record.exam_id,
            student_id: record.student_id,
            student_name: None,
            final_score: record.final_score,
            total_points: record.total_points,
            outcomes: record.outcomes.0.clone(),
            annotated_image_url: record.annotated_image_url.clone(),
            graded_at: format_primitive(record.graded_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) records: Vec<GradingRecordResponse>,
    pub(crate) count: usize,
}
