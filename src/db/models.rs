use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Class {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) owner_id: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Student {
    pub(crate) id: i32,
    pub(crate) full_name: String,
    pub(crate) class_id: i32,
    pub(crate) is_disabled: bool,
    pub(crate) owner_id: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: i32,
    pub(crate) title: String,
    pub(crate) subject: String,
    pub(crate) owner_id: String,
    pub(crate) template_path: String,
    pub(crate) page_count: i32,
    pub(crate) barcode_x: f64,
    pub(crate) barcode_y: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamPage {
    pub(crate) id: i32,
    pub(crate) exam_id: i32,
    pub(crate) page_number: i32,
    pub(crate) barcode_x: Option<f64>,
    pub(crate) barcode_y: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AnswerKey {
    pub(crate) id: i32,
    pub(crate) exam_id: i32,
    pub(crate) file_path: String,
    pub(crate) questions: Json<serde_json::Value>,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GeneratedPaper {
    pub(crate) id: i32,
    pub(crate) exam_id: i32,
    pub(crate) student_id: i32,
    pub(crate) generated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct PageStamp {
    pub(crate) id: i32,
    pub(crate) paper_id: i32,
    pub(crate) page_number: i32,
    pub(crate) barcode_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GradingRecord {
    pub(crate) id: i32,
    pub(crate) exam_id: i32,
    pub(crate) student_id: i32,
    pub(crate) owner_id: String,
    pub(crate) final_score: f64,
    pub(crate) total_points: f64,
    pub(crate) outcomes: Json<serde_json::Value>,
    pub(crate) annotated_image_url: Option<String>,
    pub(crate) graded_at: PrimitiveDateTime,
}
