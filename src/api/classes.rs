use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories::{classes, students};
use crate::schemas::class::{
    ClassCreate, ClassResponse, StudentCreate, StudentResponse, StudentUpdate,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_class).get(list_classes))
        .route("/:class_id", axum::routing::delete(delete_class))
        .route("/:class_id/students", post(add_student).get(list_students))
        .route("/:class_id/students/:student_id", patch(update_student))
}

async fn create_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ClassCreate>,
) -> Result<(StatusCode, Json<ClassResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let name = payload.name.trim();
    let duplicate = classes::exists_by_name(state.db(), name, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check class name"))?;
    if duplicate.is_some() {
        return Err(ApiError::Conflict("A class with this name already exists".to_string()));
    }

    let class = classes::create(state.db(), name, &user.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create class"))?;

    Ok((StatusCode::CREATED, Json(ClassResponse::from(&class))))
}

async fn list_classes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ClassResponse>>, ApiError> {
    let classes = classes::list_by_owner(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classes"))?;

    Ok(Json(classes.iter().map(ClassResponse::from).collect()))
}

async fn delete_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let deleted = classes::delete(state.db(), class_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete class"))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Class not found".to_string()))
    }
}

async fn add_student(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<i32>,
    Json(payload): Json<StudentCreate>,
) -> Result<(StatusCode, Json<StudentResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    classes::find_by_id(state.db(), class_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load class"))?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;

    let student = students::create(
        state.db(),
        payload.full_name.trim(),
        class_id,
        &user.id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create student"))?;

    Ok((StatusCode::CREATED, Json(StudentResponse::from(&student))))
}

async fn list_students(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<i32>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    classes::find_by_id(state.db(), class_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load class"))?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;

    let roster = students::list_by_class(state.db(), class_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load roster"))?;

    Ok(Json(roster.iter().map(StudentResponse::from).collect()))
}

async fn update_student(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((class_id, student_id)): Path<(i32, i32)>,
    Json(payload): Json<StudentUpdate>,
) -> Result<Json<StudentResponse>, ApiError> {
    let student = students::find_by_id(state.db(), student_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load student"))?
        .filter(|student| student.class_id == class_id)
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let updated = students::set_disabled(state.db(), student.id, &user.id, payload.is_disabled)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update student"))?;
    if !updated {
        return Err(ApiError::NotFound("Student not found".to_string()));
    }

    let student = students::find_by_id(state.db(), student_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload student"))?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    Ok(Json(StudentResponse::from(&student)))
}
