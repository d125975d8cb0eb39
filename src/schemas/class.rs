use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Class, Student};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ClassCreate {
    #[validate(length(min = 1, max = 128))]
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassResponse {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) created_at: String,
}

impl From<&Class> for ClassResponse {
    fn from(class: &Class) -> Self {
        Self {
            id: class.id,
            name: class.name.clone(),
            created_at: format_primitive(class.created_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StudentCreate {
    #[validate(length(min = 1, max = 256))]
    pub(crate) full_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentUpdate {
    pub(crate) is_disabled: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResponse {
    pub(crate) id: i32,
    pub(crate) full_name: String,
    pub(crate) class_id: i32,
    pub(crate) is_disabled: bool,
}

impl From<&Student> for StudentResponse {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            full_name: student.full_name.clone(),
            class_id: student.class_id,
            is_disabled: student.is_disabled,
        }
    }
}
