use crate::api::errors::ApiError;
use crate::services::storage;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

pub(crate) fn validate_template_upload(
    filename: &str,
    allowed_extensions: &[String],
) -> Result<String, ApiError> {
    let extension = storage::extension_of(filename)
        .ok_or_else(|| ApiError::BadRequest("File must have an extension".to_string()))?;

    if !allowed_extensions.iter().any(|allowed| allowed == &extension) {
        return Err(ApiError::BadRequest(format!("File extension '{extension}' is not allowed")));
    }

    Ok(extension)
}

pub(crate) fn validate_answer_key_upload(filename: &str) -> Result<(), ApiError> {
    match storage::extension_of(filename).as_deref() {
        Some("json") => Ok(()),
        Some(other) => Err(ApiError::BadRequest(format!(
            "Answer key must be a .json file, got '.{other}'"
        ))),
        None => Err(ApiError::BadRequest("File must have an extension".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["pdf".to_string(), "jpg".to_string(), "jpeg".to_string(), "png".to_string()]
    }

    #[test]
    fn template_extension_allow_list_enforced() {
        assert_eq!(validate_template_upload("exam.PDF", &allowed()).unwrap(), "pdf");
        assert!(validate_template_upload("exam.docx", &allowed()).is_err());
        assert!(validate_template_upload("noext", &allowed()).is_err());
    }

    #[test]
    fn answer_key_must_be_json() {
        assert!(validate_answer_key_upload("key.json").is_ok());
        assert!(validate_answer_key_upload("key.pdf").is_err());
    }

    #[test]
    fn password_length_is_checked() {
        assert!(validate_password_len("short").is_err());
        assert!(validate_password_len("long enough secret").is_ok());
    }
}
