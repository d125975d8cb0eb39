//! HTTP client for the external scan/grade service.
//!
//! Two multipart endpoints: `POST {base}/scan-barcode` identifies the
//! stamped barcodes on a scanned sheet, `POST {base}/mcq` grades it
//! against a point-stripped answer key. Transport failures, non-success
//! statuses and unparsable payloads all collapse into `ScanFailed` /
//! `GradingFailed`; callers only need to know the external step did not
//! succeed.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use crate::core::config::GatewaySettings;

#[derive(Debug, Error)]
pub(crate) enum GatewayError {
    #[error("gateway client construction failed: {0}")]
    Client(String),
    #[error("barcode scan failed: {0}")]
    ScanFailed(String),
    #[error("no barcodes found in submission")]
    NoBarcodesFound,
    #[error("grading failed: {0}")]
    GradingFailed(String),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScannedBarcode {
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) page_number: String,
    pub(crate) raw_barcode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScanResponse {
    pub(crate) filename: String,
    pub(crate) barcodes: Vec<ScannedBarcode>,
    pub(crate) count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StudentInfo {
    #[serde(default)]
    pub(crate) student_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QuestionResult {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) r#type: String,
    #[serde(default)]
    pub(crate) gt: String,
    #[serde(default)]
    pub(crate) pred: String,
    #[serde(default)]
    pub(crate) conf: f64,
    pub(crate) ok: bool,
    #[serde(default)]
    pub(crate) method: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GradeDetails {
    pub(crate) score: f64,
    pub(crate) total: f64,
    pub(crate) details: Vec<QuestionResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GradeResult {
    pub(crate) filename: String,
    #[serde(default)]
    pub(crate) student_info: Option<StudentInfo>,
    pub(crate) details: GradeDetails,
    #[serde(default)]
    pub(crate) annotated_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GradeResponse {
    pub(crate) results: Vec<GradeResult>,
}

#[derive(Clone)]
pub(crate) struct GradingGateway {
    client: reqwest::Client,
    base_url: String,
}

impl GradingGateway {
    pub(crate) fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        Self::with_base_url(
            settings.base_url.clone(),
            settings.connect_timeout_seconds,
            settings.request_timeout_seconds,
        )
    }

    pub(crate) fn with_base_url(
        base_url: String,
        connect_timeout_seconds: u64,
        request_timeout_seconds: u64,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_seconds))
            .timeout(Duration::from_secs(request_timeout_seconds))
            .build()
            .map_err(|err| GatewayError::Client(err.to_string()))?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub(crate) async fn scan_barcodes(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ScanResponse, GatewayError> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()));

        let response = self
            .client
            .post(format!("{}/scan-barcode", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|err| GatewayError::ScanFailed(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ScanFailed(format!("gateway returned {status}")));
        }

        let parsed: ScanResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::ScanFailed(format!("unparsable response: {err}")))?;

        if parsed.barcodes.is_empty() {
            return Err(GatewayError::NoBarcodesFound);
        }

        tracing::debug!(
            filename = %parsed.filename,
            count = parsed.count,
            "Barcode scan succeeded"
        );

        Ok(parsed)
    }

    pub(crate) async fn grade_submission(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        answer_key_payload: &serde_json::Value,
    ) -> Result<GradeResponse, GatewayError> {
        let form = Form::new()
            .part("files", Part::bytes(bytes).file_name(filename.to_string()))
            .text("model_config", answer_key_payload.to_string());

        let response = self
            .client
            .post(format!("{}/mcq", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|err| GatewayError::GradingFailed(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::GradingFailed(format!("gateway returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|err| GatewayError::GradingFailed(format!("unparsable response: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let gateway =
            GradingGateway::with_base_url("http://localhost:8800/".to_string(), 5, 30).unwrap();
        assert_eq!(gateway.base_url, "http://localhost:8800");
    }

    #[test]
    fn scan_response_parses_wire_shape() {
        let raw = r#"{
            "filename": "sheet-1.jpg",
            "barcodes": [
                {"exam_id": "5", "student_id": "12", "page_number": "1", "raw_barcode": "5-12-1"}
            ],
            "count": 1
        }"#;
        let parsed: ScanResponse = serde_json::from_str(raw).expect("scan response");
        assert_eq!(parsed.barcodes.len(), 1);
        assert_eq!(parsed.barcodes[0].raw_barcode, "5-12-1");
    }

    #[test]
    fn grade_response_parses_with_and_without_student_info() {
        let raw = r#"{
            "results": [
                {
                    "filename": "sheet (Student:12).jpg",
                    "details": {
                        "score": 3.0,
                        "total": 5.0,
                        "details": [
                            {"id": "Q1", "type": "mcq", "gt": "A", "pred": "A",
                             "conf": 0.98, "ok": true, "method": "vision"}
                        ]
                    },
                    "annotated_image_url": "http://x/annotated.jpg"
                },
                {
                    "filename": "other.jpg",
                    "student_info": {"student_id": "7"},
                    "details": {"score": 0.0, "total": 5.0, "details": []}
                }
            ]
        }"#;
        let parsed: GradeResponse = serde_json::from_str(raw).expect("grade response");
        assert!(parsed.results[0].student_info.is_none());
        assert_eq!(
            parsed.results[1].student_info.as_ref().unwrap().student_id.as_deref(),
            Some("7")
        );
        assert!(parsed.results[0].details.details[0].ok);
    }
}
