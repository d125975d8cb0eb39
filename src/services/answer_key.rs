//! Answer-key parsing and the point index used for score reconciliation.
//!
//! The stored key is teacher-authored JSON: `{"questions": [{"id": ..,
//! "points": ..}]}`. Parsing happens in a single typed pass so every
//! downstream consumer sees defaulted point values, never raw JSON.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

const DEFAULT_POINTS: f64 = 1.0;

#[derive(Debug, Error)]
pub(crate) enum AnswerKeyError {
    #[error("answer key document is not a JSON object")]
    NotAnObject,
    #[error("answer key has no questions array")]
    MissingQuestions,
    #[error("question at position {0} has no id")]
    MissingId(usize),
    #[error("question ids \"{0}\" and \"{1}\" collide after normalization")]
    DuplicateId(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KeyQuestion {
    pub(crate) id: String,
    pub(crate) points: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerKeyDocument {
    pub(crate) questions: Vec<KeyQuestion>,
}

/// Normalized question-id to point-weight mapping plus the exam total.
#[derive(Debug, Clone)]
pub(crate) struct AnswerKeyIndex {
    points_by_id: HashMap<String, f64>,
    total_points: f64,
}

/// Matches grader output like "Q07" against a key stored as "7":
/// trim, lower-case, strip a leading "q", strip leading zeros.
pub(crate) fn normalize_id(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = lowered.strip_prefix('q').unwrap_or(&lowered);
    let stripped = stripped.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

pub(crate) fn parse_document(raw: &Value) -> Result<AnswerKeyDocument, AnswerKeyError> {
    let object = raw.as_object().ok_or(AnswerKeyError::NotAnObject)?;
    let questions = object
        .get("questions")
        .and_then(Value::as_array)
        .ok_or(AnswerKeyError::MissingQuestions)?;

    let mut parsed: Vec<KeyQuestion> = Vec::with_capacity(questions.len());
    let mut seen: HashMap<String, String> = HashMap::with_capacity(questions.len());
    for (position, question) in questions.iter().enumerate() {
        let id = match question.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(AnswerKeyError::MissingId(position)),
        };
        // "Q1" and "q01" would shadow each other in the point index.
        if let Some(earlier) = seen.insert(normalize_id(&id), id.clone()) {
            return Err(AnswerKeyError::DuplicateId(earlier, id));
        }
        let points = extract_points(question.get("points"), &id);
        parsed.push(KeyQuestion { id, points });
    }

    Ok(AnswerKeyDocument { questions: parsed })
}

/// Point extraction fallback: a missing or unparsable field degrades to
/// 1.0, never to zero and never to an error.
fn extract_points(raw: Option<&Value>, question_id: &str) -> f64 {
    match raw {
        Some(Value::Number(number)) => number.as_f64().unwrap_or_else(|| {
            tracing::warn!(question_id, "Answer key points not representable, defaulting to 1.0");
            DEFAULT_POINTS
        }),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or_else(|_| {
            tracing::warn!(question_id, points = %text, "Unparsable answer key points, defaulting to 1.0");
            DEFAULT_POINTS
        }),
        None => DEFAULT_POINTS,
        Some(other) => {
            tracing::warn!(question_id, points = %other, "Non-numeric answer key points, defaulting to 1.0");
            DEFAULT_POINTS
        }
    }
}

impl AnswerKeyIndex {
    pub(crate) fn build(document: &AnswerKeyDocument) -> Self {
        let mut points_by_id = HashMap::with_capacity(document.questions.len());
        for question in &document.questions {
            points_by_id.insert(normalize_id(&question.id), question.points);
        }
        // Summed over the deduplicated map so a key with shadowed ids
        // never reports more points than a submission can earn.
        let total_points = points_by_id.values().sum();
        Self { points_by_id, total_points }
    }

    pub(crate) fn lookup(&self, raw_id: &str) -> Option<f64> {
        self.points_by_id.get(&normalize_id(raw_id)).copied()
    }

    pub(crate) fn total_points(&self) -> f64 {
        self.total_points
    }

    pub(crate) fn len(&self) -> usize {
        self.points_by_id.len()
    }
}

/// The payload transmitted to the grading gateway: the stored key with
/// all point fields removed. The external grader only returns
/// correctness signals; weights stay local.
pub(crate) fn gateway_payload(raw: &Value) -> Value {
    let mut payload = raw.clone();
    if let Some(questions) = payload.get_mut("questions").and_then(Value::as_array_mut) {
        for question in questions {
            if let Some(object) = question.as_object_mut() {
                object.remove("points");
            }
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_strips_prefix_zeros_and_case() {
        assert_eq!(normalize_id("Q07"), "7");
        assert_eq!(normalize_id("  q12 "), "12");
        assert_eq!(normalize_id("7"), "7");
        assert_eq!(normalize_id("007"), "7");
        assert_eq!(normalize_id("Q0"), "0");
        assert_eq!(normalize_id("0"), "0");
    }

    #[test]
    fn parse_reads_numeric_and_string_ids() {
        let doc = parse_document(&json!({
            "questions": [
                {"id": "1", "points": 2.0},
                {"id": 2, "points": "1.5"},
            ]
        }))
        .expect("document");
        assert_eq!(doc.questions[0], KeyQuestion { id: "1".into(), points: 2.0 });
        assert_eq!(doc.questions[1], KeyQuestion { id: "2".into(), points: 1.5 });
    }

    #[test]
    fn parse_rejects_missing_questions() {
        assert!(matches!(
            parse_document(&json!({"items": []})),
            Err(AnswerKeyError::MissingQuestions)
        ));
        assert!(matches!(parse_document(&json!([1, 2])), Err(AnswerKeyError::NotAnObject)));
    }

    #[test]
    fn malformed_points_default_to_one() {
        let doc = parse_document(&json!({
            "questions": [
                {"id": "1"},
                {"id": "2", "points": {"nested": true}},
                {"id": "3", "points": "not a number"},
            ]
        }))
        .expect("document");
        assert!(doc.questions.iter().all(|question| question.points == 1.0));
    }

    #[test]
    fn parse_rejects_ids_that_collide_after_normalization() {
        let result = parse_document(&json!({
            "questions": [
                {"id": "Q1", "points": 2.0},
                {"id": "q01", "points": 3.0},
            ]
        }));
        assert!(matches!(
            result,
            Err(AnswerKeyError::DuplicateId(earlier, later))
                if earlier == "Q1" && later == "q01"
        ));
    }

    #[test]
    fn index_total_matches_awardable_points_under_shadowing() {
        // Stored keys predating the duplicate check may still collide.
        let document = AnswerKeyDocument {
            questions: vec![
                KeyQuestion { id: "Q1".into(), points: 2.0 },
                KeyQuestion { id: "q01".into(), points: 3.0 },
            ],
        };
        let index = AnswerKeyIndex::build(&document);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("1"), Some(3.0));
        assert_eq!(index.total_points(), 3.0);
    }

    #[test]
    fn index_total_is_exact_sum() {
        let doc = parse_document(&json!({
            "questions": [
                {"id": "1", "points": 2.0},
                {"id": "2", "points": 1.5},
                {"id": "3", "points": 0.5},
            ]
        }))
        .expect("document");
        let index = AnswerKeyIndex::build(&doc);
        assert_eq!(index.total_points(), 4.0);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn index_lookup_normalizes_grader_ids() {
        let doc = parse_document(&json!({
            "questions": [{"id": "7", "points": 3.0}]
        }))
        .expect("document");
        let index = AnswerKeyIndex::build(&doc);
        assert_eq!(index.lookup("Q07"), Some(3.0));
        assert_eq!(index.lookup("7"), Some(3.0));
        assert_eq!(index.lookup("8"), None);
    }

    #[test]
    fn gateway_payload_strips_points_only() {
        let raw = json!({
            "questions": [
                {"id": "1", "points": 2.0, "type": "mcq"},
                {"id": "2", "points": "1.5"},
            ]
        });
        let payload = gateway_payload(&raw);
        let questions = payload["questions"].as_array().unwrap();
        assert!(questions.iter().all(|question| question.get("points").is_none()));
        assert_eq!(questions[0]["type"], "mcq");
        // The stored document itself is untouched.
        assert!(raw["questions"][0].get("points").is_some());
    }
}
