//! Score reconciliation: the authoritative score is always recomputed
//! locally from the grader's correctness flags and the teacher's point
//! weights. The score field the gateway reports is informational only
//! and is never persisted.

use serde::{Deserialize, Serialize};

use crate::services::answer_key::AnswerKeyIndex;
use crate::services::grading_gateway::{GradeResult, ScannedBarcode};

const FILENAME_MARKER: &str = "(Student:";

const FALLBACK_POINTS: f64 = 1.0;

/// A per-question outcome with its resolved point weight attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReconciledOutcome {
    pub(crate) id: String,
    pub(crate) r#type: String,
    pub(crate) ground_truth: String,
    pub(crate) prediction: String,
    pub(crate) confidence: f64,
    pub(crate) is_correct: bool,
    pub(crate) match_method: String,
    pub(crate) points: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct ReconciledResult {
    pub(crate) student_id: i32,
    pub(crate) final_score: f64,
    pub(crate) total_points: f64,
    pub(crate) outcomes: Vec<ReconciledOutcome>,
    pub(crate) annotated_image_url: Option<String>,
}

pub(crate) struct IdentityContext<'a> {
    pub(crate) result: &'a GradeResult,
    pub(crate) position: usize,
    pub(crate) scanned: &'a [ScannedBarcode],
}

type Resolver = fn(&IdentityContext<'_>) -> Option<i32>;

/// Identity signals in strict priority order; the first resolver that
/// yields a nonzero id wins.
const RESOLVERS: &[(&str, Resolver)] = &[
    ("student_info", resolve_from_student_info),
    ("filename_marker", resolve_from_filename),
    ("scan_position", resolve_from_scan_position),
];

fn resolve_from_student_info(ctx: &IdentityContext<'_>) -> Option<i32> {
    ctx.result.student_info.as_ref()?.student_id.as_ref()?.trim().parse().ok()
}

fn resolve_from_filename(ctx: &IdentityContext<'_>) -> Option<i32> {
    let filename = &ctx.result.filename;
    let start = filename.find(FILENAME_MARKER)? + FILENAME_MARKER.len();
    let rest = &filename[start..];
    let end = rest.find(')')?;
    rest[..end].trim().parse().ok()
}

fn resolve_from_scan_position(ctx: &IdentityContext<'_>) -> Option<i32> {
    ctx.scanned.get(ctx.position)?.student_id.trim().parse().ok()
}

pub(crate) fn resolve_identity(ctx: &IdentityContext<'_>) -> Option<i32> {
    for (signal, resolver) in RESOLVERS {
        if let Some(student_id) = resolver(ctx).filter(|id| *id != 0) {
            tracing::debug!(signal, student_id, "Resolved student identity");
            return Some(student_id);
        }
    }
    None
}

/// Reconciles one gateway result against the answer-key index. Returns
/// `None` when no identity signal yields a nonzero student id; the
/// caller skips such results without failing the batch.
pub(crate) fn reconcile(
    result: &GradeResult,
    position: usize,
    scanned: &[ScannedBarcode],
    index: &AnswerKeyIndex,
) -> Option<ReconciledResult> {
    let ctx = IdentityContext { result, position, scanned };
    let Some(student_id) = resolve_identity(&ctx) else {
        tracing::warn!(
            filename = %result.filename,
            position,
            "No identity signal resolved, skipping result"
        );
        return None;
    };

    let mut final_score = 0.0;
    let mut outcomes = Vec::with_capacity(result.details.details.len());
    for outcome in &result.details.details {
        // Independent fallback from the key's own point defaulting: this
        // one fires when the grader returns an id absent from the key.
        let points = index.lookup(&outcome.id).unwrap_or_else(|| {
            tracing::debug!(
                question_id = %outcome.id,
                "Outcome id not in answer key, defaulting weight to 1.0"
            );
            FALLBACK_POINTS
        });

        if outcome.ok {
            final_score += points;
        }

        outcomes.push(ReconciledOutcome {
            id: outcome.id.clone(),
            r#type: outcome.r#type.clone(),
            ground_truth: outcome.gt.clone(),
            prediction: outcome.pred.clone(),
            confidence: outcome.conf,
            is_correct: outcome.ok,
            match_method: outcome.method.clone(),
            points,
        });
    }

    Some(ReconciledResult {
        student_id,
        final_score,
        // The full key total, never a sum over only the questions the
        // grader happened to recognize.
        total_points: index.total_points(),
        outcomes,
        annotated_image_url: result.annotated_image_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::answer_key::{parse_document, AnswerKeyIndex};
    use crate::services::grading_gateway::{GradeDetails, QuestionResult, StudentInfo};
    use serde_json::json;

    fn index(questions: serde_json::Value) -> AnswerKeyIndex {
        AnswerKeyIndex::build(&parse_document(&json!({ "questions": questions })).unwrap())
    }

    fn outcome(id: &str, ok: bool) -> QuestionResult {
        QuestionResult {
            id: id.to_string(),
            r#type: "mcq".to_string(),
            gt: "A".to_string(),
            pred: if ok { "A" } else { "B" }.to_string(),
            conf: 0.9,
            ok,
            method: "vision".to_string(),
        }
    }

    fn grade_result(
        filename: &str,
        student_info: Option<&str>,
        details: Vec<QuestionResult>,
    ) -> GradeResult {
        GradeResult {
            filename: filename.to_string(),
            student_info: student_info
                .map(|id| StudentInfo { student_id: Some(id.to_string()) }),
            details: GradeDetails { score: 0.0, total: 0.0, details },
            annotated_image_url: None,
        }
    }

    fn barcode(student_id: &str) -> ScannedBarcode {
        ScannedBarcode {
            exam_id: "5".to_string(),
            student_id: student_id.to_string(),
            page_number: "1".to_string(),
            raw_barcode: format!("5-{student_id}-1"),
        }
    }

    #[test]
    fn student_info_outranks_filename_marker() {
        let result = grade_result("scan (Student:9).jpg", Some("7"), vec![]);
        let ctx = IdentityContext { result: &result, position: 0, scanned: &[] };
        assert_eq!(resolve_identity(&ctx), Some(7));
    }

    #[test]
    fn filename_marker_outranks_scan_position() {
        let result = grade_result("scan (Student:9).jpg", None, vec![]);
        let scanned = vec![barcode("12")];
        let ctx = IdentityContext { result: &result, position: 0, scanned: &scanned };
        assert_eq!(resolve_identity(&ctx), Some(9));
    }

    #[test]
    fn scan_position_pairs_nth_result_with_nth_barcode() {
        let result = grade_result("sheet.jpg", None, vec![]);
        let scanned = vec![barcode("12"), barcode("31")];
        let ctx = IdentityContext { result: &result, position: 1, scanned: &scanned };
        assert_eq!(resolve_identity(&ctx), Some(31));
    }

    #[test]
    fn zero_id_signal_falls_through_to_next_resolver() {
        let result = grade_result("scan (Student:9).jpg", Some("0"), vec![]);
        let ctx = IdentityContext { result: &result, position: 0, scanned: &[] };
        assert_eq!(resolve_identity(&ctx), Some(9));
    }

    #[test]
    fn unresolvable_identity_skips_the_result() {
        let result = grade_result("sheet.jpg", None, vec![outcome("1", true)]);
        let idx = index(json!([{"id": "1", "points": 2.0}]));
        assert!(reconcile(&result, 0, &[], &idx).is_none());
    }

    #[test]
    fn incorrect_outcomes_never_award_points() {
        let result = grade_result(
            "scan (Student:12).jpg",
            None,
            vec![outcome("1", false), outcome("2", false)],
        );
        let idx = index(json!([
            {"id": "1", "points": 5.0},
            {"id": "2", "points": 5.0}
        ]));
        let reconciled = reconcile(&result, 0, &[], &idx).expect("reconciled");
        assert_eq!(reconciled.final_score, 0.0);
        assert_eq!(reconciled.outcomes[0].points, 5.0);
    }

    #[test]
    fn weighted_scoring_scenario() {
        // Two questions weighted 2.0 and 1.5; only the first is correct.
        let result = grade_result(
            "scan (Student:12).jpg",
            None,
            vec![outcome("Q1", true), outcome("q2", false)],
        );
        let idx = index(json!([
            {"id": "q1", "points": 2.0},
            {"id": "q2", "points": 1.5}
        ]));
        let reconciled = reconcile(&result, 0, &[], &idx).expect("reconciled");
        assert_eq!(reconciled.final_score, 2.0);
        assert_eq!(reconciled.total_points, 3.5);
    }

    #[test]
    fn total_stays_full_when_outcomes_are_a_subset() {
        let result =
            grade_result("scan (Student:12).jpg", None, vec![outcome("1", true)]);
        let idx = index(json!([
            {"id": "1", "points": 1.0},
            {"id": "2", "points": 1.0},
            {"id": "3", "points": 1.0}
        ]));
        let reconciled = reconcile(&result, 0, &[], &idx).expect("reconciled");
        assert_eq!(reconciled.final_score, 1.0);
        assert_eq!(reconciled.total_points, 3.0);
    }

    #[test]
    fn unknown_outcome_id_defaults_to_one_point() {
        let result =
            grade_result("scan (Student:12).jpg", None, vec![outcome("99", true)]);
        let idx = index(json!([{"id": "1", "points": 4.0}]));
        let reconciled = reconcile(&result, 0, &[], &idx).expect("reconciled");
        assert_eq!(reconciled.final_score, 1.0);
        assert_eq!(reconciled.outcomes[0].points, 1.0);
        assert_eq!(reconciled.total_points, 4.0);
    }
}
