// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Question type: single choice (exactly one correct index) or multiple
/// choice (the correct set must match exactly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
}

/// One quiz question inside an immutable [`QuizSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_question))]
pub struct Question {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,

    /// Mapped from the wire field `type` since `type` is a reserved keyword in Rust.
    #[serde(rename = "type")]
    pub kind: QuestionKind,

    /// 2 to 6 option strings.
    #[validate(length(min = 2, max = 6))]
    pub options: Vec<String>,

    /// Indices into `options` forming the correct-answer set.
    pub correct: Vec<usize>,

    /// Countdown for this question, in whole seconds.
    #[validate(range(min = 5, max = 300))]
    pub time_limit: u64,

    #[validate(range(min = 10, max = 1000))]
    pub points: u32,
}

/// The immutable quiz definition a room is created with.
///
/// Authoring and storage of quizzes live outside this service; the snapshot
/// arrives fully formed in the room-creation request and is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizSnapshot {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(min = 1), nested)]
    pub questions: Vec<Question>,

    /// Suppress correct-answer and per-player detail from non-host clients.
    #[serde(default)]
    pub hide_results: bool,

    /// Cosmetic-effects flag, echoed to clients verbatim.
    #[serde(default)]
    pub fun_mode: bool,
}

/// Cross-field checks `validator` field attributes cannot express: the
/// correct set must be non-empty, in range, duplicate-free, and a single
/// choice question must have exactly one correct index.
fn validate_question(question: &Question) -> Result<(), validator::ValidationError> {
    if question.correct.is_empty() {
        return Err(validator::ValidationError::new("correct_set_empty"));
    }
    if question.kind == QuestionKind::Single && question.correct.len() != 1 {
        return Err(validator::ValidationError::new("single_needs_one_correct"));
    }
    let mut seen = std::collections::HashSet::new();
    for &index in &question.correct {
        if index >= question.options.len() {
            return Err(validator::ValidationError::new("correct_index_out_of_range"));
        }
        if !seen.insert(index) {
            return Err(validator::ValidationError::new("correct_index_duplicated"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn question() -> Question {
        Question {
            text: "What is 2 + 2?".to_string(),
            kind: QuestionKind::Single,
            options: vec!["3".to_string(), "4".to_string(), "5".to_string()],
            correct: vec![1],
            time_limit: 30,
            points: 100,
        }
    }

    #[test]
    fn valid_question_passes() {
        assert!(question().validate().is_ok());
    }

    #[test]
    fn empty_correct_set_rejected() {
        let mut q = question();
        q.correct = vec![];
        assert!(q.validate().is_err());
    }

    #[test]
    fn out_of_range_correct_index_rejected() {
        let mut q = question();
        q.correct = vec![3];
        assert!(q.validate().is_err());
    }

    #[test]
    fn single_with_two_correct_rejected() {
        let mut q = question();
        q.correct = vec![0, 1];
        assert!(q.validate().is_err());
    }

    #[test]
    fn multiple_with_two_correct_accepted() {
        let mut q = question();
        q.kind = QuestionKind::Multiple;
        q.correct = vec![0, 1];
        assert!(q.validate().is_ok());
    }

    #[test]
    fn time_limit_out_of_bounds_rejected() {
        let mut q = question();
        q.time_limit = 3;
        assert!(q.validate().is_err());
        q.time_limit = 301;
        assert!(q.validate().is_err());
    }

    #[test]
    fn snapshot_requires_questions() {
        let snapshot = QuizSnapshot {
            name: "Empty".to_string(),
            questions: vec![],
            hide_results: false,
            fun_mode: false,
        };
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn question_type_uses_wire_name() {
        let json = serde_json::to_value(question()).unwrap();
        assert_eq!(json["type"], "single");
    }
}
