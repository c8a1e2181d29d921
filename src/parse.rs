//! Decoding of raw provider output into domain shapes.
//!
//! Providers wrap JSON payloads in markdown code fences more often than not,
//! sometimes twice. `strip_fences` peels those off before any structural
//! decoding. A decode failure after stripping is reported as
//! [`GenerateError::Unparsable`]; a payload that decodes but violates the
//! fixed-shape contract is [`GenerateError::Shape`]. Nothing here defaults
//! silently.

use std::collections::HashSet;

use serde::Deserialize;

use crate::domain::QuizQuestion;
use crate::error::GenerateError;
use crate::util::trunc_for_log;

/// Remove leading/trailing markdown fences (``` or ```json), tolerating
/// surrounding whitespace and doubled markers. Idempotent.
pub fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    loop {
        let mut changed = false;
        for opener in ["```json", "```"] {
            if let Some(rest) = s.strip_prefix(opener) {
                s = rest.trim_start();
                changed = true;
                break;
            }
        }
        if let Some(rest) = s.strip_suffix("```") {
            s = rest.trim_end();
            changed = true;
        }
        if !changed {
            return s;
        }
    }
}

/// Decode a subtopic-name list and enforce "exactly `expected` non-empty names".
pub fn subtopic_names(raw: &str, expected: usize) -> Result<Vec<String>, GenerateError> {
    let payload = strip_fences(raw);
    let names: Vec<String> = serde_json::from_str(payload)
        .map_err(|e| GenerateError::Unparsable(format!("{e}: {}", trunc_for_log(payload, 160))))?;

    if names.len() != expected {
        return Err(GenerateError::Shape(format!(
            "expected {expected} subtopic names, got {}",
            names.len()
        )));
    }
    let names: Vec<String> = names.into_iter().map(|n| n.trim().to_string()).collect();
    if names.iter().any(|n| n.is_empty()) {
        return Err(GenerateError::Shape("empty subtopic name in list".into()));
    }
    Ok(names)
}

#[derive(Deserialize)]
struct QuizPayload {
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    correct_answer: String,
}

/// Decode a quiz payload and enforce the full shape contract: exactly
/// `expected_questions` questions, each with non-empty text, exactly
/// `expected_options` distinct options, and a correct answer drawn from them.
pub fn quiz_questions(
    raw: &str,
    expected_questions: usize,
    expected_options: usize,
) -> Result<Vec<QuizQuestion>, GenerateError> {
    let payload = strip_fences(raw);
    let quiz: QuizPayload = serde_json::from_str(payload)
        .map_err(|e| GenerateError::Unparsable(format!("{e}: {}", trunc_for_log(payload, 160))))?;

    if quiz.questions.len() != expected_questions {
        return Err(GenerateError::Shape(format!(
            "expected {expected_questions} questions, got {}",
            quiz.questions.len()
        )));
    }

    let mut out = Vec::with_capacity(quiz.questions.len());
    for (i, q) in quiz.questions.into_iter().enumerate() {
        if q.question.trim().is_empty() {
            return Err(GenerateError::Shape(format!("question {} has empty text", i + 1)));
        }
        if q.options.len() != expected_options {
            return Err(GenerateError::Shape(format!(
                "question {} has {} options, expected {expected_options}",
                i + 1,
                q.options.len()
            )));
        }
        let distinct: HashSet<&str> = q.options.iter().map(String::as_str).collect();
        if distinct.len() != q.options.len() {
            return Err(GenerateError::Shape(format!("question {} has duplicate options", i + 1)));
        }
        if !q.options.iter().any(|o| o == &q.correct_answer) {
            return Err(GenerateError::Shape(format!(
                "question {} correct answer is not one of its options",
                i + 1
            )));
        }
        out.push(QuizQuestion {
            question: q.question,
            options: q.options,
            correct_answer: q.correct_answer,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ_OK: &str = r#"{"questions": [
        {"question": "Q1", "options": ["a", "b", "c", "d"], "correctAnswer": "a"},
        {"question": "Q2", "options": ["e", "f", "g", "h"], "correctAnswer": "h"}
    ]}"#;

    #[test]
    fn strips_single_fence_with_whitespace() {
        let wrapped = "\n  ```json\n[\"A\"]\n```  \n";
        assert_eq!(strip_fences(wrapped), "[\"A\"]");
    }

    #[test]
    fn strips_doubled_fences() {
        let wrapped = "``````json\n[\"A\", \"B\"]\n``````";
        assert_eq!(strip_fences(wrapped), "[\"A\", \"B\"]");
    }

    #[test]
    fn unwrapped_payload_is_untouched() {
        assert_eq!(strip_fences("[\"A\"]"), "[\"A\"]");
    }

    #[test]
    fn wrapped_and_unwrapped_decode_identically() {
        let plain = subtopic_names("[\"A\", \"B\"]", 2).unwrap();
        let fenced = subtopic_names("```json\n[\"A\", \"B\"]\n```", 2).unwrap();
        assert_eq!(plain, fenced);
    }

    #[test]
    fn subtopic_list_wrong_length_is_shape_error() {
        let err = subtopic_names("[\"A\", \"B\"]", 3).unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }

    #[test]
    fn subtopic_list_empty_name_rejected() {
        let err = subtopic_names("[\"A\", \"  \"]", 2).unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }

    #[test]
    fn subtopic_list_not_json_is_unparsable() {
        let err = subtopic_names("Here are your subtopics: A, B", 2).unwrap_err();
        assert!(matches!(err, GenerateError::Unparsable(_)), "{err}");
    }

    #[test]
    fn quiz_decodes() {
        let questions = quiz_questions(QUIZ_OK, 2, 4).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].correct_answer, "h");
    }

    #[test]
    fn quiz_wrong_question_count_rejected() {
        let err = quiz_questions(QUIZ_OK, 5, 4).unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }

    #[test]
    fn quiz_wrong_option_count_rejected() {
        let raw = r#"{"questions": [
            {"question": "Q1", "options": ["a", "b", "c"], "correctAnswer": "a"}
        ]}"#;
        let err = quiz_questions(raw, 1, 4).unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }

    #[test]
    fn quiz_duplicate_options_rejected() {
        let raw = r#"{"questions": [
            {"question": "Q1", "options": ["a", "a", "c", "d"], "correctAnswer": "a"}
        ]}"#;
        let err = quiz_questions(raw, 1, 4).unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }

    #[test]
    fn quiz_correct_answer_outside_options_rejected() {
        let raw = r#"{"questions": [
            {"question": "Q1", "options": ["a", "b", "c", "d"], "correctAnswer": "z"}
        ]}"#;
        let err = quiz_questions(raw, 1, 4).unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }
}
