//! Domain models: topics, subtopics, quizzes, and the per-user quiz snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Requested depth of a course. Closed set; free-text difficulties are rejected
/// at the protocol boundary.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
        }
    }
}

/// A user-scoped named subject. Identity is (name, user_id); resolution is
/// find-or-create, never duplicate-create.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// One curriculum unit under a topic. `quiz_id` is None while the quiz half of
/// the pipeline has not completed for this record; such a record counts as
/// pending, not done.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subtopic {
    pub id: String,
    pub topic_id: String,
    pub name: String,
    pub content: String,
    pub quiz_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Subtopic {
    /// Done means "has content AND a linked quiz" — a same-named record left
    /// behind by a failed earlier pass is not complete.
    pub fn is_complete(&self) -> bool {
        !self.content.trim().is_empty() && self.quiz_id.is_some()
    }
}

/// One multiple-choice question. Shape is validated before a quiz is ever
/// persisted: exactly `options_per_question` distinct options, and
/// `correct_answer` must be one of them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// The canonical quiz for a subtopic (1:1). Never mutated after creation;
/// user answers go to the per-user snapshot instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub user_id: String,
    pub quiz_name: String,
    pub quiz_code: String,
    pub questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
}

/// A snapshot question carries a mutable answer slot, empty at creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub user_answer: String,
}

/// Per-user copy of a quiz, created alongside the quiz so that the separate
/// quiz-attempt flow never mutates the canonical record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserQuizSnapshot {
    pub id: String,
    pub quiz_code: String,
    pub quiz_name: String,
    pub quiz_creator_id: String,
    pub user_id: String,
    pub questions: Vec<SnapshotQuestion>,
    pub created_at: DateTime<Utc>,
}

impl UserQuizSnapshot {
    pub fn from_quiz(quiz: &Quiz, user_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            quiz_code: quiz.quiz_code.clone(),
            quiz_name: quiz.quiz_name.clone(),
            quiz_creator_id: quiz.user_id.clone(),
            user_id: user_id.to_string(),
            questions: quiz
                .questions
                .iter()
                .map(|q| SnapshotQuestion {
                    question: q.question.clone(),
                    options: q.options.clone(),
                    correct_answer: q.correct_answer.clone(),
                    user_answer: String::new(),
                })
                .collect(),
            created_at: Utc::now(),
        }
    }
}

/// One subtopic joined with its quiz, as served to clients.
#[derive(Clone, Debug)]
pub struct SubtopicView {
    pub subtopic: Subtopic,
    pub quiz: Option<Quiz>,
}

/// Assembled course. Ephemeral: rebuilt from the store on every read,
/// subtopics ordered by creation time.
#[derive(Clone, Debug)]
pub struct CourseView {
    pub topic: Topic,
    pub subtopics: Vec<SubtopicView>,
}
