//! Domain-specialized generation helpers over the raw text provider.
//!
//! Each helper wraps one `TextSource` call with a prompt template and a
//! validation contract. None of them retries internally: a malformed result
//! is a permanent error for that call, and recovery belongs to the pipeline.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{Limits, Prompts};
use crate::domain::{Difficulty, QuizQuestion};
use crate::error::GenerateError;
use crate::parse;
use crate::provider::TextSource;
use crate::util::fill_template;

#[derive(Clone)]
pub struct CourseGenerator {
    source: Arc<dyn TextSource>,
    prompts: Prompts,
    limits: Limits,
}

impl CourseGenerator {
    pub fn new(source: Arc<dyn TextSource>, prompts: Prompts, limits: Limits) -> Self {
        Self { source, prompts, limits }
    }

    /// Exactly `subtopics_per_course` non-empty candidate names for a topic.
    #[instrument(level = "info", skip(self), fields(%topic, %difficulty))]
    pub async fn subtopic_names(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<String>, GenerateError> {
        let count = self.limits.subtopics_per_course;
        let user = fill_template(
            &self.prompts.subtopics_user_template,
            &[
                ("topic", topic),
                ("difficulty", &difficulty.to_string()),
                ("count", &count.to_string()),
            ],
        );
        let raw = self.source.complete(&self.prompts.subtopics_system, &user, 0.9).await?;
        let names = parse::subtopic_names(&raw, count)?;
        info!(target: "course", %topic, count = names.len(), "Subtopic candidates generated");
        Ok(names)
    }

    /// Long-form prose for one subtopic. Accepted as opaque text; the only
    /// contract is non-emptiness.
    #[instrument(level = "info", skip(self), fields(%topic, %subtopic, %difficulty))]
    pub async fn lesson_content(
        &self,
        topic: &str,
        subtopic: &str,
        difficulty: Difficulty,
    ) -> Result<String, GenerateError> {
        let user = fill_template(
            &self.prompts.content_user_template,
            &[
                ("topic", topic),
                ("subtopic", subtopic),
                ("difficulty", &difficulty.to_string()),
            ],
        );
        let raw = self.source.complete(&self.prompts.content_system, &user, 0.7).await?;
        let content = raw.trim().to_string();
        if content.is_empty() {
            return Err(GenerateError::Shape("empty lesson content".into()));
        }
        info!(target: "course", %subtopic, content_len = content.len(), "Lesson content generated");
        Ok(content)
    }

    /// A fixed-shape quiz for one subtopic: `questions_per_quiz` questions,
    /// `options_per_question` distinct options each, correct answer included.
    #[instrument(level = "info", skip(self), fields(%topic, %subtopic, %difficulty))]
    pub async fn quiz_questions(
        &self,
        topic: &str,
        subtopic: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<QuizQuestion>, GenerateError> {
        let user = fill_template(
            &self.prompts.quiz_user_template,
            &[
                ("topic", topic),
                ("subtopic", subtopic),
                ("difficulty", &difficulty.to_string()),
                ("count", &self.limits.questions_per_quiz.to_string()),
                ("options", &self.limits.options_per_question.to_string()),
            ],
        );
        let raw = self.source.complete(&self.prompts.quiz_system, &user, 0.7).await?;
        let questions = parse::quiz_questions(
            &raw,
            self.limits.questions_per_quiz,
            self.limits.options_per_question,
        )?;
        info!(target: "course", %subtopic, questions = questions.len(), "Quiz generated");
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    /// Returns the same canned text for every call.
    struct Canned(String);

    #[async_trait]
    impl TextSource for Canned {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _temperature: f32,
        ) -> Result<String, GenerateError> {
            Ok(self.0.clone())
        }
    }

    fn generator(reply: &str, limits: Limits) -> CourseGenerator {
        CourseGenerator::new(Arc::new(Canned(reply.into())), Prompts::default(), limits)
    }

    fn small_limits() -> Limits {
        Limits { subtopics_per_course: 2, questions_per_quiz: 1, ..Limits::default() }
    }

    #[tokio::test]
    async fn subtopic_names_accepts_fenced_list() {
        let gen = generator("```json\n[\"Paths\", \"Cycles\"]\n```", small_limits());
        let names = gen.subtopic_names("Graphs", Difficulty::Intermediate).await.unwrap();
        assert_eq!(names, vec!["Paths", "Cycles"]);
    }

    #[tokio::test]
    async fn subtopic_names_wrong_count_is_permanent_error() {
        let gen = generator("[\"Only one\"]", small_limits());
        let err = gen.subtopic_names("Graphs", Difficulty::Beginner).await.unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }

    #[tokio::test]
    async fn lesson_content_rejects_whitespace_only() {
        let gen = generator("   \n  ", small_limits());
        let err =
            gen.lesson_content("Graphs", "Paths", Difficulty::Beginner).await.unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }

    #[tokio::test]
    async fn quiz_questions_validates_shape() {
        let ok = r#"{"questions": [
            {"question": "Q1", "options": ["a", "b", "c", "d"], "correctAnswer": "b"}
        ]}"#;
        let gen = generator(ok, small_limits());
        let questions =
            gen.quiz_questions("Graphs", "Paths", Difficulty::Beginner).await.unwrap();
        assert_eq!(questions.len(), 1);

        let bad = r#"{"questions": [
            {"question": "Q1", "options": ["a", "b"], "correctAnswer": "b"}
        ]}"#;
        let gen = generator(bad, small_limits());
        let err = gen.quiz_questions("Graphs", "Paths", Difficulty::Beginner).await.unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
    }
}
