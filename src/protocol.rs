//! Public request/response structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CourseView, Difficulty, Quiz, SubtopicView, Topic};

#[derive(Debug, Deserialize)]
pub struct CreateCourseIn {
    pub topic: String,
    pub difficulty: Difficulty,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicOut {
    pub id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOut {
    pub id: String,
    pub quiz_name: String,
    pub quiz_code: String,
    pub questions: Vec<QuestionOut>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtopicOut {
    pub id: String,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub quiz: Option<QuizOut>,
}

/// Full assembled course, as returned by create and read endpoints.
#[derive(Debug, Serialize)]
pub struct CourseOut {
    pub topic: TopicOut,
    pub subtopics: Vec<SubtopicOut>,
}

/// One row of the course list: topic metadata plus its subtopic count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummaryOut {
    pub id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
    pub subtopic_count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

fn quiz_out(q: &Quiz) -> QuizOut {
    QuizOut {
        id: q.id.clone(),
        quiz_name: q.quiz_name.clone(),
        quiz_code: q.quiz_code.clone(),
        questions: q
            .questions
            .iter()
            .map(|question| QuestionOut {
                question: question.question.clone(),
                options: question.options.clone(),
                correct_answer: question.correct_answer.clone(),
            })
            .collect(),
    }
}

fn subtopic_out(sv: &SubtopicView) -> SubtopicOut {
    SubtopicOut {
        id: sv.subtopic.id.clone(),
        name: sv.subtopic.name.clone(),
        content: sv.subtopic.content.clone(),
        created_at: sv.subtopic.created_at,
        quiz: sv.quiz.as_ref().map(quiz_out),
    }
}

/// Convert the internal course view to the public DTO.
pub fn course_out(view: &CourseView) -> CourseOut {
    CourseOut {
        topic: TopicOut {
            id: view.topic.id.clone(),
            name: view.topic.name.clone(),
            difficulty: view.topic.difficulty,
            created_at: view.topic.created_at,
        },
        subtopics: view.subtopics.iter().map(subtopic_out).collect(),
    }
}

pub fn summary_out(topic: &Topic, subtopic_count: usize) -> CourseSummaryOut {
    CourseSummaryOut {
        id: topic.id.clone(),
        name: topic.name.clone(),
        difficulty: topic.difficulty,
        created_at: topic.created_at,
        subtopic_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_course_in_uses_camel_case_user_id() {
        let body = r#"{"topic": "Graphs", "difficulty": "intermediate", "userId": "u1"}"#;
        let parsed: CreateCourseIn = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.topic, "Graphs");
        assert_eq!(parsed.difficulty, Difficulty::Intermediate);
        assert_eq!(parsed.user_id, "u1");
    }

    #[test]
    fn unknown_difficulty_is_rejected() {
        let body = r#"{"topic": "Graphs", "difficulty": "expert", "userId": "u1"}"#;
        assert!(serde_json::from_str::<CreateCourseIn>(body).is_err());
    }
}
