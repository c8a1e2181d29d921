//! Persistence gateway for courses.
//!
//! `CourseStore` is the boundary the pipeline writes through: plain
//! find/create operations with no multi-document transactions. Uniqueness of
//! (name, user) topics and per-topic subtopic names is the store's job; the
//! pipeline's idempotent reuse does the rest. `MemoryStore` keeps keyed maps
//! behind `Arc<RwLock<..>>` and is also what the tests run against.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Difficulty, Quiz, QuizQuestion, Subtopic, Topic, UserQuizSnapshot};
use crate::error::StoreError;

#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Resolve the topic for (name, user), creating it on first request.
    /// A concurrent duplicate create resolves to the existing record.
    async fn find_or_create_topic(
        &self,
        name: &str,
        user_id: &str,
        difficulty: Difficulty,
    ) -> Result<Topic, StoreError>;

    /// Topic by id, scoped to its owner. None if absent or owned by someone else.
    async fn find_topic(&self, topic_id: &str, user_id: &str) -> Result<Option<Topic>, StoreError>;

    /// All topics owned by a user, newest first.
    async fn topics_for_user(&self, user_id: &str) -> Result<Vec<Topic>, StoreError>;

    /// Subtopics of a topic in insertion order.
    async fn subtopics_for_topic(&self, topic_id: &str) -> Result<Vec<Subtopic>, StoreError>;

    async fn find_subtopic_by_name(
        &self,
        topic_id: &str,
        name: &str,
    ) -> Result<Option<Subtopic>, StoreError>;

    /// Create a subtopic with its content. Name is unique within the topic.
    async fn create_subtopic(
        &self,
        topic_id: &str,
        name: &str,
        content: &str,
    ) -> Result<Subtopic, StoreError>;

    async fn create_quiz(
        &self,
        user_id: &str,
        quiz_name: &str,
        quiz_code: &str,
        questions: Vec<QuizQuestion>,
    ) -> Result<Quiz, StoreError>;

    /// Per-user copy of the quiz with empty answer slots.
    async fn create_snapshot(
        &self,
        quiz: &Quiz,
        user_id: &str,
    ) -> Result<UserQuizSnapshot, StoreError>;

    /// Link a quiz to its subtopic. Completes the subtopic.
    async fn attach_quiz(&self, subtopic_id: &str, quiz_id: &str) -> Result<(), StoreError>;

    async fn quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError>;
}

/// In-memory document store: one map per record kind plus two indexes
/// (topic identity key, subtopic insertion order per topic).
#[derive(Clone, Default)]
pub struct MemoryStore {
    topics: Arc<RwLock<HashMap<String, Topic>>>,
    topic_keys: Arc<RwLock<HashMap<(String, String), String>>>,
    subtopics: Arc<RwLock<HashMap<String, Subtopic>>>,
    by_topic: Arc<RwLock<HashMap<String, Vec<String>>>>,
    quizzes: Arc<RwLock<HashMap<String, Quiz>>>,
    snapshots: Arc<RwLock<HashMap<String, UserQuizSnapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot count, for tests and diagnostics.
    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn find_or_create_topic(
        &self,
        name: &str,
        user_id: &str,
        difficulty: Difficulty,
    ) -> Result<Topic, StoreError> {
        let key = (user_id.to_string(), name.to_string());
        // Hold both write locks so check-then-insert is atomic.
        let mut keys = self.topic_keys.write().await;
        let mut topics = self.topics.write().await;
        if let Some(id) = keys.get(&key) {
            if let Some(existing) = topics.get(id) {
                return Ok(existing.clone());
            }
        }
        let topic = Topic {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            difficulty,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        keys.insert(key, topic.id.clone());
        topics.insert(topic.id.clone(), topic.clone());
        Ok(topic)
    }

    async fn find_topic(&self, topic_id: &str, user_id: &str) -> Result<Option<Topic>, StoreError> {
        let topics = self.topics.read().await;
        Ok(topics.get(topic_id).filter(|t| t.user_id == user_id).cloned())
    }

    async fn topics_for_user(&self, user_id: &str) -> Result<Vec<Topic>, StoreError> {
        let topics = self.topics.read().await;
        let mut out: Vec<Topic> =
            topics.values().filter(|t| t.user_id == user_id).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn subtopics_for_topic(&self, topic_id: &str) -> Result<Vec<Subtopic>, StoreError> {
        let by_topic = self.by_topic.read().await;
        let subtopics = self.subtopics.read().await;
        let ids = by_topic.get(topic_id).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| subtopics.get(id).cloned()).collect())
    }

    async fn find_subtopic_by_name(
        &self,
        topic_id: &str,
        name: &str,
    ) -> Result<Option<Subtopic>, StoreError> {
        let by_topic = self.by_topic.read().await;
        let subtopics = self.subtopics.read().await;
        let ids = match by_topic.get(topic_id) {
            Some(ids) => ids,
            None => return Ok(None),
        };
        Ok(ids
            .iter()
            .filter_map(|id| subtopics.get(id))
            .find(|s| s.name == name)
            .cloned())
    }

    async fn create_subtopic(
        &self,
        topic_id: &str,
        name: &str,
        content: &str,
    ) -> Result<Subtopic, StoreError> {
        let mut by_topic = self.by_topic.write().await;
        let mut subtopics = self.subtopics.write().await;
        let ids = by_topic.entry(topic_id.to_string()).or_default();
        if ids.iter().filter_map(|id| subtopics.get(id)).any(|s| s.name == name) {
            return Err(StoreError::DuplicateSubtopic {
                topic_id: topic_id.to_string(),
                name: name.to_string(),
            });
        }
        let sub = Subtopic {
            id: Uuid::new_v4().to_string(),
            topic_id: topic_id.to_string(),
            name: name.to_string(),
            content: content.to_string(),
            quiz_id: None,
            created_at: Utc::now(),
        };
        ids.push(sub.id.clone());
        subtopics.insert(sub.id.clone(), sub.clone());
        Ok(sub)
    }

    async fn create_quiz(
        &self,
        user_id: &str,
        quiz_name: &str,
        quiz_code: &str,
        questions: Vec<QuizQuestion>,
    ) -> Result<Quiz, StoreError> {
        let quiz = Quiz {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            quiz_name: quiz_name.to_string(),
            quiz_code: quiz_code.to_string(),
            questions,
            created_at: Utc::now(),
        };
        self.quizzes.write().await.insert(quiz.id.clone(), quiz.clone());
        Ok(quiz)
    }

    async fn create_snapshot(
        &self,
        quiz: &Quiz,
        user_id: &str,
    ) -> Result<UserQuizSnapshot, StoreError> {
        let snap = UserQuizSnapshot::from_quiz(quiz, user_id);
        self.snapshots.write().await.insert(snap.id.clone(), snap.clone());
        Ok(snap)
    }

    async fn attach_quiz(&self, subtopic_id: &str, quiz_id: &str) -> Result<(), StoreError> {
        let mut subtopics = self.subtopics.write().await;
        match subtopics.get_mut(subtopic_id) {
            Some(sub) => {
                sub.quiz_id = Some(quiz_id.to_string());
                Ok(())
            }
            None => Err(StoreError::SubtopicNotFound(subtopic_id.to_string())),
        }
    }

    async fn quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError> {
        Ok(self.quizzes.read().await.get(quiz_id).cloned())
    }
}
