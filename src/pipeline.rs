//! The course-generation pipeline.
//!
//! Flow for one request:
//! 1) resolve the topic (find-or-create),
//! 2) short-circuit if the course is already complete,
//! 3) ask the provider for candidate subtopic names (all-or-nothing),
//! 4) fill the missing candidates in bounded-retry passes,
//! 5) reassemble the course from the store, ordered by creation time.
//!
//! A candidate is accepted only once its record has content AND a linked
//! quiz. Failures inside a pass reduce that pass's yield and nothing else;
//! the candidate stays pending for the next pass. After the retry ceiling
//! the request fails with the shortfall, and everything accepted so far
//! stays persisted for a later call to resume from.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::Limits;
use crate::domain::{CourseView, Difficulty, Subtopic, SubtopicView, Topic};
use crate::error::{GenerateError, StoreError};
use crate::generate::CourseGenerator;
use crate::store::CourseStore;
use crate::util::share_code;

#[derive(Clone)]
pub struct CoursePipeline {
    store: Arc<dyn CourseStore>,
    generator: CourseGenerator,
    limits: Limits,
}

impl CoursePipeline {
    pub fn new(store: Arc<dyn CourseStore>, generator: CourseGenerator, limits: Limits) -> Self {
        Self { store, generator, limits }
    }

    /// Turn (topic name, difficulty, user) into a complete persisted course,
    /// or fail with the shortfall after the retry ceiling.
    #[instrument(level = "info", skip(self), fields(%topic_name, %difficulty, %user_id))]
    pub async fn generate_course(
        &self,
        topic_name: &str,
        difficulty: Difficulty,
        user_id: &str,
    ) -> Result<CourseView, GenerateError> {
        let target = self.limits.subtopics_per_course;

        let topic = self.store.find_or_create_topic(topic_name, user_id, difficulty).await?;

        let existing = self.store.subtopics_for_topic(&topic.id).await?;
        let complete_names: HashSet<String> =
            existing.iter().filter(|s| s.is_complete()).map(|s| s.name.clone()).collect();
        let mut completed = complete_names.len();
        if completed >= target {
            info!(target: "course", topic = %topic.name, completed, "Course already complete; skipping generation");
            return assemble_course(self.store.as_ref(), &topic).await.map_err(Into::into);
        }

        // One shot; a malformed or wrong-length list fails the whole request.
        let candidates = self.generator.subtopic_names(&topic.name, topic.difficulty).await?;

        // Pending = candidate names not yet complete, deduplicated, capped at
        // what the course still needs.
        let mut seen = HashSet::new();
        let mut pending: Vec<String> = candidates
            .into_iter()
            .filter(|n| !complete_names.contains(n) && seen.insert(n.clone()))
            .take(target - completed)
            .collect();

        for pass in 1..=self.limits.max_passes {
            if pending.is_empty() {
                break;
            }
            info!(target: "course", topic = %topic.name, pass, pending = pending.len(), "Starting fill pass");
            let done = self.run_pass(&topic, &pending, pass).await;
            completed += done.len();
            pending.retain(|n| !done.contains(n));

            if pending.is_empty() {
                break;
            }
            if pass < self.limits.max_passes {
                info!(target: "course", topic = %topic.name, pass, missing = pending.len(), "Pass incomplete; retrying after delay");
                tokio::time::sleep(Duration::from_millis(self.limits.pass_delay_ms)).await;
            }
        }

        if completed < target {
            warn!(target: "course", topic = %topic.name, completed, target, "Generation incomplete after retry ceiling");
            return Err(GenerateError::Incomplete { completed, target });
        }

        assemble_course(self.store.as_ref(), &topic).await.map_err(Into::into)
    }

    /// Run one pass over the pending candidates, bounded by the concurrency
    /// limit. Returns the names accepted this pass. Candidate tasks are
    /// detached: a dropped request future stops scheduling further passes,
    /// but in-flight candidates finish and persist.
    async fn run_pass(&self, topic: &Topic, pending: &[String], pass: usize) -> HashSet<String> {
        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent));
        let mut handles = Vec::with_capacity(pending.len());

        for name in pending {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                // Only reachable if the semaphore were closed; we never close it.
                Err(_) => break,
            };
            let store = self.store.clone();
            let generator = self.generator.clone();
            let topic = topic.clone();
            let candidate = name.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                fill_candidate(store, generator, &topic, &candidate).await
            });
            handles.push((name.clone(), handle));
        }

        let mut done = HashSet::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {
                    done.insert(name);
                }
                Ok(Err(e)) => {
                    warn!(target: "course", pass, subtopic = %name, error = %e, "Candidate failed this pass");
                }
                Err(e) => {
                    warn!(target: "course", pass, subtopic = %name, error = %e, "Candidate task aborted");
                }
            }
        }
        done
    }
}

/// Complete one candidate: reuse, repair, or generate from scratch.
async fn fill_candidate(
    store: Arc<dyn CourseStore>,
    generator: CourseGenerator,
    topic: &Topic,
    name: &str,
) -> Result<(), GenerateError> {
    if let Some(existing) = store.find_subtopic_by_name(&topic.id, name).await? {
        if existing.is_complete() {
            debug!(target: "course", subtopic = %name, "Already complete; reusing");
            return Ok(());
        }
        if existing.content.trim().is_empty() {
            // Subtopics are created with their content, so this record is
            // outside what the gateway operations can repair.
            return Err(GenerateError::Shape(format!("subtopic '{name}' record has no content")));
        }
        // Quiz half missing (earlier pass died between create and attach).
        let questions =
            generator.quiz_questions(&topic.name, name, topic.difficulty).await?;
        attach_new_quiz(store.as_ref(), topic, &existing, questions).await?;
        info!(target: "course", subtopic = %name, "Repaired subtopic missing its quiz");
        return Ok(());
    }

    // Generate both halves before persisting anything, quiz strictly after
    // content.
    let content = generator.lesson_content(&topic.name, name, topic.difficulty).await?;
    let questions = generator.quiz_questions(&topic.name, name, topic.difficulty).await?;

    // A lost create race against a concurrent request for the same topic
    // surfaces as a duplicate here; the next pass sees the winner's record
    // and reuses or repairs it.
    let subtopic = store.create_subtopic(&topic.id, name, &content).await?;
    attach_new_quiz(store.as_ref(), topic, &subtopic, questions).await?;
    info!(target: "course", subtopic = %name, "Subtopic completed");
    Ok(())
}

async fn attach_new_quiz(
    store: &dyn CourseStore,
    topic: &Topic,
    subtopic: &Subtopic,
    questions: Vec<crate::domain::QuizQuestion>,
) -> Result<(), GenerateError> {
    let quiz_name = format!("{} - {}", topic.name, subtopic.name);
    let quiz =
        store.create_quiz(&topic.user_id, &quiz_name, &share_code(), questions).await?;
    store.create_snapshot(&quiz, &topic.user_id).await?;
    store.attach_quiz(&subtopic.id, &quiz.id).await?;
    Ok(())
}

/// Rebuild the course view from the store: subtopics ordered by creation
/// time, each joined with its quiz. Used by both the pipeline and the
/// read-only course endpoints.
pub async fn assemble_course(
    store: &dyn CourseStore,
    topic: &Topic,
) -> Result<CourseView, StoreError> {
    let mut subtopics = store.subtopics_for_topic(&topic.id).await?;
    subtopics.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut views = Vec::with_capacity(subtopics.len());
    for subtopic in subtopics {
        let quiz = match &subtopic.quiz_id {
            Some(id) => store.quiz(id).await?,
            None => None,
        };
        views.push(SubtopicView { subtopic, quiz });
    }
    Ok(CourseView { topic: topic.clone(), subtopics: views })
}

/// Read-only course fetch for (topic id, user). No generation.
pub async fn course_for(
    store: &dyn CourseStore,
    topic_id: &str,
    user_id: &str,
) -> Result<Option<CourseView>, StoreError> {
    match store.find_topic(topic_id, user_id).await? {
        Some(topic) => Ok(Some(assemble_course(store, &topic).await?)),
        None => Ok(None),
    }
}

/// All of a user's topics with their subtopic counts, newest first.
pub async fn course_summaries(
    store: &dyn CourseStore,
    user_id: &str,
) -> Result<Vec<(Topic, usize)>, StoreError> {
    let topics = store.topics_for_user(user_id).await?;
    let mut out = Vec::with_capacity(topics.len());
    for topic in topics {
        let count = store.subtopics_for_topic(&topic.id).await?.len();
        out.push((topic, count));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::config::Prompts;
    use crate::provider::TextSource;
    use crate::store::MemoryStore;

    /// Prompt templates with fixed markers so the scripted provider can route
    /// calls without depending on production prompt wording.
    fn test_prompts() -> Prompts {
        Prompts {
            subtopics_user_template: "SUBTOPICS {count} {topic} {difficulty}".into(),
            content_user_template: "CONTENT {subtopic}".into(),
            quiz_user_template: "QUIZ {subtopic}".into(),
            ..Prompts::default()
        }
    }

    fn test_limits(subtopics: usize) -> Limits {
        Limits {
            subtopics_per_course: subtopics,
            questions_per_quiz: 5,
            options_per_question: 4,
            max_passes: 3,
            pass_delay_ms: 0,
            max_concurrent: 3,
        }
    }

    /// Scripted provider: serves a fixed candidate list, counts every call by
    /// prompt, and can fail or mis-shape specific prompts a set number of times.
    struct Scripted {
        names: Vec<String>,
        questions: usize,
        total_calls: AtomicUsize,
        calls_by_prompt: Mutex<HashMap<String, usize>>,
        failures: Mutex<HashMap<String, usize>>,
        bad_quiz: Mutex<HashMap<String, usize>>,
        short_list: bool,
    }

    impl Scripted {
        fn new(names: &[&str], questions: usize) -> Self {
            Self {
                names: names.iter().map(|n| n.to_string()).collect(),
                questions,
                total_calls: AtomicUsize::new(0),
                calls_by_prompt: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                bad_quiz: Mutex::new(HashMap::new()),
                short_list: false,
            }
        }

        /// Fail the given prompt (e.g. "CONTENT Paths") the next `times` calls.
        fn fail(&self, prompt: &str, times: usize) {
            self.failures.lock().unwrap().insert(prompt.to_string(), times);
        }

        /// Serve a wrong-question-count quiz for the prompt the next `times` calls.
        fn mis_shape_quiz(&self, prompt: &str, times: usize) {
            self.bad_quiz.lock().unwrap().insert(prompt.to_string(), times);
        }

        fn calls(&self) -> usize {
            self.total_calls.load(Ordering::SeqCst)
        }

        fn calls_for(&self, prompt: &str) -> usize {
            self.calls_by_prompt.lock().unwrap().get(prompt).copied().unwrap_or(0)
        }

        fn quiz_json(&self, subtopic: &str, questions: usize) -> String {
            let questions: Vec<_> = (0..questions)
                .map(|i| {
                    json!({
                        "question": format!("Question {i} about {subtopic}?"),
                        "options": [
                            format!("A{i}"),
                            format!("B{i}"),
                            format!("C{i}"),
                            format!("D{i}"),
                        ],
                        "correctAnswer": format!("A{i}"),
                    })
                })
                .collect();
            json!({ "questions": questions }).to_string()
        }

        fn take_scripted(&self, map: &Mutex<HashMap<String, usize>>, prompt: &str) -> bool {
            let mut map = map.lock().unwrap();
            match map.get_mut(prompt) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        }
    }

    #[async_trait]
    impl TextSource for Scripted {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            _temperature: f32,
        ) -> Result<String, GenerateError> {
            self.total_calls.fetch_add(1, Ordering::SeqCst);
            *self.calls_by_prompt.lock().unwrap().entry(user.to_string()).or_insert(0) += 1;

            if self.take_scripted(&self.failures, user) {
                return Err(GenerateError::Provider("scripted failure".into()));
            }

            if user.starts_with("SUBTOPICS") {
                let names: Vec<&str> = if self.short_list {
                    self.names.iter().map(String::as_str).skip(1).collect()
                } else {
                    self.names.iter().map(String::as_str).collect()
                };
                return Ok(format!("```json\n{}\n```", json!(names)));
            }
            if let Some(name) = user.strip_prefix("CONTENT ") {
                return Ok(format!("Lesson prose about {name}."));
            }
            if let Some(name) = user.strip_prefix("QUIZ ") {
                if self.take_scripted(&self.bad_quiz, user) {
                    return Ok(self.quiz_json(name, self.questions - 1));
                }
                return Ok(self.quiz_json(name, self.questions));
            }
            Err(GenerateError::Provider(format!("unexpected prompt: {user}")))
        }
    }

    fn pipeline(
        store: &MemoryStore,
        source: &Arc<Scripted>,
        limits: Limits,
    ) -> CoursePipeline {
        let store: Arc<dyn CourseStore> = Arc::new(store.clone());
        let generator = CourseGenerator::new(source.clone(), test_prompts(), limits);
        CoursePipeline::new(store, generator, limits)
    }

    const TEN: [&str; 10] = ["n1", "n2", "n3", "n4", "n5", "n6", "n7", "n8", "n9", "n10"];

    #[tokio::test]
    async fn happy_path_builds_a_complete_course() {
        let store = MemoryStore::new();
        let source = Arc::new(Scripted::new(&TEN, 5));
        let pipeline = pipeline(&store, &source, test_limits(10));

        let view = pipeline
            .generate_course("Graph Theory", Difficulty::Intermediate, "u1")
            .await
            .unwrap();

        assert_eq!(view.topic.name, "Graph Theory");
        assert_eq!(view.subtopics.len(), 10);
        for sv in &view.subtopics {
            assert!(sv.subtopic.is_complete());
            assert!(!sv.subtopic.content.is_empty());
            let quiz = sv.quiz.as_ref().expect("quiz joined");
            assert_eq!(quiz.questions.len(), 5);
            assert!(quiz.questions.iter().all(|q| q.options.len() == 4));
            assert_eq!(quiz.quiz_name, format!("Graph Theory - {}", sv.subtopic.name));
            assert_eq!(quiz.quiz_code.len(), 6);
        }
        // Ordered by creation time.
        for pair in view.subtopics.windows(2) {
            assert!(pair[0].subtopic.created_at <= pair[1].subtopic.created_at);
        }
        // 1 candidate call + 10 content + 10 quiz.
        assert_eq!(source.calls(), 21);
        assert_eq!(store.snapshot_count().await, 10);
    }

    #[tokio::test]
    async fn second_call_short_circuits_with_zero_provider_calls() {
        let store = MemoryStore::new();
        let source = Arc::new(Scripted::new(&TEN, 5));
        let pipeline = pipeline(&store, &source, test_limits(10));

        let first =
            pipeline.generate_course("Graphs", Difficulty::Beginner, "u1").await.unwrap();
        let calls_after_first = source.calls();

        let second =
            pipeline.generate_course("Graphs", Difficulty::Beginner, "u1").await.unwrap();
        assert_eq!(source.calls(), calls_after_first, "short-circuit must not call the provider");

        let first_ids: Vec<&str> =
            first.subtopics.iter().map(|s| s.subtopic.id.as_str()).collect();
        let second_ids: Vec<&str> =
            second.subtopics.iter().map(|s| s.subtopic.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn transient_failures_are_resumed_on_the_next_pass() {
        let store = MemoryStore::new();
        let source = Arc::new(Scripted::new(&TEN, 5));
        // Content fails once for three candidates.
        source.fail("CONTENT n2", 1);
        source.fail("CONTENT n5", 1);
        source.fail("CONTENT n9", 1);
        let pipeline = pipeline(&store, &source, test_limits(10));

        let view =
            pipeline.generate_course("Graphs", Difficulty::Advanced, "u1").await.unwrap();
        assert_eq!(view.subtopics.len(), 10);

        // First-pass successes were not regenerated; failed ones took two tries.
        assert_eq!(source.calls_for("CONTENT n1"), 1);
        assert_eq!(source.calls_for("CONTENT n2"), 2);
        assert_eq!(source.calls_for("CONTENT n5"), 2);

        // No duplicate records under the topic.
        let names: HashSet<String> =
            view.subtopics.iter().map(|s| s.subtopic.name.clone()).collect();
        assert_eq!(names.len(), 10);
    }

    #[tokio::test]
    async fn wrong_shape_quiz_is_never_persisted() {
        let store = MemoryStore::new();
        let source = Arc::new(Scripted::new(&TEN, 5));
        // One candidate serves a 4-question quiz on the first try.
        source.mis_shape_quiz("QUIZ n3", 1);
        let pipeline = pipeline(&store, &source, test_limits(10));

        let view =
            pipeline.generate_course("Graphs", Difficulty::Beginner, "u1").await.unwrap();
        let n3 = view
            .subtopics
            .iter()
            .find(|s| s.subtopic.name == "n3")
            .expect("n3 completed on retry");
        assert_eq!(n3.quiz.as_ref().unwrap().questions.len(), 5);
        assert_eq!(source.calls_for("QUIZ n3"), 2);
    }

    #[tokio::test]
    async fn partial_record_is_repaired_without_regenerating_content() {
        let store = MemoryStore::new();
        let source = Arc::new(Scripted::new(&TEN, 5));
        let pipeline = pipeline(&store, &source, test_limits(10));

        // A subtopic left behind with content but no quiz.
        let topic = store
            .find_or_create_topic("Graphs", "u1", Difficulty::Beginner)
            .await
            .unwrap();
        store.create_subtopic(&topic.id, "n4", "prose from an earlier run").await.unwrap();

        let view =
            pipeline.generate_course("Graphs", Difficulty::Beginner, "u1").await.unwrap();
        assert_eq!(view.subtopics.len(), 10);

        let n4 = view.subtopics.iter().find(|s| s.subtopic.name == "n4").unwrap();
        assert_eq!(n4.subtopic.content, "prose from an earlier run");
        assert!(n4.quiz.is_some());
        assert_eq!(source.calls_for("CONTENT n4"), 0, "existing content must be reused");
        assert_eq!(source.calls_for("QUIZ n4"), 1);
    }

    #[tokio::test]
    async fn permanent_failure_yields_incomplete_with_shortfall() {
        let store = MemoryStore::new();
        let source = Arc::new(Scripted::new(&TEN, 5));
        // One failure per pass: still failing when the ceiling is reached.
        source.fail("CONTENT n7", 3);
        let pipeline = pipeline(&store, &source, test_limits(10));

        let err = pipeline
            .generate_course("Graphs", Difficulty::Intermediate, "u1")
            .await
            .unwrap_err();
        assert!(
            matches!(err, GenerateError::Incomplete { completed: 9, target: 10 }),
            "{err}"
        );
        assert_eq!(source.calls_for("CONTENT n7"), 3, "one attempt per pass");

        // The nine accepted subtopics stay persisted for a later resume.
        let topic = store.find_or_create_topic("Graphs", "u1", Difficulty::Intermediate).await.unwrap();
        let persisted = store.subtopics_for_topic(&topic.id).await.unwrap();
        assert_eq!(persisted.iter().filter(|s| s.is_complete()).count(), 9);

        // Once the provider recovers, the next call fills only the hole.
        let view =
            pipeline.generate_course("Graphs", Difficulty::Intermediate, "u1").await.unwrap();
        assert_eq!(view.subtopics.len(), 10);
        assert_eq!(source.calls_for("CONTENT n1"), 1, "completed work is not redone");
    }

    #[tokio::test]
    async fn malformed_candidate_list_fails_the_whole_request() {
        let store = MemoryStore::new();
        let mut scripted = Scripted::new(&TEN, 5);
        scripted.short_list = true;
        let source = Arc::new(scripted);
        let pipeline = pipeline(&store, &source, test_limits(10));

        let err = pipeline
            .generate_course("Graphs", Difficulty::Beginner, "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Shape(_)), "{err}");
        // No per-name work was attempted.
        assert_eq!(source.calls(), 1);

        let topic = store.find_or_create_topic("Graphs", "u1", Difficulty::Beginner).await.unwrap();
        assert!(store.subtopics_for_topic(&topic.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_path_returns_none_for_unknown_or_foreign_topic() {
        let store = MemoryStore::new();
        let topic =
            store.find_or_create_topic("Graphs", "u1", Difficulty::Beginner).await.unwrap();

        assert!(course_for(&store, &topic.id, "u1").await.unwrap().is_some());
        assert!(course_for(&store, &topic.id, "someone-else").await.unwrap().is_none());
        assert!(course_for(&store, "missing-id", "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn summaries_count_subtopics_per_topic() {
        let store = MemoryStore::new();
        let topic =
            store.find_or_create_topic("Graphs", "u1", Difficulty::Beginner).await.unwrap();
        store.create_subtopic(&topic.id, "A", "x").await.unwrap();
        store.create_subtopic(&topic.id, "B", "x").await.unwrap();
        store.find_or_create_topic("Sets", "u1", Difficulty::Beginner).await.unwrap();

        let summaries = course_summaries(&store, "u1").await.unwrap();
        assert_eq!(summaries.len(), 2);
        let graphs = summaries.iter().find(|(t, _)| t.name == "Graphs").unwrap();
        assert_eq!(graphs.1, 2);
        let sets = summaries.iter().find(|(t, _)| t.name == "Sets").unwrap();
        assert_eq!(sets.1, 0);
    }
}
