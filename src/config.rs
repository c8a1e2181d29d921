//! Generation configuration (prompts + numeric limits) from TOML.
//!
//! Defaults are compiled in and work without any file; set COURSE_CONFIG_PATH
//! to override prompts or limits. See `CourseConfig` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CourseConfig {
    #[serde(default)]
    pub prompts: Prompts,
    #[serde(default)]
    pub limits: Limits,
}

/// Numeric pipeline policy. These are policy knobs, not structural constants:
/// tests shrink them freely.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Limits {
    /// Subtopics per course.
    #[serde(default = "default_subtopics")]
    pub subtopics_per_course: usize,
    /// Questions per quiz.
    #[serde(default = "default_questions")]
    pub questions_per_quiz: usize,
    /// Answer options per question.
    #[serde(default = "default_options")]
    pub options_per_question: usize,
    /// Retry ceiling for the fill loop.
    #[serde(default = "default_passes")]
    pub max_passes: usize,
    /// Fixed sleep between passes, in milliseconds. Not a backoff.
    #[serde(default = "default_pass_delay")]
    pub pass_delay_ms: u64,
    /// Candidate tasks allowed in flight at once within a pass.
    #[serde(default = "default_concurrency")]
    pub max_concurrent: usize,
}

const fn default_subtopics() -> usize {
    10
}
const fn default_questions() -> usize {
    5
}
const fn default_options() -> usize {
    4
}
const fn default_passes() -> usize {
    3
}
const fn default_pass_delay() -> u64 {
    1000
}
const fn default_concurrency() -> usize {
    4
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            subtopics_per_course: default_subtopics(),
            questions_per_quiz: default_questions(),
            options_per_question: default_options(),
            max_passes: default_passes(),
            pass_delay_ms: default_pass_delay(),
            max_concurrent: default_concurrency(),
        }
    }
}

/// Prompts used by the course generator. Placeholders: {topic}, {subtopic},
/// {difficulty}, {count}, {options}. Override in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
    pub subtopics_system: String,
    pub subtopics_user_template: String,
    pub content_system: String,
    pub content_user_template: String,
    pub quiz_system: String,
    pub quiz_user_template: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            subtopics_system:
                "You are a curriculum planner. Respond ONLY with a strict JSON array of strings, \
                 no markdown, no commentary."
                    .into(),
            subtopics_user_template:
                "Generate EXACTLY {count} subtopics for the topic \"{topic}\" at {difficulty} \
                 level. Each subtopic should be specific and focused. Return ONLY a JSON array \
                 of exactly {count} strings, nothing else."
                    .into(),
            content_system:
                "You are an educational content writer. Write thorough, well-structured prose. \
                 Output ONLY the lesson text."
                    .into(),
            content_user_template:
                "Generate detailed educational content for the subtopic \"{subtopic}\" under \
                 the main topic \"{topic}\" at {difficulty} level. The content should be \
                 comprehensive and educational, covering all important aspects of the subtopic."
                    .into(),
            quiz_system:
                "You are a quiz author. Respond ONLY with strict JSON, no markdown formatting \
                 or additional text."
                    .into(),
            quiz_user_template:
                "Generate a quiz with {count} multiple choice questions for the subtopic \
                 \"{subtopic}\" under the main topic \"{topic}\" at {difficulty} level. Return \
                 ONLY a JSON object with this exact structure: {\"questions\": [{\"question\": \
                 \"Question text here\", \"options\": [\"Option 1\", \"Option 2\", \"Option 3\", \
                 \"Option 4\"], \"correctAnswer\": \"Correct option here\"}]}. Each question \
                 must have exactly {options} distinct options."
                    .into(),
        }
    }
}

/// Attempt to load `CourseConfig` from COURSE_CONFIG_PATH. On any parsing/IO
/// error, returns None and the caller falls back to defaults.
pub fn load_course_config_from_env() -> Option<CourseConfig> {
    let path = std::env::var("COURSE_CONFIG_PATH").ok()?;
    match std::fs::read_to_string(&path) {
        Ok(s) => match toml::from_str::<CourseConfig>(&s) {
            Ok(cfg) => {
                info!(target: "coursegen_backend", %path, "Loaded course config (TOML)");
                Some(cfg)
            }
            Err(e) => {
                error!(target: "coursegen_backend", %path, error = %e, "Failed to parse TOML config");
                None
            }
        },
        Err(e) => {
            error!(target: "coursegen_backend", %path, error = %e, "Failed to read TOML config file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_have_working_defaults() {
        let limits = Limits::default();
        assert_eq!(limits.subtopics_per_course, 10);
        assert_eq!(limits.questions_per_quiz, 5);
        assert_eq!(limits.options_per_question, 4);
        assert_eq!(limits.max_passes, 3);
    }

    #[test]
    fn partial_toml_fills_missing_fields() {
        let cfg: CourseConfig = toml::from_str(
            r#"
            [limits]
            subtopics_per_course = 3
            pass_delay_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.limits.subtopics_per_course, 3);
        assert_eq!(cfg.limits.pass_delay_ms, 0);
        assert_eq!(cfg.limits.questions_per_quiz, 5);
        assert!(cfg.prompts.quiz_user_template.contains("{count}"));
    }
}
