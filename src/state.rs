//! Application state: the persistence gateway, the generation pipeline, and
//! configuration.
//!
//! The pipeline is only constructed when a provider is configured; without
//! OPENAI_API_KEY the read endpoints keep working and course creation is
//! refused with a clear error instead of a crash at startup.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{load_course_config_from_env, CourseConfig};
use crate::generate::CourseGenerator;
use crate::pipeline::CoursePipeline;
use crate::provider::OpenAi;
use crate::store::{CourseStore, MemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CourseStore>,
    pub pipeline: Option<CoursePipeline>,
}

impl AppState {
    /// Build state from env: load config, create the store, init the provider.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_course_config_from_env().unwrap_or_default();
        Self::with_parts(Arc::new(MemoryStore::new()), OpenAi::from_env(), config)
    }

    pub fn with_parts(
        store: Arc<dyn CourseStore>,
        provider: Option<OpenAi>,
        config: CourseConfig,
    ) -> Self {
        let limits = config.limits;
        info!(
            target: "coursegen_backend",
            subtopics = limits.subtopics_per_course,
            questions = limits.questions_per_quiz,
            passes = limits.max_passes,
            "Pipeline limits"
        );

        let pipeline = match provider {
            Some(openai) => {
                info!(
                    target: "coursegen_backend",
                    base_url = %openai.base_url,
                    model = %openai.model,
                    "OpenAI enabled."
                );
                let generator =
                    CourseGenerator::new(Arc::new(openai), config.prompts.clone(), limits);
                Some(CoursePipeline::new(store.clone(), generator, limits))
            }
            None => {
                info!(
                    target: "coursegen_backend",
                    "OpenAI disabled (no OPENAI_API_KEY). Course creation unavailable; read endpoints still served."
                );
                None
            }
        };

        Self { store, pipeline }
    }
}
