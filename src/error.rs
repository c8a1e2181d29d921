//! Error taxonomy for the generation pipeline and the persistence gateway.
//!
//! Provider / Unparsable / Shape are recovered per candidate inside a pass;
//! Incomplete is the only terminal generation error and carries the shortfall;
//! Store failures abort the current candidate but never the whole pass.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the persistence gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("subtopic '{name}' already exists for topic {topic_id}")]
    DuplicateSubtopic { topic_id: String, name: String },
    #[error("subtopic {0} not found")]
    SubtopicNotFound(String),
}

/// Failures of the course-generation pipeline.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Upstream text-generation call failed (network, HTTP status, rate limit).
    #[error("provider call failed: {0}")]
    Provider(String),
    /// Provider output could not be decoded after stripping formatting wrappers.
    #[error("unparsable provider response: {0}")]
    Unparsable(String),
    /// Decoded output violates the fixed-shape contract.
    #[error("invalid generated shape: {0}")]
    Shape(String),
    /// Retry ceiling exhausted with candidates still missing.
    #[error("course generation incomplete: {completed} of {target} subtopics")]
    Incomplete { completed: usize, target: usize },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            GenerateError::Incomplete { completed, target } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": self.to_string(),
                    "completed": completed,
                    "target": target,
                }),
            ),
            GenerateError::Provider(_)
            | GenerateError::Unparsable(_)
            | GenerateError::Shape(_) => {
                (StatusCode::BAD_GATEWAY, json!({ "error": self.to_string() }))
            }
            GenerateError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
