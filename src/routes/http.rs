//! HTTP endpoint handlers. These are thin wrappers that forward to the
//! pipeline and the store. Each handler is instrumented and logs parameters
//! and basic result info.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{info, instrument};

use crate::pipeline::{course_for, course_summaries};
use crate::protocol::{course_out, summary_out, CreateCourseIn, HealthOut, UserQuery};
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
    Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic, difficulty = %body.difficulty, user = %body.user_id))]
pub async fn http_create_course(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCourseIn>,
) -> Response {
    let Some(pipeline) = &state.pipeline else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "course generation provider is not configured" })),
        )
            .into_response();
    };

    match pipeline.generate_course(&body.topic, body.difficulty, &body.user_id).await {
        Ok(view) => {
            info!(
                target: "course",
                topic = %view.topic.name,
                subtopics = view.subtopics.len(),
                "HTTP course created"
            );
            Json(course_out(&view)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[instrument(level = "info", skip(state), fields(%topic_id, user = %q.user_id))]
pub async fn http_get_course(
    State(state): State<Arc<AppState>>,
    Path(topic_id): Path<String>,
    Query(q): Query<UserQuery>,
) -> Response {
    match course_for(state.store.as_ref(), &topic_id, &q.user_id).await {
        Ok(Some(view)) => {
            info!(target: "course", topic = %view.topic.name, "HTTP course served");
            Json(course_out(&view)).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "course not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[instrument(level = "info", skip(state), fields(user = %q.user_id))]
pub async fn http_list_courses(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Response {
    match course_summaries(state.store.as_ref(), &q.user_id).await {
        Ok(rows) => {
            let out: Vec<_> =
                rows.iter().map(|(topic, count)| summary_out(topic, *count)).collect();
            Json(out).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
