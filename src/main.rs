//! CourseGen · Course Generation Backend
//!
//! - Axum HTTP API: create a course, read a course, list courses
//! - OpenAI-compatible provider integration (via environment variables)
//! - In-memory persistence gateway
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables course generation if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_MODEL        : default "gpt-4o-mini"
//!   COURSE_CONFIG_PATH  : path to TOML config (prompts + pipeline limits)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod parse;
mod provider;
mod generate;
mod store;
mod pipeline;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    // Build shared application state (store, provider, pipeline, prompts).
    let state = Arc::new(AppState::new());

    // Router with the API endpoints plus CORS and tracing layers.
    let app = build_router(state.clone());

    // PORT from env, default 3000.
    let addr: SocketAddr = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

    let listener = TcpListener::bind(addr).await?;
    info!(target: "coursegen_backend", %addr, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
