//! Tracing setup.
//!
//! LOG_LEVEL feeds an EnvFilter: either a bare level ("debug") or full
//! directives ("info,course=debug,coursegen_backend=debug,tower_http=info").
//! LOG_FORMAT switches between the default pretty output and JSON lines.
//! Targets, file, and line are included so log sources stay unambiguous next
//! to the per-request spans from tower-http's TraceLayer.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str =
    "info,course=debug,coursegen_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // json() changes the builder's type, so branch at init time rather than
    // trying to store one of two layer types.
    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
