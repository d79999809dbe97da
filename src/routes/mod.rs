//! HTTP surface of the gateway

pub mod parse;
pub mod status;
pub mod system;
pub mod upload;


use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Room for multipart boundaries and the small text fields
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Full application router with middleware
pub fn app(state: AppState) -> Router {
    let body_limit = state
        .config()
        .upload
        .max_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(system::router())
        .merge(parse::router())
        .merge(status::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Turn a handler panic into the usual error envelope
fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Unexpected(format!("handler panicked: {}", detail)).into_response()
}
