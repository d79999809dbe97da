//! Job status endpoint
//!
//! GET /status/:processId?service=pdf|extract
//!
//! Gateway job ids are answered from the results cache; anything else is
//! forwarded to the backend named by `service`.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::backends::BackendKind;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub service: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/status/:process_id", get(job_status))
}

async fn job_status(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>> {
    let service = match query.service.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(BackendKind::from_selector(raw).ok_or_else(|| {
            AppError::Validation(format!("Unknown service {:?}; use pdf or extract", raw))
        })?),
    };

    let status = state.parser().status(&process_id, service).await?;
    Ok(Json(status))
}
