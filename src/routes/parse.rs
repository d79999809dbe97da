//! Parse endpoints
//!
//! - POST /parse          - Smart-routed parse
//! - POST /parse/tika     - Force Tika
//! - POST /parse/pdf      - Force PyMuPDF
//! - POST /parse/extract  - Force Unstructured

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};

use crate::backends::BackendKind;
use crate::error::Result;
use crate::parse::ParseResult;
use crate::state::AppState;

use super::upload::stage_upload;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/parse", post(parse_auto))
        .route("/parse/tika", post(parse_tika))
        .route("/parse/pdf", post(parse_pdf))
        .route("/parse/extract", post(parse_extract))
}

async fn parse_auto(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ParseResult>> {
    let request = stage_upload(multipart, &state.config().upload).await?;
    let result = state.parser().parse(request).await?;
    Ok(Json(result))
}

async fn parse_tika(state: State<AppState>, multipart: Multipart) -> Result<Json<ParseResult>> {
    parse_forced(state, multipart, BackendKind::Tika).await
}

async fn parse_pdf(state: State<AppState>, multipart: Multipart) -> Result<Json<ParseResult>> {
    parse_forced(state, multipart, BackendKind::PyMuPdf).await
}

async fn parse_extract(state: State<AppState>, multipart: Multipart) -> Result<Json<ParseResult>> {
    parse_forced(state, multipart, BackendKind::Unstructured).await
}

async fn parse_forced(
    State(state): State<AppState>,
    multipart: Multipart,
    kind: BackendKind,
) -> Result<Json<ParseResult>> {
    let request = stage_upload(multipart, &state.config().upload).await?;
    let result = state.parser().parse_with(kind, request).await?;
    Ok(Json(result))
}
