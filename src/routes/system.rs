//! Service descriptor and system status endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::backends::BackendDescriptor;
use crate::cache::CacheStats;
use crate::memory;
use crate::state::AppState;
use crate::supervisor::ProcessInfo;

const ENDPOINTS: [&str; 7] = [
    "GET /",
    "GET /system-status",
    "POST /parse",
    "POST /parse/tika",
    "POST /parse/pdf",
    "POST /parse/extract",
    "GET /status/:processId",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub backends: Vec<BackendDescriptor>,
    pub endpoints: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub memory: MemoryStatus,
    pub cache: CacheStats,
    pub active_jobs: usize,
    pub processes: Vec<ProcessInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStatus {
    pub resident_bytes: Option<u64>,
    pub threshold_bytes: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_descriptor))
        .route("/system-status", get(system_status))
}

async fn service_descriptor(State(state): State<AppState>) -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        service: "parse-gateway",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        backends: state.parser().backends().descriptors(),
        endpoints: ENDPOINTS.to_vec(),
    })
}

async fn system_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let parser = state.parser();
    Json(SystemStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_secs(),
        memory: MemoryStatus {
            resident_bytes: memory::resident_bytes(),
            threshold_bytes: state.config().server.memory_threshold_bytes,
        },
        cache: parser.cache().stats(),
        active_jobs: parser.jobs().active(),
        processes: state.supervisor().running(),
    })
}
