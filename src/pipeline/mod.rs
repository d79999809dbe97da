//! Chunk pipeline
//!
//! Large PDFs routed to the chunked strategy are split into page ranges and
//! processed in the background:
//!
//! 1. `plan_chunks` turns an estimated page count into ordered chunks
//! 2. `run_chunked` submits them concurrently (bounded) and merges the
//!    results by chunk index
//! 3. `JobRegistry` tracks the task so it can be cancelled

mod chunks;
mod jobs;
mod merge;
mod runner;

pub use chunks::{estimate_pages, plan_chunks, Chunk, BYTES_PER_PAGE_ESTIMATE};
pub use jobs::JobRegistry;
pub use merge::{extract_text, merge_chunks};
pub use runner::{run_chunked, PipelineSettings};
