//! Chunk planning
//!
//! Page counts are estimated from file size; the backend receives the whole
//! file plus the page range it should cover.

use serde::Serialize;

use crate::backends::PageRange;

/// Rough average size of one PDF page
pub const BYTES_PER_PAGE_ESTIMATE: u64 = 100 * 1024;

/// One unit of chunked work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Position in submission order, used to re-order results
    pub index: usize,
    pub pages: PageRange,
}

/// Estimated page count for a file of `file_size` bytes (at least one)
pub fn estimate_pages(file_size: u64) -> u32 {
    let pages = file_size.div_ceil(BYTES_PER_PAGE_ESTIMATE).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Split `total_pages` into contiguous ranges of `pages_per_chunk`
pub fn plan_chunks(total_pages: u32, pages_per_chunk: u32) -> Vec<Chunk> {
    let total_pages = total_pages.max(1);
    let per_chunk = pages_per_chunk.max(1);

    let mut chunks = Vec::new();
    let mut start = 1u32;
    while start <= total_pages {
        let end = start.saturating_add(per_chunk - 1).min(total_pages);
        chunks.push(Chunk {
            index: chunks.len(),
            pages: PageRange { start, end },
        });
        if end == total_pages {
            break;
        }
        start = end + 1;
    }
    chunks
}
