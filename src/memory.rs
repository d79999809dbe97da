//! Process memory hygiene
//!
//! After a response is produced the gateway compares its resident set size
//! against a threshold and, when above it, drops expired cache entries.
//! Advisory only: nothing is refused because of memory pressure.

use crate::cache::ResultCache;

/// Resident set size of this process in bytes (Linux only)
pub fn resident_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Extract `VmRSS` from the contents of `/proc/<pid>/status`, in bytes
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Purge expired cache entries when resident memory exceeds `threshold_bytes`.
///
/// Returns the number of entries removed, or `None` when under the threshold
/// or the resident size is unknown.
pub fn relieve_pressure(cache: &dyn ResultCache, threshold_bytes: u64) -> Option<usize> {
    let resident = resident_bytes()?;
    relieve_pressure_at(cache, resident, threshold_bytes)
}

fn relieve_pressure_at(
    cache: &dyn ResultCache,
    resident: u64,
    threshold_bytes: u64,
) -> Option<usize> {
    if resident <= threshold_bytes {
        return None;
    }

    let purged = cache.purge_expired();
    tracing::warn!(
        resident_mb = resident / (1024 * 1024),
        threshold_mb = threshold_bytes / (1024 * 1024),
        purged,
        remaining = cache.len(),
        "Memory above threshold, purged expired cache entries"
    );
    Some(purged)
}
