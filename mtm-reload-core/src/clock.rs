//! Wall-clock timestamps for snapshots and dev-server payloads.
//!
//! Scheduling never uses these; it runs on `tokio::time::Instant` so tests can
//! pause and advance time.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, or 0 if the system clock is before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
