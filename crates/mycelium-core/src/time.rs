//! Monotonic-ish wall clock helper shared by Farseeing and the learn engine's
//! discontent-timestamp windows, so neither reaches for `SystemTime::now()`
//! ad hoc at every call site.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in nanoseconds since the Unix epoch.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_nanos() as u64
}
