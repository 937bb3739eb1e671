//! Storage Adapters
//!
//! Implementations of the `MutationLog` trait.

mod file;
mod memory;

pub use file::{FileMutationLog, LOG_FILE_NAME, LOCK_FILE_NAME};
pub use memory::InMemoryMutationLog;

/// Milliseconds since the Unix epoch; zero if the clock is before it.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
