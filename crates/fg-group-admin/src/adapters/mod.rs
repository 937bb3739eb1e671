//! # Adapters
//!
//! Implementations of the outbound ports.

pub mod notifier;
pub mod storage;

pub use notifier::{BusMembershipNotifier, NoOpNotifier};
pub use storage::{FileMutationLog, InMemoryMutationLog};
