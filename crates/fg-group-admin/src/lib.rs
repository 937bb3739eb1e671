//! # FG Group Admin
//!
//! Partitions a fleet of storage servers and the tables they host into
//! named groups, so workloads can be isolated onto dedicated hardware.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Every server belongs to exactly one group; unassigned servers, and
//!   servers that have gone offline, stay in the `default` group or the
//!   group they were last moved to
//! - Every table is bound to at most one group; unbound tables resolve to
//!   `default`
//! - Every mutation is durably logged before it becomes visible, and the
//!   registry is rebuilt from the log on restart
//! - Committed changes are handed to the balancer asynchronously, with
//!   retries, in commit order
//!
//! ## Guarantees
//!
//! | Guarantee | Mechanism |
//! |-----------|-----------|
//! | Durable before visible | Log commit precedes registry apply |
//! | Atomic batches | Validation covers the whole batch; one record per batch |
//! | Serializable mutations | One async mutex around validate/commit/apply |
//! | Deterministic recovery | Replay skips sequences at or below the last applied |
//!
//! ## Module Structure
//!
//! ```text
//! fg-group-admin/
//! ├── domain/          # Registry, validator, mutations, errors, config
//! ├── ports/           # API trait + mutation log / notifier traits
//! ├── adapters/        # File and in-memory logs, event-bus notifier
//! └── service/         # GroupAdminService, AssignmentCoordinator
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{BusMembershipNotifier, FileMutationLog, InMemoryMutationLog, NoOpNotifier};
pub use domain::{
    check_all, ApplyOutcome, GroupAdminConfig, GroupDelta, GroupError, GroupInfo, GroupName,
    GroupRegistry, MembershipChanged, MembershipValidator, Mutation, MutationKind,
    MutationRecord, NodeId, NotifyError, PersistenceError, RetryPolicy, SequenceNumber, ShardId,
    ValidationError, DEFAULT_GROUP, DEFAULT_NAMESPACE, MAX_GROUP_NAME_LEN,
};
pub use ports::{GroupAdminApi, MembershipNotifier, MutationLog, RecordingNotifier};
pub use service::{AssignmentCoordinator, GroupAdminService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
