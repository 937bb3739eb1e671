//! # Domain Errors
//!
//! Error types for the group administration subsystem.
//!
//! `GroupError` is what callers of the API see. `PersistenceError` and
//! `NotifyError` are produced by the outbound ports; only the former can
//! surface to a caller (wrapped in `GroupError::Persistence`).

use super::value_objects::NodeId;
use thiserror::Error;

/// Top-level error returned by the group administration API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    /// The request violates a membership rule. Never retryable.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The named group does not exist.
    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    /// The mutation log refused the commit after all retries.
    /// The registry is unchanged and no sequence number was consumed.
    #[error("Persistence failed after {attempts} attempt(s): {source}")]
    Persistence {
        /// Attempts made, including the first
        attempts: u32,
        /// Last store error
        source: PersistenceError,
    },

    /// The caller stopped waiting. The mutation may still apply; re-query.
    #[error("Operation timed out after {millis}ms (outcome unknown)")]
    Timeout {
        /// Timeout the caller waited for
        millis: u64,
    },

    /// Servers were still waiting on the balancer when the wait expired.
    #[error("Timed out waiting for {} server(s) to finish transition", servers.len())]
    TransitionTimeout {
        /// Servers still in transition
        servers: Vec<NodeId>,
    },

    /// A persisted record cannot be applied to the registry.
    #[error("Mutation log inconsistent with registry: {0}")]
    InconsistentLog(String),

    /// The mutation task was lost (panic or runtime shutdown).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GroupError {
    /// Whether the caller may retry the same request.
    ///
    /// `Timeout` is retryable only after re-querying state, since the
    /// original mutation may have applied.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence { source, .. } => source.is_transient(),
            Self::Timeout { .. } | Self::TransitionTimeout { .. } | Self::ServiceUnavailable(_) => {
                true
            }
            Self::Validation(_)
            | Self::UnknownGroup(_)
            | Self::InconsistentLog(_)
            | Self::Config(_) => false,
        }
    }

    /// Short label for the `reason` metric dimension.
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::Validation(v) => v.reason_label(),
            Self::UnknownGroup(_) => "unknown_group",
            Self::Persistence { .. } => "persistence",
            Self::Timeout { .. } => "timeout",
            Self::TransitionTimeout { .. } => "transition_timeout",
            Self::InconsistentLog(_) => "inconsistent_log",
            Self::ServiceUnavailable(_) => "unavailable",
            Self::Config(_) => "config",
        }
    }
}

/// Membership rule violations, detected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Group name is empty, too long, or contains disallowed characters.
    #[error("Invalid group name {name:?}: {reason}")]
    InvalidName {
        /// Name as submitted
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// A group with this name already exists.
    #[error("Group already exists: {0}")]
    DuplicateName(String),

    /// The default group cannot be removed.
    #[error("The default group cannot be removed")]
    DefaultGroupProtected,

    /// Group still has member servers or bound tables.
    #[error("Group {group} is not empty ({servers} server(s), {tables} table(s))")]
    GroupNotEmpty {
        /// Group that was to be removed
        group: String,
        /// Member servers
        servers: usize,
        /// Bound tables
        tables: usize,
    },

    /// An entity in the batch has an undelivered move in flight.
    #[error("{entity} is still moving to group {pending_target}")]
    ConflictingMutation {
        /// Server or table
        entity: String,
        /// Group the in-flight move targets
        pending_target: String,
    },

    /// Server address is not `host:port`.
    #[error("Invalid server address {input:?}: {reason}")]
    InvalidServer {
        /// Address as submitted
        input: String,
        /// What is wrong with it
        reason: String,
    },

    /// Table name is not `[namespace:]qualifier`.
    #[error("Invalid table name {input:?}: {reason}")]
    InvalidTable {
        /// Name as submitted
        input: String,
        /// What is wrong with it
        reason: String,
    },

    /// Move request names no servers or tables.
    #[error("Batch is empty")]
    EmptyBatch,

    /// Move request exceeds the configured batch limit.
    #[error("Batch of {size} exceeds maximum of {max}")]
    BatchTooLarge {
        /// Submitted batch size
        size: usize,
        /// Configured maximum
        max: usize,
    },
}

impl ValidationError {
    /// Short label for the `reason` metric dimension.
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "invalid_name",
            Self::DuplicateName(_) => "duplicate_name",
            Self::DefaultGroupProtected => "default_group_protected",
            Self::GroupNotEmpty { .. } => "group_not_empty",
            Self::ConflictingMutation { .. } => "conflicting_mutation",
            Self::InvalidServer { .. } => "invalid_server",
            Self::InvalidTable { .. } => "invalid_table",
            Self::EmptyBatch => "empty_batch",
            Self::BatchTooLarge { .. } => "batch_too_large",
        }
    }
}

/// Errors from the mutation log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// The store cannot be reached right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// I/O failure while reading or writing.
    #[error("I/O error: {0}")]
    Io(String),

    /// A complete record failed its integrity check.
    #[error("Corrupted record at offset {offset}: {reason}")]
    Corrupted {
        /// Byte offset of the bad frame
        offset: u64,
        /// What failed
        reason: String,
    },

    /// Record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Another writer holds the log.
    #[error("Mutation log locked by another writer: {path}")]
    Locked {
        /// Lock file path
        path: String,
    },

    /// A failed append could not be rolled back; the log accepts no more
    /// writes until it is reopened.
    #[error("Mutation log poisoned: {0}")]
    Poisoned(String),
}

impl PersistenceError {
    /// Transient errors are retried by the service; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<bincode::Error> for PersistenceError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Errors from delivering a membership change to the balancer.
///
/// Handled inside the coordinator; never returned to mutation callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Nobody is listening for membership changes.
    #[error("No subscribers for membership events")]
    NoSubscribers,

    /// The transport is temporarily down.
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),

    /// The balancer refused the change; retrying will not help.
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

impl NotifyError {
    /// Whether another delivery attempt can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}
