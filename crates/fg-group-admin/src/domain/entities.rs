//! # Domain Entities
//!
//! Mutations, the records the log stores them in, and the read models
//! handed back to callers.

use super::value_objects::{GroupName, NodeId, SequenceNumber, ShardId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A requested change to group membership.
///
/// Server and table batches are sets, so duplicates in a request collapse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Create an empty group.
    AddGroup {
        /// Group to create
        name: GroupName,
    },
    /// Delete an empty, non-default group.
    RemoveGroup {
        /// Group to delete
        name: GroupName,
    },
    /// Move servers into `target`, all or none.
    MoveServers {
        /// Servers to move
        servers: BTreeSet<NodeId>,
        /// Destination group
        target: GroupName,
    },
    /// Bind tables to `target`, all or none.
    MoveTables {
        /// Tables to bind
        tables: BTreeSet<ShardId>,
        /// Destination group
        target: GroupName,
    },
}

impl Mutation {
    /// Kind of this mutation.
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::AddGroup { .. } => MutationKind::AddGroup,
            Self::RemoveGroup { .. } => MutationKind::RemoveGroup,
            Self::MoveServers { .. } => MutationKind::MoveServers,
            Self::MoveTables { .. } => MutationKind::MoveTables,
        }
    }

    /// The group this mutation creates, removes, or moves into.
    pub fn target_group(&self) -> &GroupName {
        match self {
            Self::AddGroup { name } | Self::RemoveGroup { name } => name,
            Self::MoveServers { target, .. } | Self::MoveTables { target, .. } => target,
        }
    }

    /// Number of servers or tables in a move batch; zero for lifecycle changes.
    pub fn batch_len(&self) -> usize {
        match self {
            Self::AddGroup { .. } | Self::RemoveGroup { .. } => 0,
            Self::MoveServers { servers, .. } => servers.len(),
            Self::MoveTables { tables, .. } => tables.len(),
        }
    }
}

/// Mutation discriminant, used for logs, metrics, and notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// Group created
    AddGroup,
    /// Group removed
    RemoveGroup,
    /// Servers moved
    MoveServers,
    /// Tables bound
    MoveTables,
}

impl MutationKind {
    /// Snake-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddGroup => "add_group",
            Self::RemoveGroup => "remove_group",
            Self::MoveServers => "move_servers",
            Self::MoveTables => "move_tables",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation as durably committed to the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Position in commit order
    pub sequence: SequenceNumber,
    /// The committed change
    pub mutation: Mutation,
    /// Commit wall-clock time, milliseconds since the Unix epoch
    pub committed_at_ms: u64,
}

/// Snapshot of one group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Group name
    pub name: GroupName,
    /// Servers explicitly assigned to the group
    pub servers: BTreeSet<NodeId>,
    /// Tables bound to the group
    pub tables: BTreeSet<ShardId>,
}

impl GroupInfo {
    /// An empty group.
    pub fn new(name: GroupName) -> Self {
        Self {
            name,
            servers: BTreeSet::new(),
            tables: BTreeSet::new(),
        }
    }

    /// No servers and no tables.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty() && self.tables.is_empty()
    }
}

/// How one group's membership changed when a record was applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDelta {
    /// Group that changed
    pub group: GroupName,
    /// Servers that joined
    pub added_servers: BTreeSet<NodeId>,
    /// Servers that left
    pub removed_servers: BTreeSet<NodeId>,
    /// Tables newly bound
    pub added_tables: BTreeSet<ShardId>,
    /// Tables unbound
    pub removed_tables: BTreeSet<ShardId>,
}

impl GroupDelta {
    /// No change for `group` yet.
    pub fn new(group: GroupName) -> Self {
        Self {
            group,
            added_servers: BTreeSet::new(),
            removed_servers: BTreeSet::new(),
            added_tables: BTreeSet::new(),
            removed_tables: BTreeSet::new(),
        }
    }

    /// Nothing moved.
    pub fn is_empty(&self) -> bool {
        self.added_servers.is_empty()
            && self.removed_servers.is_empty()
            && self.added_tables.is_empty()
            && self.removed_tables.is_empty()
    }
}

/// Notification handed to the balancer after a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipChanged {
    /// Sequence of the committed record
    pub sequence: SequenceNumber,
    /// What kind of change
    pub kind: MutationKind,
    /// Group created, removed, or moved into
    pub target: GroupName,
    /// Per-group changes; empty for lifecycle changes
    pub deltas: Vec<GroupDelta>,
}

impl MembershipChanged {
    /// Servers whose group changed.
    pub fn moved_servers(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.deltas.iter().flat_map(|d| d.added_servers.iter())
    }

    /// Tables whose binding changed.
    pub fn moved_tables(&self) -> impl Iterator<Item = &ShardId> + '_ {
        self.deltas.iter().flat_map(|d| d.added_tables.iter())
    }
}
