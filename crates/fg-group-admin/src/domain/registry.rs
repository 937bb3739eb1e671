//! # Group Registry
//!
//! In-memory authoritative membership state, rebuilt from the mutation log.
//!
//! Two indexes are kept in step with the per-group sets so that
//! "which group is server X in" is a single hash lookup.

use super::entities::{GroupDelta, GroupInfo, Mutation, MutationRecord};
use super::errors::GroupError;
use super::value_objects::{GroupName, NodeId, SequenceNumber, ShardId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Result of applying one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Record applied; non-empty per-group changes it caused.
    Applied(Vec<GroupDelta>),
    /// Record was at or below `last_applied` and ignored.
    Skipped,
}

/// Group membership registry.
///
/// Servers and tables absent from the indexes belong to the default group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRegistry {
    groups: BTreeMap<GroupName, GroupInfo>,
    server_index: HashMap<NodeId, GroupName>,
    table_index: HashMap<ShardId, GroupName>,
    default_group: GroupName,
    last_applied: SequenceNumber,
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupRegistry {
    /// A registry holding only the empty default group.
    pub fn new() -> Self {
        let default_group = GroupName::default_group();
        let mut groups = BTreeMap::new();
        groups.insert(default_group.clone(), GroupInfo::new(default_group.clone()));
        Self {
            groups,
            server_index: HashMap::new(),
            table_index: HashMap::new(),
            default_group,
            last_applied: SequenceNumber::ZERO,
        }
    }

    /// Rebuild a registry from records in commit order.
    pub fn replay<'a>(
        records: impl IntoIterator<Item = &'a MutationRecord>,
    ) -> Result<Self, GroupError> {
        let mut registry = Self::new();
        for record in records {
            registry.apply(record)?;
        }
        Ok(registry)
    }

    /// Group a server belongs to; the default group when unassigned.
    pub fn group_of_node(&self, node: &NodeId) -> &GroupName {
        self.server_index.get(node).unwrap_or(&self.default_group)
    }

    /// Group a table is bound to; the default group when unbound.
    pub fn group_of_shard(&self, shard: &ShardId) -> &GroupName {
        self.table_index.get(shard).unwrap_or(&self.default_group)
    }

    /// Whether the table has an explicit binding.
    pub fn is_shard_bound(&self, shard: &ShardId) -> bool {
        self.table_index.contains_key(shard)
    }

    /// Look up a group.
    pub fn group(&self, name: &GroupName) -> Option<&GroupInfo> {
        self.groups.get(name)
    }

    /// Whether a group exists.
    pub fn contains_group(&self, name: &GroupName) -> bool {
        self.groups.contains_key(name)
    }

    /// Snapshot of every group, ordered by name.
    pub fn list_groups(&self) -> Vec<GroupInfo> {
        self.groups.values().cloned().collect()
    }

    /// Every group, ordered by name, without cloning.
    pub fn groups(&self) -> impl Iterator<Item = &GroupInfo> + '_ {
        self.groups.values()
    }

    /// Number of groups, including the default group.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Highest applied sequence number.
    pub fn last_applied(&self) -> SequenceNumber {
        self.last_applied
    }

    /// The default group's name.
    pub fn default_group(&self) -> &GroupName {
        &self.default_group
    }

    /// Apply a validated, persisted record.
    ///
    /// Records at or below `last_applied` are skipped. A record that cannot
    /// apply fails with `InconsistentLog` and leaves the registry untouched.
    pub fn apply(&mut self, record: &MutationRecord) -> Result<ApplyOutcome, GroupError> {
        if record.sequence <= self.last_applied {
            return Ok(ApplyOutcome::Skipped);
        }

        let deltas = match &record.mutation {
            Mutation::AddGroup { name } => {
                if self.groups.contains_key(name) {
                    return Err(inconsistent(record, format!("group {name} already exists")));
                }
                self.groups.insert(name.clone(), GroupInfo::new(name.clone()));
                Vec::new()
            }
            Mutation::RemoveGroup { name } => {
                let Some(info) = self.groups.get(name) else {
                    return Err(inconsistent(record, format!("group {name} does not exist")));
                };
                if name.is_default() {
                    return Err(inconsistent(record, "default group removed".to_string()));
                }
                if !info.is_empty() {
                    return Err(inconsistent(record, format!("group {name} is not empty")));
                }
                self.groups.remove(name);
                Vec::new()
            }
            Mutation::MoveServers { servers, target } => {
                if !self.groups.contains_key(target) {
                    return Err(inconsistent(record, format!("group {target} does not exist")));
                }
                self.move_servers(servers, target)
            }
            Mutation::MoveTables { tables, target } => {
                if !self.groups.contains_key(target) {
                    return Err(inconsistent(record, format!("group {target} does not exist")));
                }
                self.move_tables(tables, target)
            }
        };

        self.last_applied = record.sequence;
        Ok(ApplyOutcome::Applied(deltas))
    }

    // Target existence is checked by the caller; nothing below can fail.
    fn move_servers(&mut self, servers: &BTreeSet<NodeId>, target: &GroupName) -> Vec<GroupDelta> {
        let mut deltas: BTreeMap<GroupName, GroupDelta> = BTreeMap::new();

        for server in servers {
            let source = self.group_of_node(server).clone();
            if &source != target {
                if let Some(info) = self.groups.get_mut(&source) {
                    info.servers.remove(server);
                }
                deltas
                    .entry(source.clone())
                    .or_insert_with(|| GroupDelta::new(source))
                    .removed_servers
                    .insert(server.clone());
                deltas
                    .entry(target.clone())
                    .or_insert_with(|| GroupDelta::new(target.clone()))
                    .added_servers
                    .insert(server.clone());
            }
            if let Some(info) = self.groups.get_mut(target) {
                info.servers.insert(server.clone());
            }
            self.server_index.insert(server.clone(), target.clone());
        }

        deltas.into_values().filter(|d| !d.is_empty()).collect()
    }

    fn move_tables(&mut self, tables: &BTreeSet<ShardId>, target: &GroupName) -> Vec<GroupDelta> {
        let mut deltas: BTreeMap<GroupName, GroupDelta> = BTreeMap::new();

        for table in tables {
            let source = self.group_of_shard(table).clone();
            if &source != target {
                if let Some(info) = self.groups.get_mut(&source) {
                    info.tables.remove(table);
                }
                deltas
                    .entry(source.clone())
                    .or_insert_with(|| GroupDelta::new(source))
                    .removed_tables
                    .insert(table.clone());
                deltas
                    .entry(target.clone())
                    .or_insert_with(|| GroupDelta::new(target.clone()))
                    .added_tables
                    .insert(table.clone());
            }
            if let Some(info) = self.groups.get_mut(target) {
                info.tables.insert(table.clone());
            }
            self.table_index.insert(table.clone(), target.clone());
        }

        deltas.into_values().filter(|d| !d.is_empty()).collect()
    }

    /// Servers with an explicit assignment.
    pub(crate) fn assigned_servers(&self) -> impl Iterator<Item = (&NodeId, &GroupName)> + '_ {
        self.server_index.iter()
    }

    /// Tables with an explicit binding.
    pub(crate) fn bound_tables(&self) -> impl Iterator<Item = (&ShardId, &GroupName)> + '_ {
        self.table_index.iter()
    }
}

fn inconsistent(record: &MutationRecord, reason: String) -> GroupError {
    GroupError::InconsistentLog(format!(
        "record {} ({}): {reason}",
        record.sequence,
        record.mutation.kind()
    ))
}
