//! # Domain Invariants
//!
//! Structural rules the registry must satisfy after every applied record.
//! Checked after replay at startup and by the property tests.

use super::errors::GroupError;
use super::registry::GroupRegistry;
use super::value_objects::{GroupName, NodeId};
use std::collections::HashMap;

/// Invariant: the default group exists.
pub fn invariant_default_group_exists(registry: &GroupRegistry) -> Result<(), GroupError> {
    if registry.contains_group(registry.default_group()) {
        Ok(())
    } else {
        Err(GroupError::InconsistentLog(
            "default group is missing".to_string(),
        ))
    }
}

/// Invariant: every assigned server is listed by exactly one group, and that
/// group is the one the index points to.
pub fn invariant_single_membership(registry: &GroupRegistry) -> Result<(), GroupError> {
    let mut holders: HashMap<&NodeId, Vec<&GroupName>> = HashMap::new();
    for info in registry.groups() {
        for server in &info.servers {
            holders.entry(server).or_default().push(&info.name);
        }
    }

    if holders.len() != registry.assigned_servers().count() {
        return Err(GroupError::InconsistentLog(
            "group server lists disagree with the server index".to_string(),
        ));
    }

    for (server, group) in registry.assigned_servers() {
        match holders.get(server).map(Vec::as_slice) {
            Some([holder]) if *holder == group => {}
            other => {
                return Err(GroupError::InconsistentLog(format!(
                    "server {server} indexed in {group} but listed by {other:?}"
                )))
            }
        }
    }
    Ok(())
}

/// Invariant: every bound table points at an existing group that lists it.
pub fn invariant_tables_bound_once(registry: &GroupRegistry) -> Result<(), GroupError> {
    for (table, group) in registry.bound_tables() {
        let listed = registry
            .group(group)
            .is_some_and(|g| g.tables.contains(table));
        if !listed {
            return Err(GroupError::InconsistentLog(format!(
                "table {table} bound to {group} but not listed there"
            )));
        }
    }

    let listed: usize = registry.groups().map(|g| g.tables.len()).sum();
    if listed != registry.bound_tables().count() {
        return Err(GroupError::InconsistentLog(
            "group table lists disagree with the table index".to_string(),
        ));
    }
    Ok(())
}

/// Run every invariant.
pub fn check_all(registry: &GroupRegistry) -> Result<(), GroupError> {
    invariant_default_group_exists(registry)?;
    invariant_single_membership(registry)?;
    invariant_tables_bound_once(registry)
}
