//! # Inbound Ports
//!
//! API trait defining what the group administration service can do.
//!
//! Identifiers arrive as strings, the way an admin shell or RPC layer
//! passes them; malformed input fails with a `Validation` error.

use crate::domain::{GroupError, GroupInfo, GroupName, NodeId, SequenceNumber, ShardId};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Group administration API - inbound port.
#[async_trait]
pub trait GroupAdminApi: Send + Sync {
    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Group a server belongs to; the default group if never assigned.
    async fn get_group_of_server(&self, server: &str) -> Result<GroupInfo, GroupError>;

    /// Group a table is bound to; the default group if unbound.
    async fn get_group_of_table(&self, table: &str) -> Result<GroupInfo, GroupError>;

    /// A single group by name.
    async fn get_group_info(&self, group: &str) -> Result<GroupInfo, GroupError>;

    /// Every group, ordered by name.
    async fn list_groups(&self) -> Result<Vec<GroupInfo>, GroupError>;

    /// Tables bound to a group.
    async fn list_tables_of_group(&self, group: &str) -> Result<BTreeSet<ShardId>, GroupError>;

    /// Servers whose move the balancer has not acknowledged, with the target.
    async fn list_servers_in_transition(&self) -> Result<BTreeMap<NodeId, GroupName>, GroupError>;

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Create an empty group.
    async fn add_group(&self, group: &str) -> Result<SequenceNumber, GroupError>;

    /// Delete an empty, non-default group.
    async fn remove_group(&self, group: &str) -> Result<SequenceNumber, GroupError>;

    /// Move servers into `target`. All move or none do.
    async fn move_servers(&self, servers: &[&str], target: &str)
        -> Result<SequenceNumber, GroupError>;

    /// Bind tables to `target`. All move or none do.
    async fn move_tables(&self, tables: &[&str], target: &str) -> Result<SequenceNumber, GroupError>;

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Poll until none of `servers` is in transition, or fail with
    /// `TransitionTimeout` after `timeout`.
    async fn wait_for_transitions(&self, servers: &[&str], timeout: Duration)
        -> Result<(), GroupError>;

    /// `move_servers`, then wait for the balancer within the operation timeout.
    async fn move_servers_and_wait(
        &self,
        servers: &[&str],
        target: &str,
    ) -> Result<SequenceNumber, GroupError>;
}
