//! `GroupAdminApi` implementation.

use super::{record_rejection, GroupAdminService};
use crate::domain::{
    GroupError, GroupInfo, GroupName, MembershipValidator, Mutation, NodeId, SequenceNumber,
    ShardId,
};
use crate::ports::inbound::GroupAdminApi;
use crate::ports::outbound::MutationLog;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info};

impl<L: MutationLog + 'static> GroupAdminService<L> {
    fn group_info(&self, name: &GroupName) -> Result<GroupInfo, GroupError> {
        self.read(|registry| registry.group(name).cloned())
            .ok_or_else(|| GroupError::UnknownGroup(name.to_string()))
    }

    fn pending_servers(&self, servers: &BTreeSet<NodeId>) -> Vec<NodeId> {
        let in_transition = self.servers_in_transition();
        servers
            .iter()
            .filter(|server| in_transition.contains_key(*server))
            .cloned()
            .collect()
    }

    async fn mutate(&self, mutation: Mutation) -> Result<SequenceNumber, GroupError> {
        self.submit(mutation, self.config().operation_timeout()).await
    }
}

/// Parse every entry; the first malformed one fails the whole request.
fn parse_all<T: Ord>(
    inputs: &[&str],
    parse: impl Fn(&str) -> Result<T, GroupError>,
) -> Result<BTreeSet<T>, GroupError> {
    inputs
        .iter()
        .map(|input| parse(input))
        .collect::<Result<_, _>>()
        .map_err(record_rejection)
}

fn parse_group(input: &str) -> Result<GroupName, GroupError> {
    MembershipValidator::group_name(input).map_err(record_rejection)
}

#[async_trait]
impl<L: MutationLog + 'static> GroupAdminApi for GroupAdminService<L> {
    async fn get_group_of_server(&self, server: &str) -> Result<GroupInfo, GroupError> {
        let node = MembershipValidator::server(server)?;
        let info = self.read(|registry| {
            let group = registry.group_of_node(&node);
            registry
                .group(group)
                .cloned()
                .ok_or_else(|| {
                    GroupError::InconsistentLog(format!("{node} assigned to missing group {group}"))
                })
        })?;
        debug!("[fg-group-admin] {} is in group {}", node, info.name);
        Ok(info)
    }

    async fn get_group_of_table(&self, table: &str) -> Result<GroupInfo, GroupError> {
        let shard = MembershipValidator::table(table)?;
        let info = self.read(|registry| {
            let group = registry.group_of_shard(&shard);
            registry
                .group(group)
                .cloned()
                .ok_or_else(|| {
                    GroupError::InconsistentLog(format!("{shard} bound to missing group {group}"))
                })
        })?;
        debug!("[fg-group-admin] {} is bound to group {}", shard, info.name);
        Ok(info)
    }

    async fn get_group_info(&self, group: &str) -> Result<GroupInfo, GroupError> {
        let name = MembershipValidator::group_name(group)?;
        self.group_info(&name)
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, GroupError> {
        Ok(self.read(|registry| registry.list_groups()))
    }

    async fn list_tables_of_group(&self, group: &str) -> Result<BTreeSet<ShardId>, GroupError> {
        let name = MembershipValidator::group_name(group)?;
        Ok(self.group_info(&name)?.tables)
    }

    async fn list_servers_in_transition(&self) -> Result<BTreeMap<NodeId, GroupName>, GroupError> {
        Ok(self.servers_in_transition().into_iter().collect())
    }

    async fn add_group(&self, group: &str) -> Result<SequenceNumber, GroupError> {
        let name = parse_group(group)?;
        self.mutate(Mutation::AddGroup { name }).await
    }

    async fn remove_group(&self, group: &str) -> Result<SequenceNumber, GroupError> {
        let name = parse_group(group)?;
        self.mutate(Mutation::RemoveGroup { name }).await
    }

    async fn move_servers(
        &self,
        servers: &[&str],
        target: &str,
    ) -> Result<SequenceNumber, GroupError> {
        let servers = parse_all(servers, MembershipValidator::server)?;
        let target = parse_group(target)?;
        self.mutate(Mutation::MoveServers { servers, target }).await
    }

    async fn move_tables(&self, tables: &[&str], target: &str) -> Result<SequenceNumber, GroupError> {
        let tables = parse_all(tables, MembershipValidator::table)?;
        let target = parse_group(target)?;
        self.mutate(Mutation::MoveTables { tables, target }).await
    }

    async fn wait_for_transitions(
        &self,
        servers: &[&str],
        timeout: Duration,
    ) -> Result<(), GroupError> {
        let servers = parse_all(servers, MembershipValidator::server)?;
        let deadline = tokio::time::Instant::now() + timeout;
        let poll = self.config().transition_poll_interval();

        loop {
            let pending = self.pending_servers(&servers);
            if pending.is_empty() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(GroupError::TransitionTimeout { servers: pending });
            }
            debug!(
                "[fg-group-admin] waiting on {} server(s) in transition",
                pending.len()
            );
            tokio::time::sleep(poll).await;
        }
    }

    async fn move_servers_and_wait(
        &self,
        servers: &[&str],
        target: &str,
    ) -> Result<SequenceNumber, GroupError> {
        let sequence = self.move_servers(servers, target).await?;
        self.wait_for_transitions(servers, self.config().operation_timeout())
            .await?;
        info!(
            "[fg-group-admin] {} server(s) settled in {} (sequence {})",
            servers.len(),
            target,
            sequence
        );
        Ok(sequence)
    }
}
