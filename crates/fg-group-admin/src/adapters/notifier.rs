//! Membership notifier adapters.
//!
//! `BusMembershipNotifier` maps each change onto a `FleetEvent` and
//! publishes it on the shared bus, where the balancer subscribes.

use crate::domain::{GroupDelta, MembershipChanged, MutationKind, NotifyError};
use crate::ports::outbound::MembershipNotifier;
use async_trait::async_trait;
use shared_bus::{EventPublisher, FleetEvent, GroupDeltaPayload, InMemoryEventBus};
use std::sync::Arc;
use tracing::debug;

/// Publishes membership changes on the shared event bus.
///
/// A publish that no subscriber's filter accepts fails with `NoSubscribers`,
/// so the coordinator keeps retrying until an interested balancer listens.
pub struct BusMembershipNotifier {
    bus: Arc<InMemoryEventBus>,
}

impl BusMembershipNotifier {
    /// Create a notifier publishing on `bus`.
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl MembershipNotifier for BusMembershipNotifier {
    async fn notify(&self, change: &MembershipChanged) -> Result<(), NotifyError> {
        let event = to_event(change);
        let receivers = self.bus.publish(event).await;
        if receivers == 0 {
            return Err(NotifyError::NoSubscribers);
        }
        debug!(
            "[fg-group-admin] membership change {} published to {} subscriber(s)",
            change.sequence, receivers
        );
        Ok(())
    }
}

/// Accepts every change. For deployments without a balancer.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl MembershipNotifier for NoOpNotifier {
    async fn notify(&self, _change: &MembershipChanged) -> Result<(), NotifyError> {
        Ok(())
    }
}

fn to_event(change: &MembershipChanged) -> FleetEvent {
    let sequence = change.sequence.value();
    let group = change.target.to_string();
    match change.kind {
        MutationKind::AddGroup => FleetEvent::GroupAdded { sequence, group },
        MutationKind::RemoveGroup => FleetEvent::GroupRemoved { sequence, group },
        MutationKind::MoveServers => FleetEvent::ServersMoved {
            sequence,
            target_group: group,
            deltas: change.deltas.iter().map(to_payload).collect(),
        },
        MutationKind::MoveTables => FleetEvent::TablesMoved {
            sequence,
            target_group: group,
            deltas: change.deltas.iter().map(to_payload).collect(),
        },
    }
}

fn to_payload(delta: &GroupDelta) -> GroupDeltaPayload {
    fn strings<T: ToString>(items: &std::collections::BTreeSet<T>) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    GroupDeltaPayload {
        group: delta.group.to_string(),
        added_servers: strings(&delta.added_servers),
        removed_servers: strings(&delta.removed_servers),
        added_tables: strings(&delta.added_tables),
        removed_tables: strings(&delta.removed_tables),
    }
}
