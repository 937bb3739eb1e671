//! # Fleet Events
//!
//! Defines all event types that flow through the shared bus.
//!
//! Events are plain data (group names and addresses as strings) so that the
//! balancer side does not need to depend on the group administration crate.

use serde::{Deserialize, Serialize};

/// Per-group membership change carried by move events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDeltaPayload {
    /// Group whose membership changed.
    pub group: String,
    /// Servers (`host:port`) that joined the group.
    pub added_servers: Vec<String>,
    /// Servers that left the group.
    pub removed_servers: Vec<String>,
    /// Tables bound to the group by this change.
    pub added_tables: Vec<String>,
    /// Tables unbound from the group by this change.
    pub removed_tables: Vec<String>,
}

impl GroupDeltaPayload {
    /// True when nothing moved in or out of the group.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_servers.is_empty()
            && self.removed_servers.is_empty()
            && self.added_tables.is_empty()
            && self.removed_tables.is_empty()
    }
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FleetEvent {
    // =========================================================================
    // GROUP LIFECYCLE
    // =========================================================================
    /// A group was created.
    GroupAdded {
        /// Commit sequence number of the mutation.
        sequence: u64,
        /// Name of the new group.
        group: String,
    },

    /// An empty group was removed.
    GroupRemoved {
        /// Commit sequence number of the mutation.
        sequence: u64,
        /// Name of the removed group.
        group: String,
    },

    // =========================================================================
    // MEMBERSHIP (consumed by the balancer)
    // =========================================================================
    /// Servers moved to `target_group`; the balancer must re-place the
    /// regions they host.
    ServersMoved {
        /// Commit sequence number of the mutation.
        sequence: u64,
        /// Destination group.
        target_group: String,
        /// Per-group additions and removals.
        deltas: Vec<GroupDeltaPayload>,
    },

    /// Tables were bound to `target_group`; their regions must move onto
    /// servers of that group.
    TablesMoved {
        /// Commit sequence number of the mutation.
        sequence: u64,
        /// Destination group.
        target_group: String,
        /// Per-group additions and removals.
        deltas: Vec<GroupDeltaPayload>,
    },
}

impl FleetEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::GroupAdded { .. } | Self::GroupRemoved { .. } => EventTopic::GroupLifecycle,
            Self::ServersMoved { .. } => EventTopic::ServerMembership,
            Self::TablesMoved { .. } => EventTopic::TableMembership,
        }
    }

    /// Commit sequence number of the mutation behind this event.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        match self {
            Self::GroupAdded { sequence, .. }
            | Self::GroupRemoved { sequence, .. }
            | Self::ServersMoved { sequence, .. }
            | Self::TablesMoved { sequence, .. } => *sequence,
        }
    }

    /// Whether this event touches the named group.
    #[must_use]
    pub fn touches_group(&self, name: &str) -> bool {
        match self {
            Self::GroupAdded { group, .. } | Self::GroupRemoved { group, .. } => group == name,
            Self::ServersMoved {
                target_group,
                deltas,
                ..
            }
            | Self::TablesMoved {
                target_group,
                deltas,
                ..
            } => target_group == name || deltas.iter().any(|d| d.group == name),
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Group creation and removal.
    GroupLifecycle,
    /// Server moves between groups.
    ServerMembership,
    /// Table bindings.
    TableMembership,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Groups of interest. Empty means all groups.
    pub groups: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            groups: Vec::new(),
        }
    }

    /// Create a filter for events touching specific groups.
    #[must_use]
    pub fn groups(groups: Vec<String>) -> Self {
        Self {
            topics: Vec::new(),
            groups,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &FleetEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let group_match =
            self.groups.is_empty() || self.groups.iter().any(|g| event.touches_group(g));

        topic_match && group_match
    }
}
