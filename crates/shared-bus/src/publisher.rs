//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use crate::events::{EventFilter, FleetEvent};
use crate::subscriber::{EventStream, Subscription, SubscriptionRegistry};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers whose filter accepts the event.
    /// Subscribers that would discard it are not counted.
    async fn publish(&self, event: FleetEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Suitable for a balancer running in the same process as the group service;
/// a remote balancer needs a different transport behind the same trait.
pub struct InMemoryEventBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<FleetEvent>,

    /// Filters of live subscriptions, by subscription id.
    subscriptions: SubscriptionRegistry,

    /// Next subscription id.
    next_subscription_id: AtomicU64,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            next_subscription_id: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut subs) = self.subscriptions.write() {
            subs.insert(id, filter.clone());
        }

        debug!(id, topics = ?filter.topics, groups = ?filter.groups, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), id)
    }

    /// Get a stream of events matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of live subscriptions whose filter accepts `event`.
    #[must_use]
    pub fn matching_subscribers(&self, event: &FleetEvent) -> usize {
        self.subscriptions
            .read()
            .map(|subs| subs.values().filter(|f| f.matches(event)).count())
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: FleetEvent) -> usize {
        let topic = event.topic();
        let sequence = event.sequence();

        let matching = self.matching_subscribers(&event);

        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(
                    topic = ?topic,
                    sequence,
                    receivers = receiver_count,
                    matching,
                    "Event published"
                );
                matching
            }
            Err(e) => {
                warn!(
                    topic = ?topic,
                    sequence,
                    error = %e,
                    "Event dropped (no receivers)"
                );
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
