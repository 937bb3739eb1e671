//! # Shared Bus - Event Bus for Fleet Membership Events
//!
//! Carries group lifecycle and membership events from the group
//! administration service to the balancer.
//!
//! ```text
//! ┌──────────────────┐                    ┌──────────────┐
//! │ Group Admin      │                    │  Balancer    │
//! │ (coordinator)    │    publish()       │              │
//! │                  │ ──────┐            │              │
//! └──────────────────┘       │            └──────────────┘
//!                            ▼                    ↑
//!                      ┌──────────────┐          │
//!                      │  Event Bus   │          │
//!                      │              │ ─────────┘
//!                      └──────────────┘  subscribe()
//! ```
//!
//! Delivery is at-most-once per subscriber: a subscriber that is not
//! listening when an event is published never sees it. Publishers that need
//! a listener check the count returned by `publish`, which only includes
//! subscribers whose filter accepts the event.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, FleetEvent, GroupDeltaPayload};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
