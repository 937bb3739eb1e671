//! # Outbound Ports
//!
//! Traits for the durable mutation log and the balancer notification
//! channel, plus a recording notifier for tests.

use crate::domain::{
    MembershipChanged, Mutation, MutationRecord, NotifyError, PersistenceError, SequenceNumber,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Durable, ordered log of committed mutations.
#[async_trait]
pub trait MutationLog: Send + Sync {
    /// Durably append `mutation`, assigning the next sequence number.
    ///
    /// On error nothing was written and no sequence number was consumed.
    async fn commit(&self, mutation: Mutation) -> Result<MutationRecord, PersistenceError>;

    /// Every committed record in commit order.
    async fn load_all(&self) -> Result<Vec<MutationRecord>, PersistenceError>;

    /// Highest committed sequence number (`ZERO` when empty).
    async fn last_sequence(&self) -> Result<SequenceNumber, PersistenceError>;
}

/// Delivers membership changes to the workload-assignment process.
#[async_trait]
pub trait MembershipNotifier: Send + Sync {
    /// Deliver one change. Errors are retried by the coordinator.
    async fn notify(&self, change: &MembershipChanged) -> Result<(), NotifyError>;
}

// =============================================================================
// Test double
// =============================================================================

/// Notifier that records deliveries and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<MembershipChanged>>,
    fail_next: AtomicU32,
    attempts: AtomicU32,
    rejecting: Mutex<Option<String>>,
}

impl RecordingNotifier {
    /// A notifier that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` deliveries with `NotifyError::Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Reject every delivery with `NotifyError::Rejected`; `None` stops.
    pub fn set_rejecting(&self, reason: Option<&str>) {
        *self.rejecting.lock() = reason.map(str::to_string);
    }

    /// Successfully delivered changes, in delivery order.
    pub fn delivered(&self) -> Vec<MembershipChanged> {
        self.delivered.lock().clone()
    }

    /// Delivery attempts, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipNotifier for RecordingNotifier {
    async fn notify(&self, change: &MembershipChanged) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.rejecting.lock().clone() {
            return Err(NotifyError::Rejected(reason));
        }

        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotifyError::Unavailable("injected failure".to_string()));
        }

        self.delivered.lock().push(change.clone());
        Ok(())
    }
}
