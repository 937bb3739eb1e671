//! # Assignment Coordinator
//!
//! Hands committed membership changes to the balancer without blocking the
//! commit path. Changes are queued on an unbounded channel and delivered in
//! sequence order by one background worker, each with its own retry budget.
//!
//! Servers and tables of a queued change stay "in transition" until their
//! change is delivered or abandoned.

use crate::domain::{GroupName, MembershipChanged, NodeId, RetryPolicy, SequenceNumber, ShardId};
use crate::ports::outbound::MembershipNotifier;
use fleet_telemetry::{NOTIFICATIONS_ABANDONED, NOTIFICATIONS_DELIVERED, SERVERS_IN_TRANSITION};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Entities whose latest change is not yet delivered.
#[derive(Default)]
struct TransitionTracker {
    servers: HashMap<NodeId, (GroupName, SequenceNumber)>,
    tables: HashMap<ShardId, (GroupName, SequenceNumber)>,
}

impl TransitionTracker {
    fn mark(&mut self, change: &MembershipChanged) {
        for server in change.moved_servers() {
            self.servers
                .insert(server.clone(), (change.target.clone(), change.sequence));
        }
        for table in change.moved_tables() {
            self.tables
                .insert(table.clone(), (change.target.clone(), change.sequence));
        }
        SERVERS_IN_TRANSITION.set(self.servers.len() as f64);
    }

    /// Clear entries still owned by `sequence`; later moves keep theirs.
    fn settle(&mut self, sequence: SequenceNumber) {
        self.servers.retain(|_, (_, seq)| *seq != sequence);
        self.tables.retain(|_, (_, seq)| *seq != sequence);
        SERVERS_IN_TRANSITION.set(self.servers.len() as f64);
    }
}

/// Handle to the notification worker.
pub struct AssignmentCoordinator {
    sender: Mutex<Option<mpsc::UnboundedSender<MembershipChanged>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    tracker: Arc<RwLock<TransitionTracker>>,
}

impl AssignmentCoordinator {
    /// Spawn the worker. Must be called inside a Tokio runtime.
    ///
    /// Changes at or below `delivered_up_to` are treated as already delivered.
    pub fn start<N>(notifier: Arc<N>, retry: RetryPolicy, delivered_up_to: SequenceNumber) -> Self
    where
        N: MembershipNotifier + ?Sized + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let tracker = Arc::new(RwLock::new(TransitionTracker::default()));

        let worker = tokio::spawn(run_worker(
            receiver,
            notifier,
            retry,
            Arc::clone(&tracker),
            delivered_up_to,
        ));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            tracker,
        }
    }

    /// Queue a change for delivery. Never blocks and never fails the caller.
    pub fn notify_membership_changed(&self, change: MembershipChanged) {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            warn!(
                "[fg-group-admin] coordinator stopped, dropping change {}",
                change.sequence
            );
            NOTIFICATIONS_ABANDONED.inc();
            return;
        };

        self.tracker.write().mark(&change);
        let sequence = change.sequence;
        if sender.send(change).is_err() {
            // Worker is gone; nothing will settle this change.
            self.tracker.write().settle(sequence);
            NOTIFICATIONS_ABANDONED.inc();
            error!("[fg-group-admin] notification worker exited, dropping change {sequence}");
        }
    }

    /// Servers in transition and the group each is moving to.
    pub fn servers_in_transition(&self) -> HashMap<NodeId, GroupName> {
        self.tracker
            .read()
            .servers
            .iter()
            .map(|(node, (group, _))| (node.clone(), group.clone()))
            .collect()
    }

    /// Tables in transition and the group each is moving to.
    pub fn tables_in_transition(&self) -> HashMap<ShardId, GroupName> {
        self.tracker
            .read()
            .tables
            .iter()
            .map(|(table, (group, _))| (table.clone(), group.clone()))
            .collect()
    }

    /// Stop accepting changes, then wait for queued ones to finish.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("[fg-group-admin] notification worker failed: {e}");
            }
        }
    }
}

async fn run_worker<N>(
    mut receiver: mpsc::UnboundedReceiver<MembershipChanged>,
    notifier: Arc<N>,
    retry: RetryPolicy,
    tracker: Arc<RwLock<TransitionTracker>>,
    mut delivered_up_to: SequenceNumber,
) where
    N: MembershipNotifier + ?Sized,
{
    while let Some(change) = receiver.recv().await {
        let sequence = change.sequence;
        if sequence <= delivered_up_to {
            debug!("[fg-group-admin] skipping stale change {sequence}");
            tracker.write().settle(sequence);
            continue;
        }

        deliver(notifier.as_ref(), &change, &retry).await;
        delivered_up_to = sequence;
        tracker.write().settle(sequence);
    }
    debug!("[fg-group-admin] notification worker drained");
}

async fn deliver<N>(notifier: &N, change: &MembershipChanged, retry: &RetryPolicy)
where
    N: MembershipNotifier + ?Sized,
{
    let mut attempt = 1;
    loop {
        match notifier.notify(change).await {
            Ok(()) => {
                NOTIFICATIONS_DELIVERED.inc();
                debug!(
                    sequence = change.sequence.value(),
                    attempt, "[fg-group-admin] membership change delivered"
                );
                return;
            }
            Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                let delay = retry.backoff(attempt);
                warn!(
                    sequence = change.sequence.value(),
                    attempt,
                    "[fg-group-admin] delivery failed ({e}), retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                NOTIFICATIONS_ABANDONED.inc();
                error!(
                    sequence = change.sequence.value(),
                    attempt,
                    kind = %change.kind,
                    "[fg-group-admin] abandoning membership change: {e}"
                );
                return;
            }
        }
    }
}
