//! # Group Admin Service
//!
//! Composes the registry, validator, mutation log and coordinator.
//!
//! ## Mutation path
//!
//! ```text
//! caller ──submit──► spawned task ──► lock ─► validate ─► log.commit ─► registry.apply
//!    │                                                               │
//!    └── timeout ◄── join handle                         coordinator.notify (queue)
//! ```
//!
//! Mutations are serialized by one async mutex held from validation through
//! the coordinator enqueue, so commit order, apply order and delivery order
//! agree. Reads only take the registry read lock.

mod api;
mod coordinator;


pub use coordinator::AssignmentCoordinator;

use crate::domain::{
    check_all, ApplyOutcome, GroupAdminConfig, GroupError, GroupName, GroupRegistry,
    MembershipChanged, MembershipValidator, Mutation, MutationRecord, NodeId, SequenceNumber,
    ShardId, ValidationContext,
};
use crate::ports::outbound::{MembershipNotifier, MutationLog};
use fleet_telemetry::{
    log_mutation_event, time_histogram, MUTATIONS_COMMITTED, MUTATIONS_REJECTED,
    MUTATION_COMMIT_DURATION, MUTATION_TIMEOUTS, PERSISTENCE_RETRIES, RECORDS_REPLAYED,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Group administration service.
///
/// Cheap to clone; clones share the same registry and log.
pub struct GroupAdminService<L: MutationLog + 'static> {
    inner: Arc<ServiceInner<L>>,
}

impl<L: MutationLog + 'static> Clone for GroupAdminService<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ServiceInner<L> {
    log: Arc<L>,
    registry: RwLock<GroupRegistry>,
    mutation_lock: tokio::sync::Mutex<()>,
    validator: MembershipValidator,
    coordinator: AssignmentCoordinator,
    config: GroupAdminConfig,
}

impl<L: MutationLog + 'static> GroupAdminService<L> {
    /// Build the service by replaying every record in `log`.
    ///
    /// Replayed records are not re-sent to the balancer. Must be called
    /// inside a Tokio runtime.
    pub async fn recover<N>(
        log: Arc<L>,
        notifier: Arc<N>,
        config: GroupAdminConfig,
    ) -> Result<Self, GroupError>
    where
        N: MembershipNotifier + ?Sized + 'static,
    {
        config.validate()?;

        let records = log
            .load_all()
            .await
            .map_err(|source| GroupError::Persistence {
                attempts: 1,
                source,
            })?;
        let registry = GroupRegistry::replay(&records)?;
        check_all(&registry)?;
        RECORDS_REPLAYED.inc_by(records.len() as f64);

        info!(
            "[fg-group-admin] recovered {} group(s) from {} record(s), last sequence {}",
            registry.group_count(),
            records.len(),
            registry.last_applied()
        );

        let coordinator = AssignmentCoordinator::start(
            notifier,
            config.notify_retry.clone(),
            registry.last_applied(),
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                log,
                registry: RwLock::new(registry),
                mutation_lock: tokio::sync::Mutex::new(()),
                validator: MembershipValidator::new(
                    config.max_batch_size,
                    config.reject_moves_in_transition,
                ),
                coordinator,
                config,
            }),
        })
    }

    /// Commit `mutation`, waiting at most `timeout`.
    ///
    /// On `Timeout` the mutation keeps running and may still apply.
    pub async fn submit(
        &self,
        mutation: Mutation,
        timeout: Duration,
    ) -> Result<SequenceNumber, GroupError> {
        let kind = mutation.kind();
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.commit(mutation).await });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(GroupError::ServiceUnavailable(format!(
                "mutation task failed: {e}"
            ))),
            Err(_) => {
                MUTATION_TIMEOUTS.inc();
                warn!(
                    "[fg-group-admin] {} timed out after {:?}; it may still apply",
                    kind, timeout
                );
                Err(GroupError::Timeout {
                    millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Highest sequence applied to the registry.
    pub fn last_applied(&self) -> SequenceNumber {
        self.inner.registry.read().last_applied()
    }

    /// Copy of the current registry.
    pub fn registry_snapshot(&self) -> GroupRegistry {
        self.inner.registry.read().clone()
    }

    /// Servers whose move is not yet delivered, with their target group.
    pub fn servers_in_transition(&self) -> HashMap<NodeId, GroupName> {
        self.inner.coordinator.servers_in_transition()
    }

    /// Tables whose move is not yet delivered, with their target group.
    pub fn tables_in_transition(&self) -> HashMap<ShardId, GroupName> {
        self.inner.coordinator.tables_in_transition()
    }

    /// Active configuration.
    pub fn config(&self) -> &GroupAdminConfig {
        &self.inner.config
    }

    /// The mutation log this service writes to.
    pub fn log(&self) -> &Arc<L> {
        &self.inner.log
    }

    /// Stop the coordinator after it drains queued notifications.
    pub async fn shutdown(&self) {
        self.inner.coordinator.shutdown().await;
        debug!("[fg-group-admin] service shut down");
    }

    fn read<R>(&self, f: impl FnOnce(&GroupRegistry) -> R) -> R {
        f(&self.inner.registry.read())
    }
}

impl<L: MutationLog + 'static> ServiceInner<L> {
    async fn commit(&self, mutation: Mutation) -> Result<SequenceNumber, GroupError> {
        let _serial = self.mutation_lock.lock().await;
        let _timer = time_histogram!(MUTATION_COMMIT_DURATION);
        let kind = mutation.kind();

        if let Err(e) = self.validate(&mutation) {
            debug!("[fg-group-admin] {} rejected: {}", kind, e);
            return Err(record_rejection(e));
        }

        let record = self
            .persist_with_retry(mutation)
            .await
            .map_err(record_rejection)?;

        let applied = self.registry.write().apply(&record);
        let deltas = match applied {
            Ok(ApplyOutcome::Applied(deltas)) => deltas,
            Ok(ApplyOutcome::Skipped) => {
                warn!(
                    "[fg-group-admin] record {} already applied",
                    record.sequence
                );
                Vec::new()
            }
            Err(e) => {
                error!(
                    "[fg-group-admin] record {} committed but not applied: {}",
                    record.sequence, e
                );
                return Err(e);
            }
        };

        MUTATIONS_COMMITTED.with_label_values(&[kind.as_str()]).inc();
        log_mutation_event!(
            info,
            "fg-group-admin",
            "[fg-group-admin] mutation committed",
            record.sequence.value(),
            kind,
            group = %record.mutation.target_group()
        );

        self.coordinator
            .notify_membership_changed(MembershipChanged {
                sequence: record.sequence,
                kind,
                target: record.mutation.target_group().clone(),
                deltas,
            });

        Ok(record.sequence)
    }

    fn validate(&self, mutation: &Mutation) -> Result<(), GroupError> {
        let (servers, tables) = if self.config.reject_moves_in_transition {
            (
                self.coordinator.servers_in_transition(),
                self.coordinator.tables_in_transition(),
            )
        } else {
            (HashMap::new(), HashMap::new())
        };

        let registry = self.registry.read();
        let ctx = ValidationContext {
            registry: &registry,
            servers_in_transition: &servers,
            tables_in_transition: &tables,
        };
        self.validator.validate(&ctx, mutation)
    }

    async fn persist_with_retry(&self, mutation: Mutation) -> Result<MutationRecord, GroupError> {
        let policy = &self.config.persistence_retry;
        let mut attempt = 1;

        loop {
            match self.log.commit(mutation.clone()).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                    PERSISTENCE_RETRIES.inc();
                    let delay = policy.backoff(attempt);
                    warn!(
                        attempt,
                        "[fg-group-admin] commit failed ({e}), retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    error!(
                        attempt,
                        "[fg-group-admin] commit failed permanently: {source}"
                    );
                    return Err(GroupError::Persistence {
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}

fn record_rejection(e: GroupError) -> GroupError {
    MUTATIONS_REJECTED
        .with_label_values(&[e.reason_label()])
        .inc();
    e
}
