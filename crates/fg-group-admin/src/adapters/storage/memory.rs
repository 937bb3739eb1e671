use crate::domain::{Mutation, MutationRecord, PersistenceError, SequenceNumber};
use crate::ports::outbound::MutationLog;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use super::now_millis;

/// In-memory mutation log for tests and single-process deployments.
///
/// Not durable. Supports fault injection so retry and timeout paths can be
/// exercised.
pub struct InMemoryMutationLog {
    records: Mutex<Vec<MutationRecord>>,
    available: AtomicBool,
    fail_next: AtomicU32,
    commit_delay: Mutex<Option<Duration>>,
}

impl Default for InMemoryMutationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMutationLog {
    /// An empty, available log.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            fail_next: AtomicU32::new(0),
            commit_delay: Mutex::new(None),
        }
    }

    /// Fail the next `n` commits with `PersistenceError::Unavailable`.
    pub fn fail_next_commits(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// While unavailable, every operation fails with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Sleep this long inside every commit, before writing.
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        *self.commit_delay.lock() = delay;
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// No records committed.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PersistenceError::Unavailable("store offline".to_string()))
        }
    }
}

#[async_trait]
impl MutationLog for InMemoryMutationLog {
    async fn commit(&self, mutation: Mutation) -> Result<MutationRecord, PersistenceError> {
        let delay = *self.commit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check_available()?;
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(PersistenceError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }

        let mut records = self.records.lock();
        let sequence = records
            .last()
            .map(|r| r.sequence)
            .unwrap_or(SequenceNumber::ZERO)
            .next();
        let record = MutationRecord {
            sequence,
            mutation,
            committed_at_ms: now_millis(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn load_all(&self) -> Result<Vec<MutationRecord>, PersistenceError> {
        self.check_available()?;
        Ok(self.records.lock().clone())
    }

    async fn last_sequence(&self) -> Result<SequenceNumber, PersistenceError> {
        self.check_available()?;
        Ok(self
            .records
            .lock()
            .last()
            .map(|r| r.sequence)
            .unwrap_or(SequenceNumber::ZERO))
    }
}
