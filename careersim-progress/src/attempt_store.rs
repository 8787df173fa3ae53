//! In-memory attempt store with switchable failure modes.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::AttemptStore;
use crate::attempt::{Attempt, AttemptId, RemoteProgress};
use crate::completed::CompletedSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryAttemptError {
    #[error("attempt store unreachable")]
    Offline,
    #[error("unknown attempt {0}")]
    UnknownAttempt(AttemptId),
}

#[derive(Debug, Default)]
struct MemoryAttemptState {
    attempts: HashMap<AttemptId, Attempt>,
    fail_reads: bool,
    fail_writes: bool,
    reads: u32,
    writes: u32,
}

/// Shared in-memory [`AttemptStore`]. Clones observe the same attempts,
/// standing in for one backend seen from several tabs or devices.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttemptStore {
    state: Rc<RefCell<MemoryAttemptState>>,
}

impl MemoryAttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a single attempt.
    #[must_use]
    pub fn with_attempt(attempt: Attempt) -> Self {
        let store = Self::new();
        store.insert(attempt);
        store
    }

    pub fn insert(&self, attempt: Attempt) {
        self.state
            .borrow_mut()
            .attempts
            .insert(attempt.attempt_id.clone(), attempt);
    }

    #[must_use]
    pub fn attempt(&self, attempt_id: &AttemptId) -> Option<Attempt> {
        self.state.borrow().attempts.get(attempt_id).cloned()
    }

    /// Completed indices the store currently holds for `attempt_id`.
    #[must_use]
    pub fn completed(&self, attempt_id: &AttemptId) -> CompletedSet {
        self.attempt(attempt_id)
            .map(|attempt| attempt.completed())
            .unwrap_or_default()
    }

    /// Make both reads and writes fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        let mut state = self.state.borrow_mut();
        state.fail_reads = offline;
        state.fail_writes = offline;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    /// Read calls received, including failed ones.
    #[must_use]
    pub fn read_count(&self) -> u32 {
        self.state.borrow().reads
    }

    /// Write calls received, including failed ones.
    #[must_use]
    pub fn write_count(&self) -> u32 {
        self.state.borrow().writes
    }
}

#[async_trait::async_trait(?Send)]
impl AttemptStore for MemoryAttemptStore {
    type Error = MemoryAttemptError;

    async fn read_progress(&self, attempt_id: &AttemptId) -> Result<RemoteProgress, Self::Error> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;
        if state.fail_reads {
            return Err(MemoryAttemptError::Offline);
        }
        state
            .attempts
            .get(attempt_id)
            .map(RemoteProgress::from)
            .ok_or_else(|| MemoryAttemptError::UnknownAttempt(attempt_id.clone()))
    }

    async fn write_completion(
        &self,
        attempt_id: &AttemptId,
        task_index: u32,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.writes += 1;
        if state.fail_writes {
            return Err(MemoryAttemptError::Offline);
        }
        let attempt = state
            .attempts
            .get_mut(attempt_id)
            .ok_or_else(|| MemoryAttemptError::UnknownAttempt(attempt_id.clone()))?;
        if task_index < attempt.total_task_count
            && let Err(pos) = attempt.completed_task_indices.binary_search(&task_index)
        {
            attempt.completed_task_indices.insert(pos, task_index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::AttemptRef;
    use futures::executor::block_on;

    fn store() -> (MemoryAttemptStore, AttemptId) {
        let attempt = Attempt::new(&AttemptRef::new("sim", "att", 4), [0], None);
        let id = attempt.attempt_id.clone();
        (MemoryAttemptStore::with_attempt(attempt), id)
    }

    #[test]
    fn writes_are_idempotent_and_sorted() {
        let (store, id) = store();
        block_on(store.write_completion(&id, 2)).unwrap();
        block_on(store.write_completion(&id, 1)).unwrap();
        block_on(store.write_completion(&id, 2)).unwrap();
        let progress = block_on(store.read_progress(&id)).unwrap();
        assert_eq!(progress.completed_task_indices, vec![0, 1, 2]);
        assert_eq!(progress.total_task_count, 4);
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn offline_store_fails_every_call() {
        let (store, id) = store();
        store.set_offline(true);
        assert_eq!(
            block_on(store.read_progress(&id)),
            Err(MemoryAttemptError::Offline)
        );
        assert_eq!(
            block_on(store.write_completion(&id, 1)),
            Err(MemoryAttemptError::Offline)
        );
        assert_eq!(store.completed(&id).as_slice(), &[0]);
    }

    #[test]
    fn unknown_attempt_is_reported() {
        let (store, _) = store();
        let missing = AttemptId::new("nope");
        assert!(matches!(
            block_on(store.read_progress(&missing)),
            Err(MemoryAttemptError::UnknownAttempt(_))
        ));
    }
}
