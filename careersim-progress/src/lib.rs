//! CareerSim progress engine
//!
//! Platform-agnostic simulation progress tracking: linear task gating,
//! reconciliation of a client-local snapshot with the authoritative attempt
//! store, and the single completion path. Browser bindings live in
//! `careersim-web`; this crate has no UI or platform dependencies.

pub mod attempt;
pub mod attempt_store;
pub mod cache;
pub mod completed;
pub mod config;
pub mod gating;
pub mod reconcile;
pub mod snapshot;
pub mod sync;
pub mod tracker;
pub mod writer;

// Re-export commonly used types
pub use attempt::{Actor, Attempt, AttemptId, AttemptRef, RemoteProgress, SimulationId, UserId};
pub use attempt_store::{MemoryAttemptError, MemoryAttemptStore};
pub use cache::{LocalProgressCache, MemoryStore, ProgressCache, StoreUnavailable, UnavailableStore};
pub use completed::CompletedSet;
pub use config::ProgressConfig;
pub use gating::{
    TaskStatus, is_all_completed, next_available, progress_percent, task_status, task_statuses,
};
pub use reconcile::{MergePolicy, ReconcileSource, Reconciliation, needs_remote, reconcile};
pub use snapshot::{ProgressSnapshot, SNAPSHOT_VERSION};
pub use sync::{SyncDecision, SyncMachine, SyncPhase, SyncTrigger};
pub use tracker::{ProgressEvent, ProgressTracker, SubscriptionId};
pub use writer::{CompletionOutcome, CompletionReport, ProgressError, RemoteWrite, apply_completion};

/// Trait for abstracting raw client-local storage.
/// Platform-specific implementations should provide this
pub trait KeyValueStore {
    type Error: std::error::Error + 'static;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend is unavailable.
    fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend is unavailable or full.
    fn set_item(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend is unavailable.
    fn remove_item(&self, key: &str) -> Result<(), Self::Error>;
}

/// Trait for abstracting the authoritative attempt store.
///
/// Futures are not required to be `Send`: the engine runs on a single
/// cooperative UI thread.
#[async_trait::async_trait(?Send)]
pub trait AttemptStore {
    type Error: std::error::Error + 'static;

    /// Read the completed indices and task count of an attempt.
    ///
    /// # Errors
    ///
    /// Returns an error on network, auth, or lookup failure.
    async fn read_progress(&self, attempt_id: &AttemptId) -> Result<RemoteProgress, Self::Error>;

    /// Persist a task completion. Completing an already completed task is a
    /// no-op on the store side.
    ///
    /// # Errors
    ///
    /// Returns an error on network, auth, or lookup failure.
    async fn write_completion(&self, attempt_id: &AttemptId, task_index: u32)
    -> Result<(), Self::Error>;
}

/// Wall-clock source for snapshot timestamps.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] over `std::time::SystemTime`. Not usable on `wasm32-unknown-unknown`;
/// the browser crate supplies its own clock there.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// Fixed [`Clock`] for deterministic tests and harnesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}
