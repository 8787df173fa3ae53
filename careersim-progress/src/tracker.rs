//! Progress tracker: the one object views talk to.
//!
//! Owns the in-memory canonical completed set for a viewed attempt and
//! sequences the cache, the attempt store and the sync state machine around
//! it. All methods take `&self`; state lives in `Cell`/`RefCell` and no borrow
//! is held across an `.await`, so a tracker shared through `Rc` can serve
//! concurrently spawned local futures (trigger handlers, completion clicks).
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::attempt::{Actor, AttemptRef};
use crate::cache::ProgressCache;
use crate::completed::CompletedSet;
use crate::config::ProgressConfig;
use crate::gating::{TaskStatus, is_all_completed, next_available, task_status, task_statuses};
use crate::reconcile::{needs_remote, reconcile};
use crate::snapshot::ProgressSnapshot;
use crate::sync::{SyncDecision, SyncMachine, SyncPhase, SyncTrigger};
use crate::writer::{
    CompletionOutcome, CompletionReport, ProgressError, RemoteWrite, apply_completion,
};
use crate::{AttemptStore, Clock, SystemClock};

/// "Progress changed" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A reconciliation pass finished. `changed` is false when the canonical
    /// set came out identical.
    Reconciled { trigger: SyncTrigger, changed: bool },
    TaskCompleted { index: u32 },
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&ProgressEvent)>;

pub struct ProgressTracker<C, R> {
    attempt: AttemptRef,
    actor: RefCell<Actor>,
    cache: C,
    remote: R,
    config: ProgressConfig,
    clock: Rc<dyn Clock>,
    completed: RefCell<CompletedSet>,
    machine: RefCell<SyncMachine>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_subscription: Cell<u64>,
    /// Bumped on reset so in-flight passes drop their results.
    generation: Cell<u64>,
}

impl<C, R> ProgressTracker<C, R>
where
    C: ProgressCache,
    R: AttemptStore,
{
    pub fn new(attempt: AttemptRef, actor: Actor, cache: C, remote: R) -> Self {
        Self {
            attempt,
            actor: RefCell::new(actor),
            cache,
            remote,
            config: ProgressConfig::default(),
            clock: Rc::new(SystemClock),
            completed: RefCell::new(CompletedSet::new()),
            machine: RefCell::new(SyncMachine::new()),
            listeners: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
            generation: Cell::new(0),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ProgressConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn attempt(&self) -> &AttemptRef {
        &self.attempt
    }

    pub const fn cache(&self) -> &C {
        &self.cache
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn config(&self) -> &ProgressConfig {
        &self.config
    }

    pub fn actor(&self) -> Actor {
        self.actor.borrow().clone()
    }

    /// Identity signal changed. Takes effect at the next pass.
    pub fn set_actor(&self, actor: Actor) {
        log::info!(
            "attempt {}: actor now {}",
            self.attempt.attempt_id,
            if actor.is_authenticated() { "authenticated" } else { "guest" }
        );
        self.actor.replace(actor);
    }

    pub fn phase(&self) -> SyncPhase {
        self.machine.borrow().phase()
    }

    /// Completed reconciliation passes.
    pub fn sync_runs(&self) -> u64 {
        self.machine.borrow().runs()
    }

    /// Snapshot of the canonical completed set.
    pub fn completed(&self) -> CompletedSet {
        self.completed.borrow().clone()
    }

    pub fn task_status(&self, index: u32) -> TaskStatus {
        task_status(index, &self.completed.borrow())
    }

    pub fn task_statuses(&self) -> Vec<TaskStatus> {
        task_statuses(self.attempt.total_task_count, &self.completed.borrow())
    }

    pub fn is_all_tasks_completed(&self) -> bool {
        is_all_completed(self.attempt.total_task_count, &self.completed.borrow())
    }

    pub fn next_available(&self) -> Option<u32> {
        next_available(self.attempt.total_task_count, &self.completed.borrow())
    }

    pub fn subscribe(&self, listener: impl Fn(&ProgressEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(existing, _)| *existing != id);
    }

    /// Storage key this tracker's snapshot lives under.
    pub fn storage_key(&self) -> String {
        self.cache.storage_key(&self.attempt.simulation_id)
    }

    /// Whether a cross-tab storage notification concerns this attempt.
    /// `None` means the whole storage area was cleared.
    pub fn is_relevant_storage_key(&self, key: Option<&str>) -> bool {
        key.is_none_or(|key| key == self.storage_key())
    }

    /// Handle a cross-tab storage notification. Returns whether a pass ran.
    ///
    /// `new_value` is the entry's value after the change. A removed entry or
    /// a cleared storage area is another tab's reset notification: local
    /// progress is dropped before the pass so it cannot be written back.
    pub async fn on_storage_event(&self, key: Option<&str>, new_value: Option<&str>) -> bool {
        if !self.is_relevant_storage_key(key) {
            return false;
        }
        if key.is_none() || new_value.is_none() {
            log::info!(
                "attempt {}: local progress removed by another tab",
                self.attempt.attempt_id
            );
            self.reset();
        }
        self.sync(SyncTrigger::StorageChanged).await
    }

    /// The attempt was reset by an external flow: forget everything local.
    pub fn reset(&self) {
        log::info!("attempt {} reset; clearing local progress", self.attempt.attempt_id);
        self.generation.set(self.generation.get() + 1);
        self.cache.clear(&self.attempt.simulation_id);
        self.completed.replace(CompletedSet::new());
        self.notify(ProgressEvent::Reset);
    }

    /// Run a reconciliation pass for `trigger`.
    ///
    /// Passes never overlap: while one is in flight, further triggers collapse
    /// into a single trailing re-run executed by the caller that owns the
    /// running pass. Returns `true` when this call ran at least one pass.
    pub async fn sync(&self, trigger: SyncTrigger) -> bool {
        let decision = self.machine.borrow_mut().begin(trigger);
        let SyncDecision::Start(mut current) = decision else {
            log::debug!(
                "attempt {}: {} trigger deferred behind in-flight pass",
                self.attempt.attempt_id,
                trigger.label()
            );
            return false;
        };
        loop {
            self.reconcile_pass(current).await;
            let next = self.machine.borrow_mut().finish();
            match next {
                Some(rerun) => current = rerun,
                None => break,
            }
        }
        true
    }

    /// Mark task `index` complete.
    ///
    /// The in-memory set and local cache are updated (and listeners notified)
    /// before the remote write is awaited. A failed remote write is reported
    /// in the returned [`CompletionReport`] and never rolls the completion back.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError`] when `index` is outside the attempt or not
    /// currently available.
    pub async fn complete_task(&self, index: u32) -> Result<CompletionReport, ProgressError> {
        let applied = apply_completion(&self.attempt, &mut self.completed.borrow_mut(), index);
        let outcome = match applied {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("attempt {}: rejected completion: {err}", self.attempt.attempt_id);
                return Err(err);
            }
        };
        if outcome == CompletionOutcome::AlreadyCompleted {
            log::debug!(
                "attempt {}: task {index} already completed",
                self.attempt.attempt_id
            );
            return Ok(CompletionReport {
                index,
                outcome,
                remote: RemoteWrite::Skipped,
            });
        }

        self.persist_local();
        self.notify(ProgressEvent::TaskCompleted { index });

        let remote = match self
            .remote
            .write_completion(&self.attempt.attempt_id, index)
            .await
        {
            Ok(()) => RemoteWrite::Persisted,
            Err(err) => {
                log::warn!(
                    "attempt {}: remote write for task {index} failed, keeping local completion: {err}",
                    self.attempt.attempt_id
                );
                RemoteWrite::Failed(err.to_string())
            }
        };

        self.sync(SyncTrigger::Completion).await;

        Ok(CompletionReport {
            index,
            outcome,
            remote,
        })
    }

    async fn reconcile_pass(&self, trigger: SyncTrigger) {
        let generation = self.generation.get();
        let actor = self.actor();
        let sim = &self.attempt.simulation_id;

        let remote = if needs_remote(&actor, &self.attempt, self.cache.read(sim).as_ref()) {
            self.fetch_remote().await
        } else {
            None
        };
        if generation != self.generation.get() {
            log::debug!(
                "attempt {}: reset during {} pass; discarding result",
                self.attempt.attempt_id,
                trigger.label()
            );
            return;
        }

        // Re-read after the await: a completion may have landed meanwhile.
        let local = self.cache.read(sim);
        let merged = reconcile(&self.attempt, local.as_ref(), remote.as_ref(), &actor);
        if merged.discarded_stale {
            log::info!(
                "attempt {}: discarded local snapshot of another attempt",
                self.attempt.attempt_id
            );
        }

        let previous = self.completed();
        let canonical = merged.completed.union(&previous);
        let changed = canonical != previous;
        self.completed.replace(canonical.clone());
        self.persist_local();

        log::debug!(
            "attempt {}: {} pass via {:?} -> {:?}",
            self.attempt.attempt_id,
            trigger.label(),
            merged.source,
            canonical.as_slice()
        );

        if actor.is_authenticated()
            && self.config.repropagate_local_completions
            && let Some(remote) = remote.as_ref()
        {
            self.repropagate(&canonical.difference(remote)).await;
        }

        self.notify(ProgressEvent::Reconciled { trigger, changed });
    }

    async fn fetch_remote(&self) -> Option<CompletedSet> {
        match self.remote.read_progress(&self.attempt.attempt_id).await {
            Ok(progress) => {
                if progress.total_task_count != self.attempt.total_task_count {
                    log::debug!(
                        "attempt {}: store reports {} tasks, view has {}",
                        self.attempt.attempt_id,
                        progress.total_task_count,
                        self.attempt.total_task_count
                    );
                }
                Some(CompletedSet::from_indices(progress.completed_task_indices))
            }
            Err(err) => {
                log::warn!(
                    "attempt {}: remote progress unavailable: {err}",
                    self.attempt.attempt_id
                );
                None
            }
        }
    }

    async fn repropagate(&self, missing: &CompletedSet) {
        for index in missing.iter() {
            if let Err(err) = self
                .remote
                .write_completion(&self.attempt.attempt_id, index)
                .await
            {
                log::warn!(
                    "attempt {}: re-propagating task {index} failed: {err}",
                    self.attempt.attempt_id
                );
                return;
            }
            log::info!(
                "attempt {}: re-propagated task {index} to attempt store",
                self.attempt.attempt_id
            );
        }
    }

    /// Write the canonical set, folded into whatever another tab may have
    /// stored for the same attempt since this tab last read it.
    fn persist_local(&self) {
        let mut completed = self.completed();
        if let Some(existing) = self.cache.read(&self.attempt.simulation_id)
            && existing.belongs_to(&self.attempt)
        {
            completed = completed.union(&existing.completed);
        }
        let snapshot = ProgressSnapshot::capture(&self.attempt, &completed, self.clock.now_ms());
        self.cache.write(&snapshot);
    }

    fn notify(&self, event: ProgressEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::{Attempt, UserId};
    use crate::attempt_store::MemoryAttemptStore;
    use crate::cache::{LocalProgressCache, MemoryStore, UnavailableStore};
    use crate::FixedClock;
    use futures::executor::block_on;

    type MemTracker = ProgressTracker<LocalProgressCache<MemoryStore>, MemoryAttemptStore>;

    fn attempt() -> AttemptRef {
        AttemptRef::new("sim-pm", "att-1", 5)
    }

    fn tracker(actor: Actor, remote_completed: &[u32]) -> MemTracker {
        let remote = MemoryAttemptStore::with_attempt(Attempt::new(
            &attempt(),
            remote_completed.iter().copied(),
            actor.user_id().cloned(),
        ));
        let cache = LocalProgressCache::new(MemoryStore::new(), ProgressConfig::default());
        ProgressTracker::new(attempt(), actor, cache, remote).with_clock(Rc::new(FixedClock(5)))
    }

    fn user() -> Actor {
        Actor::User(UserId::new("u-1"))
    }

    #[test]
    fn mount_pass_settles_and_notifies() {
        let tracker = tracker(user(), &[0, 1]);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        tracker.subscribe(move |event| sink.borrow_mut().push(*event));

        assert_eq!(tracker.phase(), SyncPhase::Uninitialized);
        assert!(block_on(tracker.sync(SyncTrigger::Mount)));
        assert_eq!(tracker.phase(), SyncPhase::Settled);
        assert_eq!(tracker.completed().as_slice(), &[0, 1]);
        assert_eq!(
            events.borrow().as_slice(),
            &[ProgressEvent::Reconciled {
                trigger: SyncTrigger::Mount,
                changed: true
            }]
        );
        let snap = tracker.cache().read(&attempt().simulation_id).expect("self-heal write");
        assert_eq!(snap.completed.as_slice(), &[0, 1]);
        assert_eq!(snap.captured_at_ms, 5);
    }

    #[test]
    fn completion_updates_memory_before_remote_and_writes_remote() {
        let tracker = tracker(user(), &[]);
        block_on(tracker.sync(SyncTrigger::Mount));
        let report = block_on(tracker.complete_task(0)).unwrap();
        assert_eq!(report.outcome, CompletionOutcome::Recorded);
        assert_eq!(report.remote, RemoteWrite::Persisted);
        assert_eq!(tracker.task_status(1), TaskStatus::Available);
        assert_eq!(
            tracker.remote().completed(&attempt().attempt_id).as_slice(),
            &[0]
        );
    }

    #[test]
    fn duplicate_completion_skips_remote() {
        let tracker = tracker(user(), &[]);
        block_on(tracker.sync(SyncTrigger::Mount));
        block_on(tracker.complete_task(0)).unwrap();
        let writes = tracker.remote().write_count();
        let again = block_on(tracker.complete_task(0)).unwrap();
        assert_eq!(again.outcome, CompletionOutcome::AlreadyCompleted);
        assert_eq!(again.remote, RemoteWrite::Skipped);
        assert_eq!(tracker.remote().write_count(), writes);
    }

    #[test]
    fn locked_and_out_of_range_bubble_up() {
        let tracker = tracker(Actor::Guest, &[]);
        block_on(tracker.sync(SyncTrigger::Mount));
        assert_eq!(
            block_on(tracker.complete_task(2)),
            Err(ProgressError::TaskLocked { index: 2 })
        );
        assert_eq!(
            block_on(tracker.complete_task(5)),
            Err(ProgressError::InvalidIndex { index: 5, total: 5 })
        );
        assert!(tracker.completed().is_empty());
    }

    #[test]
    fn failed_remote_write_is_repropagated_on_next_pass() {
        let tracker = tracker(user(), &[0, 1]);
        block_on(tracker.sync(SyncTrigger::Mount));
        tracker.remote().set_fail_writes(true);
        let report = block_on(tracker.complete_task(2)).unwrap();
        assert!(report.remote_failed());
        assert_eq!(tracker.completed().as_slice(), &[0, 1, 2]);

        tracker.remote().set_fail_writes(false);
        block_on(tracker.sync(SyncTrigger::FocusRegained));
        assert_eq!(
            tracker.remote().completed(&attempt().attempt_id).as_slice(),
            &[0, 1, 2]
        );
    }

    #[test]
    fn repropagation_can_be_disabled() {
        let config = ProgressConfig {
            repropagate_local_completions: false,
            ..ProgressConfig::default()
        };
        let tracker = tracker(user(), &[0]).with_config(config);
        block_on(tracker.sync(SyncTrigger::Mount));
        tracker.remote().set_fail_writes(true);
        block_on(tracker.complete_task(1)).unwrap();
        tracker.remote().set_fail_writes(false);
        block_on(tracker.sync(SyncTrigger::FocusRegained));
        assert_eq!(tracker.remote().completed(&attempt().attempt_id).as_slice(), &[0]);
        assert_eq!(tracker.completed().as_slice(), &[0, 1]);
    }

    #[test]
    fn guest_with_snapshot_skips_remote_read() {
        let tracker = tracker(Actor::Guest, &[0, 1, 2]);
        let snap = ProgressSnapshot::capture(&attempt(), &CompletedSet::from_indices([0]), 1);
        tracker.cache().write(&snap);
        block_on(tracker.sync(SyncTrigger::Mount));
        assert_eq!(tracker.completed().as_slice(), &[0]);
        assert_eq!(tracker.remote().read_count(), 0);
    }

    #[test]
    fn unavailable_cache_still_tracks_in_memory() {
        let remote = MemoryAttemptStore::with_attempt(Attempt::new(&attempt(), [], None));
        remote.set_offline(true);
        let cache = LocalProgressCache::new(UnavailableStore, ProgressConfig::default());
        let tracker = ProgressTracker::new(attempt(), Actor::Guest, cache, remote);
        block_on(tracker.sync(SyncTrigger::Mount));
        block_on(tracker.complete_task(0)).unwrap();
        block_on(tracker.complete_task(1)).unwrap();
        block_on(tracker.sync(SyncTrigger::FocusRegained));
        assert_eq!(tracker.completed().as_slice(), &[0, 1]);
        assert_eq!(tracker.task_status(2), TaskStatus::Available);
    }

    #[test]
    fn reset_clears_cache_and_memory() {
        let tracker = tracker(Actor::Guest, &[]);
        block_on(tracker.sync(SyncTrigger::Mount));
        block_on(tracker.complete_task(0)).unwrap();
        let events = Rc::new(Cell::new(0_u32));
        let sink = Rc::clone(&events);
        tracker.subscribe(move |event| {
            if *event == ProgressEvent::Reset {
                sink.set(sink.get() + 1);
            }
        });
        tracker.reset();
        assert!(tracker.completed().is_empty());
        assert_eq!(tracker.cache().read(&attempt().simulation_id), None);
        assert_eq!(events.get(), 1);
    }

    #[test]
    fn storage_events_filter_on_key() {
        let tracker = tracker(Actor::Guest, &[]);
        assert!(tracker.is_relevant_storage_key(Some("careersim.progress.sim-pm")));
        assert!(tracker.is_relevant_storage_key(None));
        assert!(!tracker.is_relevant_storage_key(Some("careersim.progress.other")));
        assert!(!block_on(tracker.on_storage_event(Some("unrelated"), None)));
        assert!(block_on(tracker.on_storage_event(None, None)));
    }

    #[test]
    fn removed_entry_notice_drops_local_progress() {
        let tracker = tracker(user(), &[]);
        block_on(tracker.sync(SyncTrigger::Mount));
        block_on(tracker.complete_task(0)).unwrap();
        let key = tracker.storage_key();

        let written = tracker.cache().store().raw(&key);
        assert!(written.is_some());
        assert!(block_on(tracker.on_storage_event(Some(&key), written.as_deref())));
        assert_eq!(tracker.completed().as_slice(), &[0]);

        tracker.remote().insert(Attempt::new(&attempt(), [], user().user_id().cloned()));
        assert!(block_on(tracker.on_storage_event(Some(&key), None)));
        assert!(tracker.completed().is_empty());
        assert_eq!(tracker.remote().completed(&attempt().attempt_id).as_slice(), &[] as &[u32]);
    }

    #[test]
    fn unsubscribed_listeners_are_silent() {
        let tracker = tracker(Actor::Guest, &[]);
        let hits = Rc::new(Cell::new(0_u32));
        let sink = Rc::clone(&hits);
        let id = tracker.subscribe(move |_| sink.set(sink.get() + 1));
        block_on(tracker.sync(SyncTrigger::Mount));
        tracker.unsubscribe(id);
        block_on(tracker.sync(SyncTrigger::Periodic));
        assert_eq!(hits.get(), 1);
    }
}
