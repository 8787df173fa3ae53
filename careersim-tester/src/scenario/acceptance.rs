//! Fixed end-to-end scenarios over in-memory storage and attempt store.
use anyhow::{Result, ensure};
use careersim_progress::{
    Actor, AttemptId, AttemptRef, AttemptStore, MemoryAttemptError, MemoryAttemptStore,
    MemoryStore, ProgressEvent, RemoteProgress, SyncPhase, SyncTrigger, TaskStatus, UserId,
};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::oneshot;

use super::{Scenario, ScenarioCtx, backend, ensure_linear_gating, open_tab};

fn five_tasks() -> AttemptRef {
    AttemptRef::new("sim-product-manager", "att-qa-0001", 5)
}

fn learner() -> Actor {
    Actor::User(UserId::new("qa-learner"))
}

pub fn scenarios() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(FreshAttempt),
        Box::new(FirstCompletion),
        Box::new(GuestOfflineReload),
        Box::new(FailedRemoteWrite),
        Box::new(CrossTabStorage),
        Box::new(TriggerBurst),
    ]
}

struct FreshAttempt;

#[async_trait::async_trait(?Send)]
impl Scenario for FreshAttempt {
    fn key(&self) -> &'static str {
        "fresh-attempt"
    }

    fn description(&self) -> &'static str {
        "A: a new attempt unlocks only the first task"
    }

    async fn run(&self, _ctx: &ScenarioCtx) -> Result<()> {
        let attempt = five_tasks();
        let tab = open_tab(
            &attempt,
            &MemoryStore::new(),
            Actor::Guest,
            backend(&attempt, &[], &Actor::Guest),
        );
        tab.sync(SyncTrigger::Mount).await;
        ensure!(tab.task_status(0) == TaskStatus::Available, "task 0 not available");
        for index in 1..5 {
            ensure!(
                tab.task_status(index) == TaskStatus::Locked,
                "task {index} should be locked"
            );
        }
        ensure!(!tab.is_all_tasks_completed(), "fresh attempt reported complete");
        Ok(())
    }
}

struct FirstCompletion;

#[async_trait::async_trait(?Send)]
impl Scenario for FirstCompletion {
    fn key(&self) -> &'static str {
        "first-completion"
    }

    fn description(&self) -> &'static str {
        "B: completing task 0 unlocks task 1 and nothing else"
    }

    async fn run(&self, _ctx: &ScenarioCtx) -> Result<()> {
        let attempt = five_tasks();
        let tab = open_tab(
            &attempt,
            &MemoryStore::new(),
            Actor::Guest,
            backend(&attempt, &[], &Actor::Guest),
        );
        tab.sync(SyncTrigger::Mount).await;
        tab.complete_task(0).await?;
        let expected = [
            TaskStatus::Completed,
            TaskStatus::Available,
            TaskStatus::Locked,
            TaskStatus::Locked,
            TaskStatus::Locked,
        ];
        ensure!(
            tab.task_statuses() == expected,
            "unexpected statuses {:?}",
            tab.task_statuses()
        );
        ensure!(
            tab.complete_task(3).await.is_err(),
            "locked task 3 accepted a completion"
        );
        Ok(())
    }
}

struct GuestOfflineReload;

#[async_trait::async_trait(?Send)]
impl Scenario for GuestOfflineReload {
    fn key(&self) -> &'static str {
        "guest-offline-reload"
    }

    fn description(&self) -> &'static str {
        "C: guest progress survives a reload with the network down"
    }

    async fn run(&self, _ctx: &ScenarioCtx) -> Result<()> {
        let attempt = five_tasks();
        let storage = MemoryStore::new();
        let remote = backend(&attempt, &[], &Actor::Guest);
        remote.set_offline(true);

        {
            let tab = open_tab(&attempt, &storage, Actor::Guest, remote.clone());
            tab.sync(SyncTrigger::Mount).await;
            tab.complete_task(0).await?;
            let report = tab.complete_task(1).await?;
            ensure!(report.remote_failed(), "offline write reported success");
        }

        let reloaded = open_tab(&attempt, &storage, Actor::Guest, remote);
        reloaded.sync(SyncTrigger::Mount).await;
        ensure!(
            reloaded.completed().as_slice() == [0, 1],
            "reload restored {:?}",
            reloaded.completed().as_slice()
        );
        ensure!(!reloaded.is_all_tasks_completed(), "attempt wrongly complete");
        ensure!(
            reloaded.task_status(2) == TaskStatus::Available,
            "task 2 should be available after reload"
        );
        Ok(())
    }
}

struct FailedRemoteWrite;

#[async_trait::async_trait(?Send)]
impl Scenario for FailedRemoteWrite {
    fn key(&self) -> &'static str {
        "failed-remote-write"
    }

    fn description(&self) -> &'static str {
        "D: an authenticated completion outlives a failed store write and is re-propagated"
    }

    async fn run(&self, _ctx: &ScenarioCtx) -> Result<()> {
        let attempt = five_tasks();
        let remote = backend(&attempt, &[0, 1], &learner());
        let tab = open_tab(&attempt, &MemoryStore::new(), learner(), remote.clone());
        tab.sync(SyncTrigger::Mount).await;
        ensure!(tab.completed().as_slice() == [0, 1], "remote progress not adopted");

        remote.set_fail_writes(true);
        let report = tab.complete_task(2).await?;
        ensure!(report.remote_failed(), "write should have failed");
        tab.sync(SyncTrigger::FocusRegained).await;
        ensure!(
            tab.completed().as_slice() == [0, 1, 2],
            "completion lost: {:?}",
            tab.completed().as_slice()
        );
        ensure!(tab.task_status(3) == TaskStatus::Available, "task 3 still locked");

        remote.set_fail_writes(false);
        tab.sync(SyncTrigger::Periodic).await;
        ensure!(
            remote.completed(&attempt.attempt_id).as_slice() == [0, 1, 2],
            "store never received task 2"
        );
        Ok(())
    }
}

struct CrossTabStorage;

#[async_trait::async_trait(?Send)]
impl Scenario for CrossTabStorage {
    fn key(&self) -> &'static str {
        "cross-tab-storage"
    }

    fn description(&self) -> &'static str {
        "E: a completion in one tab reaches another through the storage notification"
    }

    async fn run(&self, _ctx: &ScenarioCtx) -> Result<()> {
        let attempt = five_tasks();
        let storage = MemoryStore::new();
        let remote = backend(&attempt, &[0, 1], &learner());
        let tab_a = open_tab(&attempt, &storage, learner(), remote.clone());
        let tab_b = open_tab(&attempt, &storage, learner(), remote);
        tab_a.sync(SyncTrigger::Mount).await;
        tab_b.sync(SyncTrigger::Mount).await;

        let rerenders = Rc::new(RefCell::new(0_u32));
        let sink = Rc::clone(&rerenders);
        tab_b.subscribe(move |event| {
            if matches!(event, ProgressEvent::Reconciled { changed: true, .. }) {
                *sink.borrow_mut() += 1;
            }
        });

        tab_a.complete_task(2).await?;
        let key = tab_a.storage_key();
        ensure!(
            tab_b
                .on_storage_event(Some(&key), storage.raw(&key).as_deref())
                .await,
            "storage notification ignored"
        );
        ensure!(
            tab_b.task_status(3) == TaskStatus::Available,
            "other tab did not unlock task 3"
        );
        ensure!(*rerenders.borrow() == 1, "expected one re-render");
        ensure_linear_gating(&tab_b)
    }
}

/// Store whose first read parks until the gate opens.
struct GatedStore {
    inner: MemoryAttemptStore,
    gate: RefCell<Option<oneshot::Receiver<()>>>,
}

#[async_trait::async_trait(?Send)]
impl AttemptStore for GatedStore {
    type Error = MemoryAttemptError;

    async fn read_progress(&self, attempt_id: &AttemptId) -> Result<RemoteProgress, Self::Error> {
        let gate = self.gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.read_progress(attempt_id).await
    }

    async fn write_completion(
        &self,
        attempt_id: &AttemptId,
        task_index: u32,
    ) -> Result<(), Self::Error> {
        self.inner.write_completion(attempt_id, task_index).await
    }
}

struct TriggerBurst;

#[async_trait::async_trait(?Send)]
impl Scenario for TriggerBurst {
    fn key(&self) -> &'static str {
        "trigger-burst"
    }

    fn description(&self) -> &'static str {
        "A burst of triggers during an in-flight pass collapses into one re-run"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let attempt = five_tasks();
        let (open, gate) = oneshot::channel();
        let inner = backend(&attempt, &[0], &learner());
        let store = GatedStore {
            inner: inner.clone(),
            gate: RefCell::new(Some(gate)),
        };
        let tab = open_tab(&attempt, &MemoryStore::new(), learner(), store);

        let burst = async {
            let mut started = 0_u32;
            for trigger in [
                SyncTrigger::FocusRegained,
                SyncTrigger::StorageChanged,
                SyncTrigger::Periodic,
                SyncTrigger::FocusRegained,
            ] {
                if tab.sync(trigger).await {
                    started += 1;
                }
            }
            let _ = open.send(());
            started
        };
        let (mounted, started) = tokio::join!(tab.sync(SyncTrigger::Mount), burst);

        if ctx.verbose {
            println!(
                "   burst: {} passes, {} store reads",
                tab.sync_runs(),
                inner.read_count()
            );
        }
        ensure!(mounted, "mount pass did not run");
        ensure!(started == 0, "{started} burst triggers started their own pass");
        ensure!(tab.sync_runs() == 2, "expected 2 passes, saw {}", tab.sync_runs());
        ensure!(tab.phase() == SyncPhase::Settled, "machine not settled");
        Ok(())
    }
}
