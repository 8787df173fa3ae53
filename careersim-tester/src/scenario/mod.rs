use anyhow::Result;
use careersim_progress::{
    Actor, Attempt, AttemptRef, AttemptStore, FixedClock, LocalProgressCache, MemoryAttemptStore,
    MemoryStore, ProgressConfig, ProgressTracker, TaskStatus,
};
use std::rc::Rc;

pub mod acceptance;
pub mod sweeps;

#[derive(Debug, Clone, Copy)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub verbose: bool,
}

/// A self-contained check against the progress engine.
#[async_trait::async_trait(?Send)]
pub trait Scenario {
    fn key(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Whether repeated iterations exercise different inputs.
    fn seeded(&self) -> bool {
        false
    }
    async fn run(&self, ctx: &ScenarioCtx) -> Result<()>;
}

pub type Tab<R = MemoryAttemptStore> = ProgressTracker<LocalProgressCache<MemoryStore>, R>;

/// One simulated browser tab over shared storage and a shared attempt store.
pub fn open_tab<R: AttemptStore>(
    attempt: &AttemptRef,
    storage: &MemoryStore,
    actor: Actor,
    remote: R,
) -> Tab<R> {
    let cache = LocalProgressCache::new(storage.clone(), ProgressConfig::default());
    ProgressTracker::new(attempt.clone(), actor, cache, remote).with_clock(Rc::new(FixedClock(0)))
}

pub fn backend(attempt: &AttemptRef, completed: &[u32], actor: &Actor) -> MemoryAttemptStore {
    MemoryAttemptStore::with_attempt(Attempt::new(
        attempt,
        completed.iter().copied(),
        actor.user_id().cloned(),
    ))
}

/// Every `available` task directly follows a completed one.
pub fn ensure_linear_gating<R: AttemptStore>(tab: &Tab<R>) -> Result<()> {
    let statuses = tab.task_statuses();
    for (idx, status) in statuses.iter().enumerate().skip(1) {
        if *status == TaskStatus::Available {
            anyhow::ensure!(
                statuses[idx - 1] == TaskStatus::Completed,
                "task {idx} available while task {} is {:?}",
                idx - 1,
                statuses[idx - 1]
            );
        }
    }
    if let Some(first) = statuses.first() {
        anyhow::ensure!(*first != TaskStatus::Locked, "first task locked");
    }
    Ok(())
}

fn catalog() -> Vec<Box<dyn Scenario>> {
    let mut all = acceptance::scenarios();
    all.extend(sweeps::scenarios());
    all
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    catalog()
        .iter()
        .map(|scenario| (scenario.key(), scenario.description()))
        .collect()
}

pub fn get_scenario(key: &str) -> Option<Box<dyn Scenario>> {
    catalog()
        .into_iter()
        .find(|scenario| scenario.key().eq_ignore_ascii_case(key))
}

pub fn all_keys() -> Vec<String> {
    catalog()
        .iter()
        .map(|scenario| scenario.key().to_string())
        .collect()
}
