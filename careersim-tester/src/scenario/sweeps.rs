//! Seeded randomized sweeps. Each iteration derives its inputs from the seed,
//! so a failure report's seed reproduces it exactly.
use anyhow::{Result, ensure};
use careersim_progress::{
    Actor, AttemptRef, CompletedSet, MemoryStore, ProgressError, ProgressSnapshot, SyncTrigger,
    TaskStatus, UserId, reconcile,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Scenario, ScenarioCtx, Tab, backend, ensure_linear_gating, open_tab};

pub fn scenarios() -> Vec<Box<dyn Scenario>> {
    vec![Box::new(MultiTabWalk), Box::new(MergeLaws)]
}

fn random_set(rng: &mut ChaCha8Rng, total: u32) -> CompletedSet {
    (0..total).filter(|_| rng.gen_bool(0.4)).collect()
}

struct MultiTabWalk;

#[derive(Debug, Clone, Copy)]
enum Step {
    Complete,
    CompleteLocked,
    ToggleNetwork,
    StorageNotice,
    Focus,
}

impl Step {
    fn pick(rng: &mut ChaCha8Rng) -> Self {
        match rng.gen_range(0..10) {
            0..=3 => Self::Complete,
            4 => Self::CompleteLocked,
            5 => Self::ToggleNetwork,
            6 | 7 => Self::StorageNotice,
            _ => Self::Focus,
        }
    }
}

fn ensure_grew(tab: &Tab, before: &CompletedSet, step: Step) -> Result<()> {
    let now = tab.completed();
    ensure!(
        before.iter().all(|index| now.contains(index)),
        "{step:?} dropped completions: {:?} -> {:?}",
        before.as_slice(),
        now.as_slice()
    );
    Ok(())
}

#[async_trait::async_trait(?Send)]
impl Scenario for MultiTabWalk {
    fn key(&self) -> &'static str {
        "multi-tab-walk"
    }

    fn description(&self) -> &'static str {
        "Random completions, outages and notifications across two tabs never lose progress"
    }

    fn seeded(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
        let total = rng.gen_range(2..=12);
        let attempt = AttemptRef::new("sim-sweep", &format!("att-{:x}", ctx.seed), total);
        let actor = if rng.gen_bool(0.5) {
            Actor::User(UserId::new("sweeper"))
        } else {
            Actor::Guest
        };
        let storage = MemoryStore::new();
        let remote = backend(&attempt, &[], &actor);
        let tabs = [
            open_tab(&attempt, &storage, actor.clone(), remote.clone()),
            open_tab(&attempt, &storage, actor.clone(), remote.clone()),
        ];
        for tab in &tabs {
            tab.sync(SyncTrigger::Mount).await;
        }

        let mut offline = false;
        for _ in 0..total * 4 {
            let step = Step::pick(&mut rng);
            let tab = &tabs[rng.gen_range(0..tabs.len())];
            let before = tab.completed();
            match step {
                Step::Complete => {
                    if let Some(index) = tab.next_available() {
                        let report = tab.complete_task(index).await?;
                        ensure!(
                            tab.task_status(index) == TaskStatus::Completed,
                            "task {index} not completed after {report:?}"
                        );
                    }
                }
                Step::CompleteLocked => {
                    let candidate = tab.next_available().map_or(total, |index| index + 1);
                    if candidate < total && tab.task_status(candidate) == TaskStatus::Locked {
                        ensure!(
                            tab.complete_task(candidate).await
                                == Err(ProgressError::TaskLocked { index: candidate }),
                            "locked task {candidate} accepted"
                        );
                    }
                }
                Step::ToggleNetwork => {
                    offline = !offline;
                    remote.set_offline(offline);
                }
                Step::StorageNotice => {
                    let key = tab.storage_key();
                    tab.on_storage_event(Some(&key), storage.raw(&key).as_deref())
                        .await;
                }
                Step::Focus => {
                    tab.sync(SyncTrigger::FocusRegained).await;
                }
            }
            ensure_grew(tab, &before, step)?;
            ensure_linear_gating(tab)?;
        }

        remote.set_offline(false);
        for tab in tabs.iter().chain(tabs.iter()) {
            tab.sync(SyncTrigger::FocusRegained).await;
        }
        let converged = tabs[0].completed();
        ensure!(
            tabs[1].completed() == converged,
            "tabs diverged: {:?} vs {:?}",
            converged.as_slice(),
            tabs[1].completed().as_slice()
        );
        if actor.is_authenticated() {
            let stored = remote.completed(&attempt.attempt_id);
            ensure!(
                converged.iter().all(|index| stored.contains(index)),
                "store missing completions: local {:?}, store {:?}",
                converged.as_slice(),
                stored.as_slice()
            );
        }
        Ok(())
    }
}

struct MergeLaws;

#[async_trait::async_trait(?Send)]
impl Scenario for MergeLaws {
    fn key(&self) -> &'static str {
        "merge-laws"
    }

    fn description(&self) -> &'static str {
        "Reconciliation is monotonic and commutative for users and local-first for guests"
    }

    fn seeded(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
        let user = Actor::User(UserId::new("merge"));
        for _ in 0..32 {
            let total = rng.gen_range(1..20);
            let attempt = AttemptRef::new("sim-merge", "att-merge", total);
            let a = random_set(&mut rng, total);
            let b = random_set(&mut rng, total);
            let snap_a = ProgressSnapshot::capture(&attempt, &a, 0);
            let snap_b = ProgressSnapshot::capture(&attempt, &b, 0);

            let ab = reconcile(&attempt, Some(&snap_a), Some(&b), &user);
            let ba = reconcile(&attempt, Some(&snap_b), Some(&a), &user);
            ensure!(ab.completed == ba.completed, "union not commutative");
            ensure!(
                a.iter().chain(b.iter()).all(|index| ab.completed.contains(index)),
                "union dropped an index"
            );

            let guest = reconcile(&attempt, Some(&snap_a), Some(&b), &Actor::Guest);
            ensure!(guest.completed == a, "guest merge did not prefer local");

            let other = AttemptRef::new("sim-merge", "att-previous", total);
            let stale = ProgressSnapshot::capture(&other, &a, 0);
            let fresh = reconcile(&attempt, Some(&stale), Some(&b), &user);
            ensure!(fresh.completed == b, "stale snapshot leaked into merge");
        }
        Ok(())
    }
}
