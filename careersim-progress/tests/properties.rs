use careersim_progress::{
    Actor, Attempt, AttemptRef, CompletedSet, LocalProgressCache, MemoryAttemptStore, MemoryStore,
    ProgressCache, ProgressConfig, ProgressSnapshot, ProgressTracker, SyncTrigger, TaskStatus,
    UserId, reconcile, task_status,
};
use futures::executor::block_on;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SEEDS: [u64; 4] = [1337, 0xC0FFEE, 42, 7];
const ROUNDS: usize = 200;

fn random_set(rng: &mut ChaCha8Rng, total: u32) -> CompletedSet {
    (0..total).filter(|_| rng.gen_bool(0.4)).collect()
}

fn user() -> Actor {
    Actor::User(UserId::new("prop-user"))
}

#[test]
fn linear_gating_holds_for_random_sets() {
    for seed in SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..ROUNDS {
            let total = rng.gen_range(1..24);
            let completed = random_set(&mut rng, total);
            assert_ne!(task_status(0, &completed), TaskStatus::Locked);
            for index in 1..total {
                let status = task_status(index, &completed);
                if status == TaskStatus::Available {
                    assert!(completed.contains(index - 1));
                }
                if completed.contains(index) {
                    assert_eq!(status, TaskStatus::Completed);
                }
            }
        }
    }
}

#[test]
fn authenticated_merge_is_monotonic_and_commutative() {
    for seed in SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..ROUNDS {
            let total = rng.gen_range(1..16);
            let attempt = AttemptRef::new("sim", "att", total);
            let a = random_set(&mut rng, total);
            let b = random_set(&mut rng, total);

            let forward = reconcile(
                &attempt,
                Some(&ProgressSnapshot::capture(&attempt, &a, 0)),
                Some(&b),
                &user(),
            );
            let backward = reconcile(
                &attempt,
                Some(&ProgressSnapshot::capture(&attempt, &b, 0)),
                Some(&a),
                &user(),
            );
            assert_eq!(forward.completed, backward.completed);
            assert!(a.iter().all(|index| forward.completed.contains(index)));
            assert!(b.iter().all(|index| forward.completed.contains(index)));

            let again = reconcile(
                &attempt,
                Some(&ProgressSnapshot::capture(&attempt, &a, 0)),
                Some(&b),
                &user(),
            );
            assert_eq!(again, forward);
        }
    }
}

#[test]
fn guest_snapshot_always_wins_over_remote() {
    for seed in SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..ROUNDS {
            let total = rng.gen_range(1..16);
            let attempt = AttemptRef::new("sim", "att", total);
            let local = random_set(&mut rng, total);
            let remote = random_set(&mut rng, total);
            let out = reconcile(
                &attempt,
                Some(&ProgressSnapshot::capture(&attempt, &local, 0)),
                Some(&remote),
                &Actor::Guest,
            );
            assert_eq!(out.completed, local);
        }
    }
}

#[test]
fn stale_snapshot_contributes_nothing() {
    for seed in SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..ROUNDS {
            let total = rng.gen_range(1..16);
            let attempt = AttemptRef::new("sim", "att-current", total);
            let previous = AttemptRef::new("sim", "att-previous", total);
            let stale = random_set(&mut rng, total);
            let remote = random_set(&mut rng, total);
            let snapshot = ProgressSnapshot::capture(&previous, &stale, 0);
            for actor in [Actor::Guest, user()] {
                let out = reconcile(&attempt, Some(&snapshot), Some(&remote), &actor);
                assert_eq!(out.completed, remote);
            }
        }
    }
}

#[test]
fn completing_twice_equals_completing_once() {
    for seed in SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let total = rng.gen_range(2..10);
        let attempt = AttemptRef::new("sim", "att", total);
        let steps = rng.gen_range(1..=total);

        let once = tracker(&attempt);
        let twice = tracker(&attempt);
        block_on(once.sync(SyncTrigger::Mount));
        block_on(twice.sync(SyncTrigger::Mount));
        for index in 0..steps {
            block_on(once.complete_task(index)).unwrap();
            block_on(twice.complete_task(index)).unwrap();
            block_on(twice.complete_task(index)).unwrap();
        }
        assert_eq!(once.completed(), twice.completed());
        assert_eq!(once.is_all_tasks_completed(), steps == total);
    }
}

#[test]
fn cache_round_trip_preserves_random_sets() {
    let cache = LocalProgressCache::new(MemoryStore::new(), ProgressConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(SEEDS[0]);
    for _ in 0..ROUNDS {
        let total = rng.gen_range(1..32);
        let attempt = AttemptRef::new("sim-roundtrip", "att", total);
        let set = random_set(&mut rng, total);
        cache.write(&ProgressSnapshot::capture(&attempt, &set, 99));
        let back = cache.read(&attempt.simulation_id).expect("snapshot present");
        assert!(back.belongs_to(&attempt));
        assert_eq!(back.completed, set);
    }
}

fn tracker(
    attempt: &AttemptRef,
) -> ProgressTracker<LocalProgressCache<MemoryStore>, MemoryAttemptStore> {
    let remote = MemoryAttemptStore::with_attempt(Attempt::new(attempt, [], None));
    let cache = LocalProgressCache::new(MemoryStore::new(), ProgressConfig::default());
    ProgressTracker::new(attempt.clone(), user(), cache, remote)
}
