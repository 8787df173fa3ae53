//! Yew hook wiring a [`ProgressTracker`] into a component.
use std::rc::Rc;

use careersim_progress::{
    Actor, AttemptRef, CompletionReport, LocalProgressCache, ProgressConfig, ProgressError,
    ProgressTracker, SyncPhase, SyncTrigger, TaskStatus, UserId, progress_percent,
};
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::clock::BrowserClock;
use crate::remote::HttpAttemptStore;
use crate::storage::BrowserStore;
use crate::triggers::SyncListeners;

pub type BrowserTracker = ProgressTracker<LocalProgressCache<BrowserStore>, HttpAttemptStore>;

/// What a view needs to track progress for one attempt.
#[derive(Properties, Clone, PartialEq, Eq, Debug)]
pub struct SimulationProps {
    pub simulation_id: AttrValue,
    pub attempt_id: AttrValue,
    pub total_task_count: u32,
    /// Authenticated user, `None` for guests.
    #[prop_or_default]
    pub user_id: Option<AttrValue>,
    pub api_base: AttrValue,
    #[prop_or_default]
    pub auth_token: Option<AttrValue>,
}

impl SimulationProps {
    #[must_use]
    pub fn attempt_ref(&self) -> AttemptRef {
        AttemptRef::new(&self.simulation_id, &self.attempt_id, self.total_task_count)
    }

    #[must_use]
    pub fn actor(&self) -> Actor {
        actor_for(self.user_id.as_ref())
    }

    fn tracker_key(&self) -> TrackerKey {
        TrackerKey {
            simulation_id: self.simulation_id.clone(),
            attempt_id: self.attempt_id.clone(),
            total_task_count: self.total_task_count,
            api_base: self.api_base.clone(),
            auth_token: self.auth_token.clone(),
        }
    }
}

fn actor_for(user_id: Option<&AttrValue>) -> Actor {
    Actor::from_user_id(
        user_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| UserId::new(id)),
    )
}

/// Props that force a new tracker. The user id is not among them: an identity
/// change is applied to the live tracker instead.
#[derive(Clone, PartialEq, Eq)]
struct TrackerKey {
    simulation_id: AttrValue,
    attempt_id: AttrValue,
    total_task_count: u32,
    api_base: AttrValue,
    auth_token: Option<AttrValue>,
}

/// Build the browser tracker for `props`. Touches no browser API until a
/// method on the tracker is called.
#[must_use]
pub fn build_tracker(props: &SimulationProps) -> BrowserTracker {
    let config = ProgressConfig::load_from_static();
    let cache = LocalProgressCache::new(BrowserStore, config.clone());
    let remote = HttpAttemptStore::new(&props.api_base)
        .with_bearer_token(props.auth_token.as_ref().map(ToString::to_string));
    ProgressTracker::new(props.attempt_ref(), props.actor(), cache, remote)
        .with_config(config)
        .with_clock(Rc::new(BrowserClock))
}

/// Handle returned by [`use_simulation_progress`].
#[derive(Clone)]
pub struct ProgressHandle {
    tracker: Rc<BrowserTracker>,
}

impl PartialEq for ProgressHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tracker, &other.tracker)
    }
}

impl From<Rc<BrowserTracker>> for ProgressHandle {
    fn from(tracker: Rc<BrowserTracker>) -> Self {
        Self { tracker }
    }
}

impl ProgressHandle {
    #[must_use]
    pub fn status(&self, index: u32) -> TaskStatus {
        self.tracker.task_status(index)
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.tracker.task_statuses()
    }

    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.tracker.is_all_tasks_completed()
    }

    /// Whole-number completion percentage.
    #[must_use]
    pub fn percent(&self) -> u8 {
        progress_percent(
            self.tracker.attempt().total_task_count,
            &self.tracker.completed(),
        )
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.tracker.phase()
    }

    /// Complete task `index` in the background and report the outcome.
    pub fn complete(
        &self,
        index: u32,
        done: Callback<Result<CompletionReport, ProgressError>>,
    ) {
        let tracker = Rc::clone(&self.tracker);
        spawn_local(async move {
            done.emit(tracker.complete_task(index).await);
        });
    }

    /// The attempt was reset elsewhere (for example by a "start over"
    /// action): drop this browser's cached progress for it.
    pub fn reset(&self) {
        self.tracker.reset();
    }

    #[must_use]
    pub const fn tracker(&self) -> &Rc<BrowserTracker> {
        &self.tracker
    }
}

#[hook]
pub fn use_simulation_progress(props: &SimulationProps) -> ProgressHandle {
    let update = use_force_update();
    let key = props.tracker_key();
    let tracker = {
        let props = props.clone();
        use_memo(key.clone(), move |_| build_tracker(&props))
    };

    {
        let tracker = Rc::clone(&tracker);
        use_effect_with(key, move |_| {
            let subscription = tracker.subscribe(move |_| update.force_update());
            let listeners = SyncListeners::attach(&tracker, tracker.config().recheck_interval());
            let mount = Rc::clone(&tracker);
            spawn_local(async move {
                mount.sync(SyncTrigger::Mount).await;
            });
            move || {
                tracker.unsubscribe(subscription);
                drop(listeners);
            }
        });
    }

    {
        let tracker = Rc::clone(&tracker);
        use_effect_with(props.user_id.clone(), move |user_id| {
            let actor = actor_for(user_id.as_ref());
            if tracker.actor() != actor {
                tracker.set_actor(actor);
                spawn_local(async move {
                    tracker.sync(SyncTrigger::FocusRegained).await;
                });
            }
            || {}
        });
    }

    ProgressHandle::from(tracker)
}
