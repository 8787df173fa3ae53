//! DOM events that start reconciliation passes.
use std::rc::Rc;
use std::time::Duration;

use careersim_progress::{AttemptStore, ProgressCache, ProgressTracker, SyncTrigger};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, EventTarget, StorageEvent, VisibilityState};

use crate::dom;

type EventClosure = Closure<dyn FnMut(Event)>;

/// Listener registrations for one tracker: window `focus`, document
/// `visibilitychange`, window `storage` and an optional periodic re-check.
/// Everything is unregistered on drop.
pub struct SyncListeners {
    events: Vec<(EventTarget, &'static str, EventClosure)>,
    interval: Option<(i32, Closure<dyn FnMut()>)>,
}

impl SyncListeners {
    /// Register all triggers for `tracker`. Registration failures are logged
    /// and leave the remaining triggers active.
    pub fn attach<C, R>(tracker: &Rc<ProgressTracker<C, R>>, recheck: Option<Duration>) -> Self
    where
        C: ProgressCache + 'static,
        R: AttemptStore + 'static,
    {
        let mut listeners = Self {
            events: Vec::new(),
            interval: None,
        };
        let Some(win) = dom::window() else {
            log::warn!("no window; progress triggers disabled");
            return listeners;
        };

        let focus = {
            let tracker = Rc::clone(tracker);
            Closure::wrap(Box::new(move |_: Event| {
                spawn_sync(&tracker, SyncTrigger::FocusRegained);
            }) as Box<dyn FnMut(Event)>)
        };
        listeners.listen(win.clone().unchecked_into(), "focus", focus);

        if let Some(doc) = win.document() {
            let tracker = Rc::clone(tracker);
            let watched = doc.clone();
            let visibility = Closure::wrap(Box::new(move |_: Event| {
                if watched.visibility_state() == VisibilityState::Visible {
                    spawn_sync(&tracker, SyncTrigger::FocusRegained);
                }
            }) as Box<dyn FnMut(Event)>);
            listeners.listen(doc.unchecked_into(), "visibilitychange", visibility);
        }

        let storage = {
            let tracker = Rc::clone(tracker);
            Closure::wrap(Box::new(move |event: Event| {
                let Some(event) = event.dyn_ref::<StorageEvent>() else {
                    return;
                };
                let key = event.key();
                if !tracker.is_relevant_storage_key(key.as_deref()) {
                    return;
                }
                let new_value = event.new_value();
                let tracker = Rc::clone(&tracker);
                spawn_local(async move {
                    tracker
                        .on_storage_event(key.as_deref(), new_value.as_deref())
                        .await;
                });
            }) as Box<dyn FnMut(Event)>)
        };
        listeners.listen(win.clone().unchecked_into(), "storage", storage);

        if let Some(every) = recheck {
            let tracker = Rc::clone(tracker);
            let tick = Closure::wrap(Box::new(move || {
                spawn_sync(&tracker, SyncTrigger::Periodic);
            }) as Box<dyn FnMut()>);
            let timeout = i32::try_from(every.as_millis()).unwrap_or(i32::MAX);
            match win.set_interval_with_callback_and_timeout_and_arguments_0(
                tick.as_ref().unchecked_ref(),
                timeout,
            ) {
                Ok(id) => listeners.interval = Some((id, tick)),
                Err(err) => log::warn!(
                    "periodic re-check not scheduled: {}",
                    dom::js_error_message(&err)
                ),
            }
        }

        listeners
    }

    /// Number of active DOM event registrations.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub const fn has_interval(&self) -> bool {
        self.interval.is_some()
    }

    fn listen(&mut self, target: EventTarget, name: &'static str, closure: EventClosure) {
        match target.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref()) {
            Ok(()) => self.events.push((target, name, closure)),
            Err(err) => log::warn!(
                "could not listen for {name}: {}",
                dom::js_error_message(&err)
            ),
        }
    }
}

impl Drop for SyncListeners {
    fn drop(&mut self) {
        for (target, name, closure) in self.events.drain(..) {
            let _ = target.remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
        }
        if let Some((id, _tick)) = self.interval.take()
            && let Some(win) = dom::window()
        {
            win.clear_interval_with_handle(id);
        }
    }
}

fn spawn_sync<C, R>(tracker: &Rc<ProgressTracker<C, R>>, trigger: SyncTrigger)
where
    C: ProgressCache + 'static,
    R: AttemptStore + 'static,
{
    let tracker = Rc::clone(tracker);
    spawn_local(async move {
        tracker.sync(trigger).await;
    });
}
