#![cfg(target_arch = "wasm32")]

use std::rc::Rc;

use std::cell::RefCell;

use careersim_progress::{
    Actor, AttemptRef, Clock, CompletedSet, KeyValueStore, LocalProgressCache,
    MemoryAttemptStore, ProgressCache, ProgressConfig, ProgressEvent, ProgressSnapshot,
    ProgressTracker, SyncTrigger, TaskStatus,
};
use careersim_web::components::task_stepper::{Props, TaskStepper};
use careersim_web::hook::build_tracker;
use careersim_web::{
    BrowserClock, BrowserStore, ProgressHandle, SimulationProps, SyncListeners, dom,
};
use js_sys::{Function, Promise};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::HtmlButtonElement;
use yew::{Callback, Renderer};

wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

/// Yield to the browser event loop for `duration_ms`.
async fn sleep_ms(duration_ms: i32) {
    let mut resolve_slot: Option<Function> = None;
    let promise = Promise::new(&mut |resolve, _reject| {
        resolve_slot = Some(resolve);
    });
    let resolve = resolve_slot.expect("promise executor runs synchronously");
    let closure = Closure::once(move || {
        let _ = resolve.call0(&JsValue::UNDEFINED);
    });
    dom::window()
        .expect("window")
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            duration_ms,
        )
        .expect("schedule timer");
    closure.forget();
    JsFuture::from(promise).await.expect("timer promise");
}

fn fresh_root(id: &str) -> web_sys::Element {
    let doc = dom::document().expect("document");
    if let Some(root) = doc.get_element_by_id(id) {
        root.set_inner_html("");
        return root;
    }
    let root = doc.create_element("div").expect("create root");
    root.set_id(id);
    doc.body()
        .expect("document body")
        .append_child(&root)
        .expect("append root");
    root
}

#[wasm_bindgen_test]
fn dom_helpers_find_window() {
    assert!(dom::window().is_some());
    assert!(dom::document().is_some());
    assert!(dom::local_storage().is_ok());
}

#[wasm_bindgen_test]
fn browser_store_round_trips_values() {
    let store = BrowserStore;
    store.set_item("careersim.test.key", "value").expect("set");
    assert_eq!(
        store.get_item("careersim.test.key").expect("get").as_deref(),
        Some("value")
    );
    store.remove_item("careersim.test.key").expect("remove");
    assert_eq!(store.get_item("careersim.test.key").expect("get"), None);
}

#[wasm_bindgen_test]
fn snapshot_persists_in_local_storage() {
    let attempt = AttemptRef::new("sim-wasm", "att-wasm", 3);
    let cache = LocalProgressCache::new(BrowserStore, ProgressConfig::default());
    let snapshot = ProgressSnapshot::capture(
        &attempt,
        &CompletedSet::from_indices([0, 1]),
        BrowserClock.now_ms(),
    );
    cache.write(&snapshot);
    let back = cache.read(&attempt.simulation_id).expect("snapshot");
    assert_eq!(back.completed.as_slice(), &[0, 1]);
    cache.clear(&attempt.simulation_id);
    assert!(cache.read(&attempt.simulation_id).is_none());
}

#[wasm_bindgen_test]
fn browser_clock_is_wall_time() {
    assert!(BrowserClock.now_ms() > 1_600_000_000_000);
}

#[wasm_bindgen_test]
fn listeners_register_and_drop() {
    let attempt = AttemptRef::new("sim-listen", "att-listen", 2);
    let tracker = Rc::new(ProgressTracker::new(
        attempt,
        Actor::Guest,
        LocalProgressCache::new(BrowserStore, ProgressConfig::default()),
        MemoryAttemptStore::new(),
    ));
    let listeners = SyncListeners::attach(&tracker, Some(std::time::Duration::from_secs(60)));
    assert_eq!(listeners.event_count(), 3);
    assert!(listeners.has_interval());
    drop(listeners);
}

#[wasm_bindgen_test]
async fn stepper_button_reports_available_index() {
    let clicked = Rc::new(std::cell::Cell::new(None));
    let sink = Rc::clone(&clicked);
    let props = Props {
        statuses: vec![TaskStatus::Completed, TaskStatus::Available, TaskStatus::Locked],
        titles: Vec::new(),
        pending: None,
        on_complete: Callback::from(move |index: u32| sink.set(Some(index))),
    };
    let root = fresh_root("stepper-root");
    Renderer::<TaskStepper>::with_root_and_props(root.clone(), props).render();
    sleep_ms(0).await;

    let buttons = root
        .query_selector_all("button.task__complete")
        .expect("query buttons");
    assert_eq!(buttons.length(), 2);
    let available: HtmlButtonElement = buttons
        .get(0)
        .expect("available button")
        .dyn_into()
        .expect("button element");
    let locked: HtmlButtonElement = buttons
        .get(1)
        .expect("locked button")
        .dyn_into()
        .expect("button element");
    assert!(!available.disabled());
    assert!(locked.disabled());
    available.click();
    assert_eq!(clicked.get(), Some(1));
}

#[wasm_bindgen_test]
async fn handle_reset_clears_browser_progress() {
    let props = SimulationProps {
        simulation_id: "sim-wasm-reset".into(),
        attempt_id: "att-wasm-reset".into(),
        total_task_count: 3,
        user_id: None,
        api_base: "/api".into(),
        auth_token: None,
    };
    let tracker = build_tracker(&props);
    let attempt = props.attempt_ref();
    tracker.cache().write(&ProgressSnapshot::capture(
        &attempt,
        &CompletedSet::from_indices([0, 1]),
        BrowserClock.now_ms(),
    ));
    let handle = ProgressHandle::from(Rc::new(tracker));
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    handle
        .tracker()
        .subscribe(move |event| sink.borrow_mut().push(event.clone()));

    // A guest with a same-attempt snapshot settles from the cache alone.
    assert!(handle.tracker().sync(SyncTrigger::Mount).await);
    assert_eq!(
        handle.statuses(),
        vec![TaskStatus::Completed, TaskStatus::Completed, TaskStatus::Available]
    );

    handle.reset();

    let key = handle.tracker().storage_key();
    assert_eq!(BrowserStore.get_item(&key).expect("get"), None);
    assert_eq!(
        handle.statuses(),
        vec![TaskStatus::Available, TaskStatus::Locked, TaskStatus::Locked]
    );
    assert_eq!(handle.percent(), 0);
    assert!(matches!(events.borrow().last(), Some(ProgressEvent::Reset)));
}
