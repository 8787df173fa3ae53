#![forbid(unsafe_code)]
//! Browser bindings for the CareerSim progress engine.
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod clock;
pub mod components;
pub mod dom;
pub mod hook;
pub mod remote;
pub mod storage;
pub mod triggers;

pub use clock::BrowserClock;
pub use hook::{BrowserTracker, ProgressHandle, SimulationProps, use_simulation_progress};
pub use remote::{HttpAttemptStore, RemoteError};
pub use storage::{BrowserStore, BrowserStoreError};
pub use triggers::SyncListeners;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Mount a simulation progress view into the element with id `root_id`.
///
/// `options_json` is a [`components::simulation_view::MountOptions`] document.
///
/// # Errors
/// Returns an error if the options are malformed or the root element is missing.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn mount_simulation(root_id: &str, options_json: &str) -> Result<(), JsValue> {
    let options: components::simulation_view::MountOptions = serde_json::from_str(options_json)
        .map_err(|err| JsValue::from_str(&format!("invalid mount options: {err}")))?;
    let root = dom::document()
        .and_then(|doc| doc.get_element_by_id(root_id))
        .ok_or_else(|| JsValue::from_str(&format!("no element with id {root_id}")))?;
    yew::Renderer::<components::simulation_view::SimulationView>::with_root_and_props(
        root,
        options.into_props(),
    )
    .render();
    Ok(())
}
