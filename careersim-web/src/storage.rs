//! `localStorage` backed key-value store.
use careersim_progress::KeyValueStore;
use web_sys::Storage;

use crate::dom;

#[derive(Debug, thiserror::Error)]
pub enum BrowserStoreError {
    #[error("localStorage unavailable: {0}")]
    Unavailable(String),
    #[error("localStorage {op} failed for {key}: {message}")]
    Operation {
        op: &'static str,
        key: String,
        message: String,
    },
}

/// [`KeyValueStore`] over `window.localStorage`.
///
/// The storage handle is looked up per call, so a store created before the
/// page finished loading (or in a sandboxed frame) degrades to errors rather
/// than panicking.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStore;

impl BrowserStore {
    fn storage() -> Result<Storage, BrowserStoreError> {
        dom::local_storage()
            .map_err(|err| BrowserStoreError::Unavailable(dom::js_error_message(&err)))
    }

    fn operation_error(op: &'static str, key: &str, err: &wasm_bindgen::JsValue) -> BrowserStoreError {
        BrowserStoreError::Operation {
            op,
            key: key.to_string(),
            message: dom::js_error_message(err),
        }
    }
}

impl KeyValueStore for BrowserStore {
    type Error = BrowserStoreError;

    fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Self::storage()?
            .get_item(key)
            .map_err(|err| Self::operation_error("read", key, &err))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|err| Self::operation_error("write", key, &err))
    }

    fn remove_item(&self, key: &str) -> Result<(), Self::Error> {
        Self::storage()?
            .remove_item(key)
            .map_err(|err| Self::operation_error("remove", key, &err))
    }
}
