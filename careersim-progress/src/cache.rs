//! Local Progress Cache: a typed, failure-absorbing view over a key/value store.
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

use crate::KeyValueStore;
use crate::attempt::SimulationId;
use crate::config::ProgressConfig;
use crate::snapshot::{ProgressSnapshot, SNAPSHOT_VERSION};

/// Capability the tracker depends on for local persistence.
///
/// Implementations never fail: unavailable storage behaves as an empty,
/// write-discarding cache.
pub trait ProgressCache {
    /// Read the snapshot stored for `simulation_id`. Corrupt or foreign
    /// entries read as `None`.
    fn read(&self, simulation_id: &SimulationId) -> Option<ProgressSnapshot>;

    /// Overwrite the snapshot for the snapshot's simulation.
    fn write(&self, snapshot: &ProgressSnapshot);

    /// Forget the snapshot for `simulation_id`.
    fn clear(&self, simulation_id: &SimulationId);

    /// Storage key used for `simulation_id`, for matching change notifications.
    fn storage_key(&self, simulation_id: &SimulationId) -> String;
}

/// [`ProgressCache`] backed by any [`KeyValueStore`], storing JSON snapshots.
#[derive(Debug, Clone)]
pub struct LocalProgressCache<S> {
    store: S,
    config: ProgressConfig,
}

impl<S: KeyValueStore> LocalProgressCache<S> {
    pub const fn new(store: S, config: ProgressConfig) -> Self {
        Self { store, config }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KeyValueStore> ProgressCache for LocalProgressCache<S> {
    fn read(&self, simulation_id: &SimulationId) -> Option<ProgressSnapshot> {
        let key = self.storage_key(simulation_id);
        let raw = match self.store.get_item(&key) {
            Ok(raw) => raw?,
            Err(err) => {
                log::warn!("progress cache read failed for {key}: {err}");
                return None;
            }
        };
        let snapshot = match serde_json::from_str::<ProgressSnapshot>(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::debug!("discarding malformed progress snapshot {key}: {err}");
                return None;
            }
        };
        if snapshot.version != SNAPSHOT_VERSION || &snapshot.simulation_id != simulation_id {
            log::debug!(
                "discarding progress snapshot {key}: version {} simulation {}",
                snapshot.version,
                snapshot.simulation_id
            );
            return None;
        }
        Some(snapshot)
    }

    fn write(&self, snapshot: &ProgressSnapshot) {
        let key = self.storage_key(&snapshot.simulation_id);
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("progress snapshot {key} not serialisable: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set_item(&key, &payload) {
            log::warn!("progress cache write failed for {key}: {err}");
        }
    }

    fn clear(&self, simulation_id: &SimulationId) {
        let key = self.storage_key(simulation_id);
        if let Err(err) = self.store.remove_item(&key) {
            log::warn!("progress cache clear failed for {key}: {err}");
        }
    }

    fn storage_key(&self, simulation_id: &SimulationId) -> String {
        self.config.storage_key(simulation_id.as_str())
    }
}

/// In-memory [`KeyValueStore`]. Clones share one map, the way tabs of one
/// origin share `localStorage`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.raw(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.insert_raw(key, value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), Self::Error> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("storage unavailable")]
pub struct StoreUnavailable;

/// A [`KeyValueStore`] that rejects every operation, as private browsing or
/// an exhausted quota does.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    type Error = StoreUnavailable;

    fn get_item(&self, _key: &str) -> Result<Option<String>, Self::Error> {
        Err(StoreUnavailable)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), Self::Error> {
        Err(StoreUnavailable)
    }

    fn remove_item(&self, _key: &str) -> Result<(), Self::Error> {
        Err(StoreUnavailable)
    }
}
