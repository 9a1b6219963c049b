//! Inbound boundary to the press detector.
//!
//! The detector (camera pipeline, touch panel, or a script) reports presses and releases to a
//! [`SensorHub`], which fans them out to every subscribed [`SensorListener`].

mod script;

pub use script::{SensorCommand, SensorScript};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use uuid::Uuid;

use crate::models::HotspotId;

/// Receiver of press/release notifications. Calls may arrive on any thread.
pub trait SensorListener: Send + Sync {
    fn on_pressed(&self, id: HotspotId);
    fn on_released(&self, id: HotspotId);
}

type Listeners = Mutex<HashMap<Uuid, Arc<dyn SensorListener>>>;

fn lock(listeners: &Listeners) -> MutexGuard<'_, HashMap<Uuid, Arc<dyn SensorListener>>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out point for sensor notifications. Clones share the same listeners.
#[derive(Clone, Default)]
pub struct SensorHub {
    listeners: Arc<Listeners>,
}

impl SensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned [`Subscription`] is dropped.
    pub fn subscribe(&self, listener: Arc<dyn SensorListener>) -> Subscription {
        let id = Uuid::new_v4();
        lock(&self.listeners).insert(id, listener);
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn notify_pressed(&self, id: HotspotId) {
        for listener in self.snapshot() {
            listener.on_pressed(id);
        }
    }

    pub fn notify_released(&self, id: HotspotId) {
        for listener in self.snapshot() {
            listener.on_released(id);
        }
    }

    pub fn has_subscribers(&self) -> bool {
        !lock(&self.listeners).is_empty()
    }

    // Listeners are called without holding the lock so they may (un)subscribe themselves
    fn snapshot(&self) -> Vec<Arc<dyn SensorListener>> {
        lock(&self.listeners).values().cloned().collect()
    }
}

impl fmt::Debug for SensorHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorHub")
            .field("listeners", &lock(&self.listeners).len())
            .finish()
    }
}

/// Handle to a registered listener; unsubscribes when cancelled or dropped.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Unsubscribe now. Dropping the subscription does the same.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).remove(&self.id);
        }
    }
}
