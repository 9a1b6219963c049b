//! Turns press/release notifications into activation lifecycle events.
//!
//! At most one hotspot dwells at a time and at most one is activated. Releasing a dwelling
//! hotspot parks its attempt in a registry so that pressing it again resumes the (decaying)
//! progress instead of starting over. A hotspot that finishes dwelling evicts the previously
//! activated one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::attempt::{ActivationAttempt, AttemptContext, Completion};
use crate::models::{HotspotEvent, HotspotId};
use crate::sensor::{SensorHub, SensorListener, Subscription};

#[derive(Debug, Default)]
struct SchedulerState {
    /// The latest attempt; dwelling unless it is done
    current: Option<ActivationAttempt>,
    /// Cancelled attempts that a later press may resume, at most one per hotspot
    cancelled: HashMap<HotspotId, ActivationAttempt>,
    /// The hotspot that is currently activated
    activated: Option<HotspotId>,
    closed: bool,
}

/// Subscriber list for lifecycle events. Sending never blocks.
#[derive(Debug, Default)]
struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<HotspotEvent>>>,
    closed: Mutex<bool>,
}

impl EventBus {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<HotspotEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if !*closed {
            self.subscribers().push(tx);
        }
        rx
    }

    fn emit(&self, event: HotspotEvent) {
        debug!(%event, "hotspot event");
        // Drop subscribers whose receiver has gone away
        self.subscribers().retain(|tx| tx.send(event).is_ok());
    }

    fn close(&self) {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.subscribers().clear();
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<HotspotEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Lock order is always state -> attempt -> event bus
#[derive(Debug)]
struct SchedulerInner {
    state: Mutex<SchedulerState>,
    events: EventBus,
    attempts: AttemptContext,
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn press(&self, id: HotspotId) {
        let mut state = self.lock();
        if state.closed {
            return;
        }

        // An activated hotspot ignores re-presses; only one hotspot dwells at a time
        let dwelling = state.current.as_ref().is_some_and(|attempt| !attempt.is_done());
        if state.activated == Some(id) || dwelling {
            trace!(hotspot = %id, "ignoring hotspot press");
            return;
        }

        let attempt = match state.cancelled.remove(&id) {
            Some(cancelled) => ActivationAttempt::resume(cancelled, &self.attempts),
            None => ActivationAttempt::new(id, &self.attempts),
        };

        // The previous attempt is done, so its resumable memory is discarded
        if let Some(previous) = state.current.replace(attempt) {
            state.cancelled.remove(&previous.id());
        }
    }

    fn release(&self, id: HotspotId) {
        let mut state = self.lock();
        self.release_locked(&mut state, id);
    }

    fn release_locked(&self, state: &mut SchedulerState, id: HotspotId) {
        if state.closed {
            return;
        }

        let dwelling = state
            .current
            .as_ref()
            .is_some_and(|attempt| attempt.id() == id && !attempt.is_done());
        if !dwelling {
            return;
        }
        let Some(attempt) = state.current.take() else {
            return;
        };

        attempt.cancel();
        state.cancelled.insert(id, attempt);

        // Re-presses of the activated hotspot are ignored, so it can never be the dwelling one
        debug_assert_ne!(state.activated, Some(id), "released hotspot is both dwelling and activated");
        if state.activated == Some(id) {
            warn!(hotspot = %id, "suppressing deactivation of activated hotspot");
        } else {
            self.events.emit(HotspotEvent::Deactivating(id));
        }
    }

    fn complete(&self, completion: Completion) {
        let mut state = self.lock();
        if state.closed {
            return;
        }

        let id = completion.id();
        if !completion.finish() {
            trace!(hotspot = %id, "activation was cancelled before completing");
            return;
        }

        // Only the dwelling attempt can still be uncancelled. It stays in `current` as done.
        debug_assert_eq!(state.current.as_ref().map(ActivationAttempt::id), Some(id));

        if let Some(previous) = state.activated.replace(id) {
            if previous != id {
                self.events.emit(HotspotEvent::ForcefullyDeactivated(previous));
            }
        }
        self.events.emit(HotspotEvent::Activated(id));
    }

    fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;

        if let Some(attempt) = state.current.take() {
            attempt.cancel();
        }
        state.cancelled.clear();
        state.activated = None;
        self.events.close();
        debug!("hotspot scheduler shut down");
    }
}

impl SensorListener for SchedulerInner {
    fn on_pressed(&self, id: HotspotId) {
        self.press(id);
    }

    fn on_released(&self, id: HotspotId) {
        self.release(id);
    }
}

/// Decides which single hotspot is activated from a stream of presses and releases.
///
/// Presses and releases may be reported from any thread; dwell timers run on the tokio
/// runtime the scheduler was created with. Lifecycle events are delivered through
/// [`HotspotActivationScheduler::subscribe`].
#[derive(Debug)]
pub struct HotspotActivationScheduler {
    inner: Arc<SchedulerInner>,
    sensor: Mutex<Option<Subscription>>,
}

impl HotspotActivationScheduler {
    /// Create a scheduler whose timers run on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(activation_time: Duration) -> Self {
        Self::with_runtime(activation_time, Handle::current())
    }

    pub fn with_runtime(activation_time: Duration, runtime: Handle) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<SchedulerInner>| {
            let activating = weak.clone();
            let activated = weak.clone();
            SchedulerInner {
                state: Mutex::default(),
                events: EventBus::default(),
                attempts: AttemptContext::new(
                    activation_time,
                    runtime,
                    move |id| {
                        if let Some(inner) = activating.upgrade() {
                            inner.events.emit(HotspotEvent::Activating(id));
                        }
                    },
                    move |completion| {
                        if let Some(inner) = activated.upgrade() {
                            inner.complete(completion);
                        }
                    },
                ),
            }
        });

        Self {
            inner,
            sensor: Mutex::new(None),
        }
    }

    pub fn activation_time(&self) -> Duration {
        self.inner.attempts.activation_time()
    }

    /// Receive every lifecycle event emitted from now on. The channel closes on shutdown.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<HotspotEvent> {
        self.inner.events.subscribe()
    }

    /// Listen to presses and releases reported to `hub`, replacing any earlier attachment.
    pub fn attach(&self, hub: &SensorHub) {
        let subscription = hub.subscribe(Arc::clone(&self.inner) as Arc<dyn SensorListener>);
        *self.sensor_slot() = Some(subscription);
    }

    pub fn on_pressed(&self, id: HotspotId) {
        self.inner.press(id);
    }

    pub fn on_released(&self, id: HotspotId) {
        self.inner.release(id);
    }

    /// The hotspot that is currently activated, if any
    pub fn activated(&self) -> Option<HotspotId> {
        self.inner.lock().activated
    }

    /// The hotspot that is currently dwelling, if any
    pub fn activating(&self) -> Option<HotspotId> {
        self.inner
            .lock()
            .current
            .as_ref()
            .filter(|attempt| !attempt.is_done())
            .map(ActivationAttempt::id)
    }

    /// Detach from the sensor hub, stop the dwelling attempt and close all event channels.
    pub fn shutdown(&self) {
        if let Some(subscription) = self.sensor_slot().take() {
            subscription.cancel();
        }
        self.inner.close();
    }

    fn sensor_slot(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.sensor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for HotspotActivationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
