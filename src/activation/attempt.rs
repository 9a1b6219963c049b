//! A single run of the dwell timer for one hotspot.
//!
//! An attempt runs on a background task: it fires the activating callback, waits out the
//! remaining dwell time and then hands a [`Completion`] to the activated callback. Cancelling
//! records how much progress had been made so that a later attempt for the same hotspot can
//! pick up where this one stopped, minus whatever has decayed in the meantime.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

use crate::models::HotspotId;

type ActivatingFn = dyn Fn(HotspotId) + Send + Sync;
type ActivatedFn = dyn Fn(Completion) + Send + Sync;

/// Everything an attempt needs besides its hotspot id: the dwell duration, the runtime its
/// timer runs on and the two lifecycle callbacks.
#[derive(Clone)]
pub struct AttemptContext {
    activation_time: Duration,
    runtime: Handle,
    on_activating: Arc<ActivatingFn>,
    on_activated: Arc<ActivatedFn>,
}

impl AttemptContext {
    /// `on_activating` runs while the attempt's own lock is held, so it must not block on
    /// anything that may in turn wait for [`ActivationAttempt::cancel`].
    pub fn new<A, B>(activation_time: Duration, runtime: Handle, on_activating: A, on_activated: B) -> Self
    where
        A: Fn(HotspotId) + Send + Sync + 'static,
        B: Fn(Completion) + Send + Sync + 'static,
    {
        Self {
            activation_time,
            runtime,
            on_activating: Arc::new(on_activating),
            on_activated: Arc::new(on_activated),
        }
    }

    pub fn activation_time(&self) -> Duration {
        self.activation_time
    }
}

impl fmt::Debug for AttemptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptContext")
            .field("activation_time", &self.activation_time)
            .finish_non_exhaustive()
    }
}

/// When an attempt was cancelled and how much dwell progress it had made by then
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancellation {
    pub at: Instant,
    pub progress: Duration,
}

impl Cancellation {
    /// Progress left at `now`: the recorded progress erodes one-for-one with idle time.
    pub fn remaining_progress(&self, now: Instant) -> Duration {
        self.progress
            .saturating_sub(now.saturating_duration_since(self.at))
    }
}

#[derive(Debug, Default)]
struct AttemptState {
    done: bool,
    cancelled: Option<Cancellation>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<AttemptState>,
    cancel: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, AttemptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One run of the dwell timer. Goes from running to done or cancelled exactly once;
/// resuming always creates a new attempt.
#[derive(Debug)]
pub struct ActivationAttempt {
    id: HotspotId,
    started_at: Instant,
    shared: Arc<Shared>,
}

impl ActivationAttempt {
    /// Start a fresh attempt that waits for the full activation time.
    pub fn new(id: HotspotId, ctx: &AttemptContext) -> Self {
        let attempt = Self::spawn(id, Duration::ZERO, ctx);
        trace!(hotspot = %id, "started activation attempt");
        attempt
    }

    /// Start a new attempt that continues the decayed progress of a cancelled one.
    ///
    /// # Panics
    ///
    /// Panics if `cancelled` was never cancelled.
    pub fn resume(cancelled: ActivationAttempt, ctx: &AttemptContext) -> Self {
        let (done, cancellation) = {
            let state = cancelled.shared.lock();
            (state.done, state.cancelled)
        };
        let Some(cancellation) = cancellation else {
            panic!(
                "cannot resume activation of hotspot {} that was never cancelled",
                cancelled.id
            );
        };

        // A cancel that lost the race against completion leaves nothing to resume
        let progress = if done {
            Duration::ZERO
        } else {
            cancellation.remaining_progress(Instant::now())
        };

        let attempt = Self::spawn(cancelled.id, progress, ctx);
        trace!(
            hotspot = %attempt.id,
            progress_ms = progress.as_millis() as u64,
            "resumed activation attempt"
        );
        attempt
    }

    fn spawn(id: HotspotId, progress: Duration, ctx: &AttemptContext) -> Self {
        let now = Instant::now();
        // Back-date the start so a later cancel measures the whole lineage
        let started_at = now.checked_sub(progress).unwrap_or(now);
        let shared = Arc::new(Shared::default());
        let wait = ctx.activation_time.saturating_sub(progress);

        ctx.runtime.spawn(run_attempt(
            id,
            wait,
            Arc::clone(&shared),
            Arc::clone(&ctx.on_activating),
            Arc::clone(&ctx.on_activated),
        ));

        Self {
            id,
            started_at,
            shared,
        }
    }

    pub fn id(&self) -> HotspotId {
        self.id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Whether the dwell period elapsed and the attempt completed
    pub fn is_done(&self) -> bool {
        self.shared.lock().done
    }

    pub fn cancellation(&self) -> Option<Cancellation> {
        self.shared.lock().cancelled
    }

    /// Stop the attempt and record its progress. Only the first call is recorded.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        if state.cancelled.is_none() {
            let now = Instant::now();
            state.cancelled = Some(Cancellation {
                at: now,
                progress: now.saturating_duration_since(self.started_at),
            });
        }
        self.shared.cancel.notify_one();
    }
}

/// Handed to the activated callback once the dwell time has elapsed.
///
/// The attempt is not done until [`Completion::finish`] is called, which lets the receiver
/// take its own locks first and keeps lock ordering one-directional.
#[derive(Debug)]
pub struct Completion {
    id: HotspotId,
    shared: Arc<Shared>,
}

impl Completion {
    pub fn id(&self) -> HotspotId {
        self.id
    }

    /// Mark the attempt done. Returns `false` if it was cancelled in the meantime.
    pub fn finish(self) -> bool {
        let mut state = self.shared.lock();
        if state.cancelled.is_some() {
            return false;
        }
        state.done = true;
        true
    }
}

async fn run_attempt(
    id: HotspotId,
    wait: Duration,
    shared: Arc<Shared>,
    on_activating: Arc<ActivatingFn>,
    on_activated: Arc<ActivatedFn>,
) {
    {
        let state = shared.lock();
        if state.cancelled.is_some() {
            return;
        }
        on_activating(id);
    }

    if !wait.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shared.cancel.notified() => return,
        }
    }

    if shared.lock().cancelled.is_some() {
        return;
    }

    on_activated(Completion { id, shared });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Fired {
        Activating(HotspotId),
        Activated(HotspotId),
    }

    type Log = Arc<Mutex<Vec<Fired>>>;

    fn recording_context(activation_ms: u64) -> (AttemptContext, Log) {
        let log: Log = Arc::default();
        let activating_log = Arc::clone(&log);
        let activated_log = Arc::clone(&log);
        let ctx = AttemptContext::new(
            Duration::from_millis(activation_ms),
            Handle::current(),
            move |id| activating_log.lock().unwrap().push(Fired::Activating(id)),
            move |completion| {
                let id = completion.id();
                if completion.finish() {
                    activated_log.lock().unwrap().push(Fired::Activated(id));
                }
            },
        );
        (ctx, log)
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn fired(log: &Log) -> Vec<Fired> {
        log.lock().unwrap().clone()
    }

    // ==================== Fresh Attempts ====================

    #[tokio::test(start_paused = true)]
    async fn test_fresh_attempt_activates_after_dwell() {
        let (ctx, log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(1), &ctx);

        sleep(ms(10)).await;
        assert_eq!(fired(&log), vec![Fired::Activating(HotspotId(1))]);
        assert!(!attempt.is_done());

        sleep(ms(980)).await;
        assert!(!attempt.is_done());

        sleep(ms(20)).await;
        assert!(attempt.is_done());
        assert_eq!(
            fired(&log),
            vec![
                Fired::Activating(HotspotId(1)),
                Fired::Activated(HotspotId(1)),
            ]
        );
        assert!(attempt.cancellation().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait_prevents_completion() {
        let (ctx, log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(3), &ctx);

        sleep(ms(400)).await;
        attempt.cancel();
        let cancellation = attempt.cancellation().unwrap();
        assert_eq!(cancellation.progress.as_millis(), 400);

        sleep(ms(2000)).await;
        assert!(!attempt.is_done());
        assert_eq!(fired(&log), vec![Fired::Activating(HotspotId(3))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_skips_activating() {
        let (ctx, log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(3), &ctx);

        // The background task has not been polled yet
        attempt.cancel();

        sleep(ms(2000)).await;
        assert!(fired(&log).is_empty());
        assert_eq!(attempt.cancellation().unwrap().progress, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_recorded_once() {
        let (ctx, _log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(1), &ctx);

        sleep(ms(200)).await;
        attempt.cancel();
        let first = attempt.cancellation().unwrap();

        sleep(ms(300)).await;
        attempt.cancel();
        assert_eq!(attempt.cancellation().unwrap(), first);
    }

    // ==================== Resumed Attempts ====================

    #[tokio::test(start_paused = true)]
    async fn test_resume_immediately_keeps_progress() {
        let (ctx, log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(5), &ctx);

        sleep(ms(400)).await;
        attempt.cancel();
        let resumed = ActivationAttempt::resume(attempt, &ctx);
        assert_eq!(resumed.id(), HotspotId(5));

        sleep(ms(580)).await;
        assert!(!resumed.is_done());

        sleep(ms(40)).await;
        assert!(resumed.is_done());
        assert_eq!(
            fired(&log),
            vec![
                Fired::Activating(HotspotId(5)),
                Fired::Activating(HotspotId(5)),
                Fired::Activated(HotspotId(5)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_partial_decay() {
        let (ctx, _log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(5), &ctx);

        sleep(ms(600)).await;
        attempt.cancel();
        sleep(ms(200)).await;

        // 400ms of progress left, so 600ms to go
        let resumed = ActivationAttempt::resume(attempt, &ctx);
        sleep(ms(580)).await;
        assert!(!resumed.is_done());

        sleep(ms(40)).await;
        assert!(resumed.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_full_decay_restarts() {
        let (ctx, _log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(5), &ctx);

        sleep(ms(400)).await;
        attempt.cancel();
        sleep(ms(5000)).await;

        let resumed = ActivationAttempt::resume(attempt, &ctx);
        sleep(ms(980)).await;
        assert!(!resumed.is_done());

        sleep(ms(40)).await;
        assert!(resumed.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_of_completed_attempt_starts_over() {
        let (ctx, log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(9), &ctx);

        sleep(ms(1020)).await;
        assert!(attempt.is_done());

        // Cancel arriving just after completion
        attempt.cancel();
        assert!(attempt.cancellation().is_some());
        assert!(attempt.is_done());

        let resumed = ActivationAttempt::resume(attempt, &ctx);
        sleep(ms(980)).await;
        assert!(!resumed.is_done());

        sleep(ms(40)).await;
        assert!(resumed.is_done());
        let activated = fired(&log)
            .into_iter()
            .filter(|f| matches!(f, Fired::Activated(_)))
            .count();
        assert_eq!(activated, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_dwell_elapsed_refuses_completion() {
        let pending: Arc<Mutex<Option<Completion>>> = Arc::default();
        let slot = Arc::clone(&pending);
        let ctx = AttemptContext::new(
            ms(100),
            Handle::current(),
            |_| {},
            move |completion| *slot.lock().unwrap() = Some(completion),
        );
        let attempt = ActivationAttempt::new(HotspotId(6), &ctx);

        // The timer fired but the receiver has not finished the completion yet
        sleep(ms(150)).await;
        let completion = pending.lock().unwrap().take().unwrap();
        attempt.cancel();

        assert!(!completion.finish());
        assert!(!attempt.is_done());
        assert!(attempt.cancellation().unwrap().progress >= ms(100));

        // The whole dwell was already served, so the resumed attempt fires at once
        let (resume_ctx, log) = recording_context(100);
        let resumed = ActivationAttempt::resume(attempt, &resume_ctx);
        sleep(ms(1)).await;

        assert!(resumed.is_done());
        assert_eq!(
            fired(&log),
            vec![
                Fired::Activating(HotspotId(6)),
                Fired::Activated(HotspotId(6)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_enough_progress_fires_immediately() {
        let (slow_ctx, _) = recording_context(2000);
        let (ctx, log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(2), &slow_ctx);

        sleep(ms(1500)).await;
        attempt.cancel();

        let resumed = ActivationAttempt::resume(attempt, &ctx);
        sleep(ms(1)).await;

        assert!(resumed.is_done());
        assert_eq!(
            fired(&log),
            vec![
                Fired::Activating(HotspotId(2)),
                Fired::Activated(HotspotId(2)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_attempt_carries_lineage_progress() {
        let (ctx, _log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(4), &ctx);

        sleep(ms(300)).await;
        attempt.cancel();
        let resumed = ActivationAttempt::resume(attempt, &ctx);

        sleep(ms(200)).await;
        resumed.cancel();
        assert_eq!(resumed.cancellation().unwrap().progress.as_millis(), 500);
    }

    #[tokio::test]
    #[should_panic(expected = "never cancelled")]
    async fn test_resume_requires_cancelled_attempt() {
        let (ctx, _log) = recording_context(1000);
        let attempt = ActivationAttempt::new(HotspotId(1), &ctx);
        let _ = ActivationAttempt::resume(attempt, &ctx);
    }

    #[test]
    fn test_remaining_progress_decays_to_zero() {
        let at = Instant::now();
        let cancellation = Cancellation {
            at,
            progress: ms(300),
        };
        assert_eq!(cancellation.remaining_progress(at), ms(300));
        assert_eq!(cancellation.remaining_progress(at + ms(100)), ms(200));
        assert_eq!(cancellation.remaining_progress(at + ms(300)), Duration::ZERO);
        assert_eq!(cancellation.remaining_progress(at + ms(900)), Duration::ZERO);
    }
}
