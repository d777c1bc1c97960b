//! Background refresh loop and stale-response guard.
//!
//! A surface that needs live data (admin order list, order tracker) spawns a
//! poller that calls its refresh closure on a fixed interval. The loop awaits
//! each refresh before waiting for the next tick and skips ticks missed in
//! the meantime, so a slow endpoint never accumulates parallel requests.
//! Cancelling the handle (explicitly, or by dropping it) also aborts a
//! refresh that is still in flight.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Returned by a refresh to keep or end the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

pub struct PollerHandle {
    name: &'static str,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!(poller = self.name, "poller cancel requested");
            self.token.cancel();
        }
    }

    /// True once the loop has exited (cancelled or stopped by its refresh).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }

    /// Wait for the loop to exit without cancelling it.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawn a refresh loop on the current tokio runtime. The first refresh runs
/// one `interval` after spawning; callers load initial data themselves.
pub fn spawn_poller<F, Fut>(name: &'static str, interval: Duration, mut refresh: F) -> PollerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = PollControl> + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let task = tokio::spawn(async move {
        info!(poller = name, interval_ms = interval.as_millis() as u64, "poller started");
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let control = tokio::select! {
                _ = cancelled.cancelled() => break,
                control = refresh() => control,
            };
            if control == PollControl::Stop {
                break;
            }
        }
        info!(poller = name, "poller stopped");
    });

    PollerHandle {
        name,
        token,
        task: Some(task),
    }
}

/// Monotonic request generations.
///
/// Take a generation before sending a request and apply the response only
/// if [`RequestGeneration::is_current`] still holds, so a slow response to
/// an older request never overwrites the result of a newer one.
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration(Arc<AtomicU64>);

impl RequestGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.0.load(Ordering::SeqCst) == generation
    }

    /// Make every outstanding generation stale (logout, reset).
    pub fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn refresh_can_stop_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = spawn_poller("test", Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 3 {
                    PollControl::Stop
                } else {
                    PollControl::Continue
                }
            }
        });

        time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("poller should stop itself");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stop_cancels_future_ticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = spawn_poller("test", Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                PollControl::Continue
            }
        });

        time::sleep(Duration::from_millis(40)).await;
        handle.stop();
        time::sleep(Duration::from_millis(20)).await;
        assert!(handle.is_finished());
        let after_stop = calls.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(40)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn slow_refresh_never_overlaps() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (a, b) = (in_flight.clone(), max_seen.clone());
        let handle = spawn_poller("test", Duration::from_millis(2), move || {
            let (a, b) = (a.clone(), b.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                b.fetch_max(now, Ordering::SeqCst);
                time::sleep(Duration::from_millis(15)).await;
                a.fetch_sub(1, Ordering::SeqCst);
                PollControl::Continue
            }
        });

        time::sleep(Duration::from_millis(80)).await;
        drop(handle);
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn newer_generation_supersedes_older() {
        let generation = RequestGeneration::new();
        let first = generation.begin();
        let second = generation.begin();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));

        generation.invalidate();
        assert!(!generation.is_current(second));
    }
}
