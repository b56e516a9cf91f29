//! Timer scheduling for the batcher.
//!
//! The batcher owns no timers itself; it asks a [`Scheduler`] for them so
//! tests can run on a [`VirtualScheduler`](super::VirtualScheduler) instead of
//! wall-clock time.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Identifier returned by [`Scheduler::set_timer`].
pub type TimerId = u64;

/// Work run each time a timer fires.
pub type TimerTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Whether a timer fires once or repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Once,
    Repeating,
}

/// Clock and timer capability.
pub trait Scheduler: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    /// Run `task` after `delay`, and then every `delay` for repeating timers.
    fn set_timer(&self, delay: Duration, mode: TimerMode, task: TimerTask) -> TimerId;

    /// Cancel a timer. Unknown or finished ids are ignored.
    ///
    /// A run already in progress is left to complete; only later runs are
    /// prevented.
    fn cancel_timer(&self, id: TimerId);
}

/// Smallest period for repeating timers.
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Whole milliseconds in `duration`, saturating at `i64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Scheduler backed by the tokio runtime and the system clock.
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
    timers: Arc<Mutex<HashMap<TimerId, JoinHandle<()>>>>,
    next_id: AtomicU64,
}

impl TokioScheduler {
    /// Create a scheduler that spawns onto `handle`.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a scheduler on the current runtime, if there is one.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }

    /// Number of timers that have not finished or been cancelled.
    pub fn active_timers(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Scheduler for TokioScheduler {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn set_timer(&self, delay: Duration, mode: TimerMode, task: TimerTask) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = self.timers.clone();

        // Each run is spawned as its own task and awaited, so aborting the
        // timer loop stops future runs but never interrupts one in progress.
        // Hold the lock across spawn so a once-timer cannot remove its entry
        // before it has been inserted.
        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let join = self.handle.spawn(async move {
            match mode {
                TimerMode::Once => {
                    tokio::time::sleep(delay).await;
                    let _ = tokio::spawn(task()).await;
                    timers
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&id);
                }
                TimerMode::Repeating => {
                    let period = delay.max(MIN_PERIOD);
                    let mut interval =
                        tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    loop {
                        interval.tick().await;
                        let _ = tokio::spawn(task()).await;
                    }
                }
            }
        });
        guard.insert(id, join);
        id
    }

    fn cancel_timer(&self, id: TimerId) {
        let removed = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(join) = removed {
            join.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let timers = std::mem::take(&mut *guard);
        drop(guard);
        for (_, join) in timers {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: Arc<AtomicUsize>) -> TimerTask {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_timer_fires_and_clears() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.set_timer(
            Duration::from_millis(50),
            TimerMode::Once,
            counting_task(fired.clone()),
        );
        assert_eq!(scheduler.active_timers(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_timer_and_cancel() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let id = scheduler.set_timer(
            Duration::from_millis(100),
            TimerMode::Repeating,
            counting_task(fired.clone()),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);

        scheduler.cancel_timer(id);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_lets_running_task_finish() {
        let scheduler = TokioScheduler::current().unwrap();
        let started = Arc::new(tokio::sync::Notify::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let task: TimerTask = {
            let started = started.clone();
            let finished = finished.clone();
            Arc::new(move || {
                let started = started.clone();
                let finished = finished.clone();
                async move {
                    started.notify_one();
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            })
        };
        let id = scheduler.set_timer(Duration::from_millis(10), TimerMode::Repeating, task);

        started.notified().await;
        scheduler.cancel_timer(id);
        assert_eq!(scheduler.active_timers(), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
