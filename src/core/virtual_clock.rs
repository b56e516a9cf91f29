//! Manually advanced scheduler for tests and simulations.

use super::scheduler::{duration_ms, Scheduler, TimerId, TimerMode, TimerTask, MIN_PERIOD};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

struct VirtualTimer {
    due_ms: i64,
    period_ms: Option<i64>,
    task: TimerTask,
}

struct VirtualState {
    now_ms: i64,
    next_id: TimerId,
    timers: BTreeMap<TimerId, VirtualTimer>,
}

/// A scheduler whose clock only moves when [`advance`](Self::advance) is called.
///
/// Due timers run in order of due time, then creation order. Timers created
/// while advancing run in the same call if they fall due before its end.
pub struct VirtualScheduler {
    state: Mutex<VirtualState>,
}

impl VirtualScheduler {
    /// Create a virtual clock starting at `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            state: Mutex::new(VirtualState {
                now_ms: start_ms,
                next_id: 1,
                timers: BTreeMap::new(),
            }),
        }
    }

    /// Move the clock forward by `by`, running every timer that falls due.
    pub async fn advance(&self, by: Duration) {
        let target = {
            let state = self.lock();
            state.now_ms.saturating_add(duration_ms(by))
        };

        while let Some(task) = self.take_due(target) {
            task().await;
        }

        let mut state = self.lock();
        if state.now_ms < target {
            state.now_ms = target;
        }
    }

    /// Run timers already due (zero-delay timers included) without moving the clock.
    pub async fn run_until_idle(&self) {
        self.advance(Duration::ZERO).await;
    }

    /// Number of timers still scheduled.
    pub fn pending_timers(&self) -> usize {
        self.lock().timers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the earliest timer due at or before `target`, rescheduling repeats.
    fn take_due(&self, target: i64) -> Option<TimerTask> {
        let mut state = self.lock();
        let (id, due_ms) = state
            .timers
            .iter()
            .filter(|(_, t)| t.due_ms <= target)
            .min_by_key(|(id, t)| (t.due_ms, **id))
            .map(|(id, t)| (*id, t.due_ms))?;

        state.now_ms = state.now_ms.max(due_ms);
        let timer = state.timers.get_mut(&id)?;
        let task = timer.task.clone();
        // A repeating timer whose next due time overflows never fires again.
        match timer.period_ms.and_then(|period| timer.due_ms.checked_add(period)) {
            Some(next_due) => timer.due_ms = next_due,
            None => {
                state.timers.remove(&id);
            }
        }
        Some(task)
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Scheduler for VirtualScheduler {
    fn now_ms(&self) -> i64 {
        self.lock().now_ms
    }

    fn set_timer(&self, delay: Duration, mode: TimerMode, task: TimerTask) -> TimerId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;

        let delay_ms = duration_ms(delay);
        let period_ms = match mode {
            TimerMode::Once => None,
            TimerMode::Repeating => Some(delay_ms.max(duration_ms(MIN_PERIOD))),
        };
        let due_ms = state.now_ms.saturating_add(period_ms.unwrap_or(delay_ms));
        state.timers.insert(
            id,
            VirtualTimer {
                due_ms,
                period_ms,
                task,
            },
        );
        id
    }

    fn cancel_timer(&self, id: TimerId) {
        self.lock().timers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn recording_task(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> TimerTask {
        Arc::new(move || {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name);
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_timers_fire_in_due_order() {
        let clock = VirtualScheduler::new(1_000);
        let log = Arc::new(Mutex::new(Vec::new()));

        let late = recording_task(log.clone(), "late");
        let early = recording_task(log.clone(), "early");
        clock.set_timer(Duration::from_millis(30), TimerMode::Once, late);
        clock.set_timer(Duration::from_millis(10), TimerMode::Once, early);
        clock.set_timer(Duration::ZERO, TimerMode::Once, recording_task(log.clone(), "now"));

        clock.run_until_idle().await;
        assert_eq!(*log.lock().unwrap(), vec!["now"]);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance(Duration::from_millis(50)).await;
        assert_eq!(*log.lock().unwrap(), vec!["now", "early", "late"]);
        assert_eq!(clock.now_ms(), 1_050);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_repeating_timer() {
        let clock = VirtualScheduler::default();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let id = clock.set_timer(
            Duration::from_millis(100),
            TimerMode::Repeating,
            Arc::new(move || {
                let f = f.clone();
                async move {
                    f.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            }),
        );

        clock.advance(Duration::from_millis(450)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 4);

        clock.cancel_timer(id);
        clock.advance(Duration::from_millis(1_000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_huge_durations_saturate() {
        let clock = VirtualScheduler::new(1_000);
        let log = Arc::new(Mutex::new(Vec::new()));
        let forever = recording_task(log.clone(), "forever");
        let repeat = recording_task(log.clone(), "repeat");
        clock.set_timer(Duration::MAX, TimerMode::Once, forever);
        clock.set_timer(Duration::from_secs(u64::MAX / 2), TimerMode::Repeating, repeat);

        clock.advance(Duration::from_secs(3600)).await;
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(clock.now_ms(), 1_000 + 3_600_000);

        clock.advance(Duration::MAX).await;
        assert_eq!(*log.lock().unwrap(), vec!["forever", "repeat"]);
        assert_eq!(clock.now_ms(), i64::MAX);
        assert_eq!(clock.pending_timers(), 0);
    }
}
