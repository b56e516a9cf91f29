//! Behavior event batcher.
//!
//! Collects behavior events into an in-memory queue and delivers them to the
//! activity API in batches, either when the queue reaches `batch_size` or on
//! the periodic flush timer.
//!
//! Delivery is best-effort: a flush takes the whole queue before the first
//! network call, and events that fail are logged and dropped. Events tracked
//! while a flush is in flight land in the fresh queue.

use crate::auth::AuthContext;
use crate::client::ActivityClient;
use crate::config::{ConfigError, TrackerConfig};
use crate::core::scheduler::{Scheduler, TimerId, TimerMode, TimerTask};
use crate::core::throttle::Throttle;
use crate::event::{is_safe_key, BehaviorEvent, BehaviorEventType, InputEvent, InputKind};
use crate::source::{InputHandler, InputSource, LocationProvider, SubscriptionId};
use crate::transparency::{SharedTrackerStats, StatsSnapshot, TrackerStats};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Collaborators injected into an [`EventBatcher`].
#[derive(Clone)]
pub struct BatcherDeps {
    pub client: Arc<dyn ActivityClient>,
    pub auth: Arc<dyn AuthContext>,
    pub source: Arc<dyn InputSource>,
    pub location: Arc<dyn LocationProvider>,
    pub scheduler: Arc<dyn Scheduler>,
}

/// What caused a page view.
#[derive(Debug, Clone, Copy)]
enum PageViewTrigger {
    Mount,
    Manual,
    Navigation,
}

impl PageViewTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            PageViewTrigger::Mount => "mount",
            PageViewTrigger::Manual => "manual",
            PageViewTrigger::Navigation => "navigation",
        }
    }
}

/// Batches behavior events and flushes them to an [`ActivityClient`].
///
/// Creating a batcher subscribes its listeners, starts the flush timer and
/// enqueues one page view for the current location. Dropping it (or calling
/// [`shutdown`](Self::shutdown)) cancels timers and removes listeners.
pub struct EventBatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: TrackerConfig,
    deps: BatcherDeps,
    queue: Mutex<VecDeque<BehaviorEvent>>,
    throttle: Mutex<Throttle>,
    stats: SharedTrackerStats,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    interval_timer: Mutex<Option<TimerId>>,
    /// Pending threshold flush; at most one is outstanding.
    flush_timer: Mutex<Option<TimerId>>,
    /// Serializes flushes; a flush waits for the one in flight to finish.
    flushing: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    this: Weak<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventBatcher {
    /// Create a batcher and start tracking.
    pub fn new(config: TrackerConfig, deps: BatcherDeps) -> Result<Self, ConfigError> {
        config.validate()?;

        let inner = Arc::new_cyclic(|this| Inner {
            throttle: Mutex::new(Throttle::new(config.throttle)),
            queue: Mutex::new(VecDeque::with_capacity(config.batch_size)),
            config,
            deps,
            stats: Arc::new(TrackerStats::new()),
            subscriptions: Mutex::new(Vec::new()),
            interval_timer: Mutex::new(None),
            flush_timer: Mutex::new(None),
            flushing: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            this: this.clone(),
        });

        inner.subscribe_listeners();
        inner.start_interval_timer();
        inner.track_page_view(None, PageViewTrigger::Mount);

        tracing::debug!(
            batch_size = inner.config.batch_size,
            flush_interval_ms = inner.config.flush_interval.as_millis() as u64,
            throttle_ms = inner.config.throttle.as_millis() as u64,
            "Event batcher started"
        );

        Ok(Self { inner })
    }

    /// Enqueue a page view for `page`, or the current location if `None`.
    pub fn track_page_view(&self, page: Option<&str>) {
        self.inner.track_page_view(page, PageViewTrigger::Manual);
    }

    /// Deliver every queued event. Never fails; see the module docs.
    ///
    /// If a timer-driven flush is already sending, this waits for it to
    /// finish first, so on return every event queued before the call has
    /// been attempted.
    pub async fn flush_events(&self) {
        self.inner.flush().await;
    }

    /// Number of events waiting to be flushed.
    pub fn queue_len(&self) -> usize {
        self.inner.queue_len()
    }

    /// Copy of the queued events, oldest first.
    pub fn pending_events(&self) -> Vec<BehaviorEvent> {
        lock(&self.inner.queue).iter().cloned().collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Shared handle to the live counters.
    pub fn stats_handle(&self) -> SharedTrackerStats {
        self.inner.stats.clone()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Stop tracking: cancel timers and remove listeners.
    ///
    /// A flush already sending runs to completion. Queued events are kept
    /// and can still be flushed. Later tracking calls
    /// are ignored. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Drop for EventBatcher {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl Inner {
    fn subscribe_listeners(&self) {
        let toggles = self.config.toggles;
        let kinds = [
            (toggles.clicks, InputKind::Click),
            (toggles.mouse_movement, InputKind::MouseMove),
            (toggles.scrolling, InputKind::Scroll),
            (toggles.keyboard, InputKind::KeyDown),
            (toggles.page_views, InputKind::Navigation),
        ];

        let mut subscriptions = lock(&self.subscriptions);
        for (_, kind) in kinds.into_iter().filter(|(enabled, _)| *enabled) {
            let weak = self.this.clone();
            let handler: InputHandler = Arc::new(move |event: &InputEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_input(event);
                }
            });
            subscriptions.push(self.deps.source.subscribe(kind, handler));
        }
    }

    fn start_interval_timer(&self) {
        if self.config.flush_interval.is_zero() {
            return;
        }

        let weak = self.this.clone();
        let task: TimerTask = Arc::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    if inner.queue_len() > 0 {
                        inner.flush().await;
                    }
                }
            }
            .boxed()
        });

        let id = self
            .deps
            .scheduler
            .set_timer(self.config.flush_interval, TimerMode::Repeating, task);
        *lock(&self.interval_timer) = Some(id);
    }

    fn handle_input(&self, event: &InputEvent) {
        let toggles = &self.config.toggles;
        match event {
            InputEvent::Click(target) if toggles.clicks => {
                self.track(BehaviorEventType::Click, target.to_metadata());
            }
            InputEvent::MouseMove { x, y } if toggles.mouse_movement => {
                let mut metadata = Map::new();
                metadata.insert("x".to_string(), Value::from(*x));
                metadata.insert("y".to_string(), Value::from(*y));
                self.track(BehaviorEventType::MouseMove, metadata);
            }
            InputEvent::Scroll { scroll_x, scroll_y } if toggles.scrolling => {
                let mut metadata = Map::new();
                metadata.insert("scroll_x".to_string(), Value::from(*scroll_x));
                metadata.insert("scroll_y".to_string(), Value::from(*scroll_y));
                self.track(BehaviorEventType::Scroll, metadata);
            }
            InputEvent::KeyDown { key } if toggles.keyboard => {
                if is_safe_key(key) {
                    let mut metadata = Map::new();
                    metadata.insert("key".to_string(), Value::from(key.as_str()));
                    self.track(BehaviorEventType::Key, metadata);
                } else {
                    self.stats.record_filtered();
                }
            }
            InputEvent::Navigation { path } if toggles.page_views => {
                self.track_page_view(Some(path.as_str()), PageViewTrigger::Navigation);
            }
            _ => {}
        }
    }

    fn track_page_view(&self, page: Option<&str>, trigger: PageViewTrigger) {
        let page = match page {
            Some(page) => page.to_string(),
            None => self.deps.location.current_location(),
        };

        let mut metadata = Map::new();
        metadata.insert("trigger".to_string(), Value::from(trigger.as_str()));

        let event = BehaviorEvent::new(
            BehaviorEventType::PageView,
            self.deps.scheduler.now_ms(),
            page,
            metadata,
        );
        self.enqueue(event);
    }

    /// Track an input-driven event, throttling high-frequency types.
    fn track(&self, event_type: BehaviorEventType, metadata: Map<String, Value>) {
        let now = self.deps.scheduler.now_ms();
        if event_type.is_high_frequency() && !lock(&self.throttle).try_accept(event_type, now) {
            self.stats.record_throttled();
            return;
        }

        let event = BehaviorEvent::new(
            event_type,
            now,
            self.deps.location.current_location(),
            metadata,
        );
        self.enqueue(event);
    }

    fn enqueue(&self, event: BehaviorEvent) {
        if self.closed.load(Ordering::Acquire) {
            tracing::trace!(action = event.action(), "Batcher shut down, event ignored");
            return;
        }

        let len = {
            let mut queue = lock(&self.queue);
            if queue.len() >= self.config.max_pending {
                queue.pop_front();
                self.stats.record_evicted();
                tracing::debug!(
                    max_pending = self.config.max_pending,
                    "Queue at capacity, evicted oldest event"
                );
            }
            queue.push_back(event);
            queue.len()
        };
        self.stats.record_tracked();

        if len >= self.config.batch_size {
            self.schedule_flush();
        }
    }

    /// Schedule an asynchronous flush unless one is already pending.
    fn schedule_flush(&self) {
        let mut flush_timer = lock(&self.flush_timer);
        if flush_timer.is_some() {
            return;
        }

        let weak = self.this.clone();
        let task: TimerTask = Arc::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner.flush_timer).take();
                    inner.flush().await;
                }
            }
            .boxed()
        });

        *flush_timer = Some(
            self.deps
                .scheduler
                .set_timer(Duration::ZERO, TimerMode::Once, task),
        );
    }

    async fn flush(&self) {
        let _flushing = self.flushing.lock().await;

        let Some(user) = self.deps.auth.current_user() else {
            let pending = self.queue_len();
            if pending > 0 {
                tracing::debug!(pending, "No signed-in user, skipping flush");
            }
            return;
        };

        // Take the queue before the first await.
        let batch: Vec<BehaviorEvent> = std::mem::take(&mut *lock(&self.queue)).into();
        if batch.is_empty() {
            return;
        }

        self.stats.record_flush();
        let total = batch.len();
        let mut failed = 0usize;

        for event in &batch {
            let result = self
                .deps
                .client
                .track_activity(
                    &user.id,
                    event.action(),
                    event.page(),
                    &event.delivery_metadata(),
                )
                .await;

            match result {
                Ok(()) => self.stats.record_delivered(),
                Err(e) => {
                    failed += 1;
                    self.stats.record_failed();
                    tracing::debug!(action = event.action(), error = %e, "Failed to deliver event");
                }
            }
        }

        if failed > 0 {
            tracing::warn!(failed, total, "Dropped behavior events after delivery failure");
        } else {
            tracing::debug!(total, "Flushed behavior events");
        }
    }

    fn queue_len(&self) -> usize {
        lock(&self.queue).len()
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let interval_timer = lock(&self.interval_timer).take();
        let flush_timer = lock(&self.flush_timer).take();
        for id in interval_timer.into_iter().chain(flush_timer) {
            self.deps.scheduler.cancel_timer(id);
        }

        let subscriptions = std::mem::take(&mut *lock(&self.subscriptions));
        for id in subscriptions {
            self.deps.source.unsubscribe(id);
        }

        tracing::debug!(pending = self.queue_len(), "Event batcher shut down");
    }
}
