//! In-process input source driven by explicit dispatch calls.
//!
//! Used by the CLI (events read from stdin), the demo, and tests.

use crate::event::{InputEvent, InputKind};
use crate::source::{InputHandler, InputSource, LocationProvider, SubscriptionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

/// An input source that forwards events passed to [`ManualSource::dispatch`].
pub struct ManualSource {
    handlers: Mutex<Vec<(SubscriptionId, InputKind, InputHandler)>>,
    next_id: AtomicU64,
}

impl ManualSource {
    /// Create a new source with no subscribers.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Deliver an event synchronously to every handler subscribed to its kind.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &InputEvent) -> usize {
        let kind = event.kind();
        // Handlers run outside the lock so they may subscribe or unsubscribe.
        let matching: Vec<InputHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| h.clone())
            .collect();

        for handler in &matching {
            handler(event);
        }
        matching.len()
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for ManualSource {
    fn subscribe(&self, kind: InputKind, handler: InputHandler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, kind, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(sub_id, _, _)| *sub_id != id);
    }
}

/// A location provider holding a settable path.
#[derive(Debug)]
pub struct StaticLocation {
    location: RwLock<String>,
}

impl StaticLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: RwLock::new(location.into()),
        }
    }

    /// Replace the current location.
    pub fn set(&self, location: impl Into<String>) {
        *self
            .location
            .write()
            .unwrap_or_else(PoisonError::into_inner) = location.into();
    }
}

impl Default for StaticLocation {
    fn default() -> Self {
        Self::new("/")
    }
}

impl LocationProvider for StaticLocation {
    fn current_location(&self) -> String {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_dispatch_by_kind() {
        let source = ManualSource::new();
        let clicks = Arc::new(AtomicUsize::new(0));
        let c = clicks.clone();
        source.subscribe(
            InputKind::Click,
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(
            source.dispatch(&InputEvent::Click(crate::event::ClickTarget::new("a"))),
            1
        );
        assert_eq!(source.dispatch(&InputEvent::key("Enter")), 0);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let source = ManualSource::new();
        let id = source.subscribe(InputKind::Scroll, Arc::new(|_| {}));
        assert_eq!(source.subscriber_count(), 1);

        source.unsubscribe(id);
        source.unsubscribe(id);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_static_location() {
        let location = StaticLocation::default();
        assert_eq!(location.current_location(), "/");

        location.set("/search?q=rust");
        assert_eq!(location.current_location(), "/search?q=rust");
    }
}
