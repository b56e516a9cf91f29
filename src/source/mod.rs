//! Input source capabilities for the behavior tracker.
//!
//! The batcher never touches a concrete event loop or window. It subscribes
//! to an [`InputSource`] and asks a [`LocationProvider`] for the current page.

pub mod manual;

use crate::event::{InputEvent, InputKind};
use std::sync::Arc;

pub use manual::{ManualSource, StaticLocation};

/// Identifier returned by [`InputSource::subscribe`].
pub type SubscriptionId = u64;

/// Callback invoked for each dispatched input event.
pub type InputHandler = Arc<dyn Fn(&InputEvent) + Send + Sync>;

/// A source of input events that listeners can subscribe to.
pub trait InputSource: Send + Sync {
    /// Register a handler for one kind of input.
    fn subscribe(&self, kind: InputKind, handler: InputHandler) -> SubscriptionId;

    /// Remove a handler. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Supplies the current navigation location (path + query).
pub trait LocationProvider: Send + Sync {
    fn current_location(&self) -> String;
}
