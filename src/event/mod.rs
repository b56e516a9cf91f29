//! Event types for the behavior tracker.
//!
//! Input events arrive from an [`InputSource`](crate::source::InputSource);
//! behavior events are what the batcher queues and delivers.

pub mod types;

// Re-export commonly used types
pub use types::{
    is_safe_key, BehaviorEvent, BehaviorEventType, ClickTarget, InputEvent, InputKind,
    MAX_CLICK_TEXT_CHARS, SAFE_KEYS,
};
