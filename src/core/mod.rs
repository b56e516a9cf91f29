//! Core functionality for the behavior tracker.
//!
//! This module contains:
//! - The event batcher (queueing, throttling, flushing)
//! - Per-type throttling for high-frequency events
//! - Scheduler capabilities backed by tokio or a virtual clock

pub mod batcher;
pub mod scheduler;
pub mod throttle;
pub mod virtual_clock;

// Re-export commonly used types
pub use batcher::{BatcherDeps, EventBatcher};
pub use scheduler::{Scheduler, TimerId, TimerMode, TimerTask, TokioScheduler};
pub use throttle::Throttle;
pub use virtual_clock::VirtualScheduler;
