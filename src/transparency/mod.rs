//! Transparency module for the behavior tracker.
//!
//! Exposes counts of what the tracker collected and delivered, so hosts can
//! show users what is being sent.

pub mod log;

// Re-export commonly used types
pub use log::{SharedTrackerStats, StatsSnapshot, TrackerStats};
