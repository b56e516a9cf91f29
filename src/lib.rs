//! Behavior Tracker - privacy-aware behavior event batching.
//!
//! This library collects behavior signals (page views, clicks, scrolling,
//! navigation keys, mouse movement) into an in-memory queue and delivers
//! them in batches to an activity-tracking API.
//!
//! # Privacy Guarantees
//!
//! - **No typed content**: only allow-listed navigation keys are recorded
//! - **Opt-in for noisy signals**: mouse movement, scrolling and keyboard are off by default
//! - **Best-effort delivery**: nothing is persisted; failed events are dropped
//! - **Transparency**: all tracking and delivery is counted and can be shown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Behavior Tracker                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │ InputSource │──▶│  Throttle   │──▶│    Queue    │        │
//! │  │ (listeners) │   │ (per type)  │   │ (batching)  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                                             │               │
//! │                        Scheduler ──────────▶│ flush         │
//! │                                             ▼               │
//! │  ┌─────────────┐                     ┌─────────────┐        │
//! │  │Transparency │◀────────────────────│  Activity   │        │
//! │  │   Stats     │                     │   Client    │        │
//! │  └─────────────┘                     └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use behavior_tracker::{
//!     BatcherDeps, EventBatcher, LogActivityClient, ManualSource, SessionAuth, StaticLocation,
//!     TokioScheduler, TrackerConfig, UserIdentity,
//! };
//!
//! # async fn demo() {
//! let deps = BatcherDeps {
//!     client: Arc::new(LogActivityClient::new()),
//!     auth: Arc::new(SessionAuth::signed_in(UserIdentity::new("user-1"))),
//!     source: Arc::new(ManualSource::new()),
//!     location: Arc::new(StaticLocation::new("/")),
//!     scheduler: Arc::new(TokioScheduler::current().expect("inside a tokio runtime")),
//! };
//! let batcher = EventBatcher::new(TrackerConfig::default(), deps).expect("valid config");
//! batcher.track_page_view(Some("/pricing"));
//! batcher.flush_events().await;
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod core;
pub mod event;
pub mod source;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use auth::{AuthContext, SessionAuth, UserIdentity};
pub use client::{ActivityClient, ActivityError, ActivityRecord, ClientConfig, LogActivityClient};
pub use config::{Config, ConfigError, TrackerConfig, TrackingToggles};
pub use core::{BatcherDeps, EventBatcher, Scheduler, TokioScheduler, VirtualScheduler};
pub use event::{BehaviorEvent, BehaviorEventType, ClickTarget, InputEvent, InputKind};
pub use source::{InputSource, LocationProvider, ManualSource, StaticLocation};
pub use transparency::{StatsSnapshot, TrackerStats};

#[cfg(feature = "http")]
pub use client::HttpActivityClient;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             BEHAVIOR TRACKER - PRIVACY DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tracker records how pages are used, to improve them.       ║
║                                                                  ║
║  ✓ WHAT WE CAPTURE:                                              ║
║    • Which pages you visit                                       ║
║    • Which buttons and links you click                           ║
║    • Navigation keys like Enter, Tab and arrows (if enabled)     ║
║    • Scroll position and pointer position (if enabled)           ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Which characters you type (no passwords, messages, etc.)    ║
║    • Form field contents                                         ║
║    • Clipboard or screen contents                                ║
║                                                                  ║
║  Events are held in memory and sent in small batches.            ║
║  Nothing is sent while signed out; failed sends are discarded.   ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER CAPTURE"));
        assert!(PRIVACY_DECLARATION.contains("characters you type"));
    }
}
