//! Demonstration of the behavior tracker event pipeline.
//!
//! This example shows how to:
//! 1. Wire a batcher to an input source, auth context and scheduler
//! 2. Dispatch clicks, keys, scrolls and navigation
//! 3. Watch throttling and key filtering drop events
//! 4. Flush batches to an activity client
//!
//! Run with: cargo run --example track_demo
//!
//! Set RUST_LOG=behavior_tracker=debug to see each delivered activity.

use std::sync::Arc;
use std::time::Duration;

use behavior_tracker::{
    BatcherDeps, ClickTarget, EventBatcher, InputEvent, LogActivityClient, ManualSource,
    SessionAuth, StaticLocation, TokioScheduler, TrackerConfig, TrackingToggles, UserIdentity,
    PRIVACY_DECLARATION,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("behavior_tracker=info")),
        )
        .init();

    println!("Behavior Tracker - Demo");
    println!("=======================");
    println!();
    println!("{PRIVACY_DECLARATION}");

    let source = Arc::new(ManualSource::new());
    let location = Arc::new(StaticLocation::new("/"));
    let client = Arc::new(LogActivityClient::new());

    let Some(scheduler) = TokioScheduler::current() else {
        eprintln!("Demo must run inside a tokio runtime");
        return;
    };

    let config = TrackerConfig {
        batch_size: 5,
        flush_interval: Duration::from_secs(2),
        throttle: Duration::from_millis(100),
        toggles: TrackingToggles::all(),
        ..TrackerConfig::default()
    };

    let batcher = match EventBatcher::new(
        config,
        BatcherDeps {
            client: client.clone(),
            auth: Arc::new(SessionAuth::signed_in(UserIdentity::new("demo-user"))),
            source: source.clone(),
            location: location.clone(),
            scheduler: Arc::new(scheduler),
        },
    ) {
        Ok(batcher) => batcher,
        Err(e) => {
            eprintln!("Error creating batcher: {e}");
            return;
        }
    };

    println!("Queued after mount: {}", batcher.queue_len());

    // Navigate and interact
    location.set("/products?sort=price");
    source.dispatch(&InputEvent::navigation("/products?sort=price"));
    source.dispatch(&InputEvent::Click(
        ClickTarget::new("BUTTON")
            .with_id("add-to-cart")
            .with_text("Add to cart"),
    ));

    // Only allow-listed keys are kept
    for key in ["h", "u", "n", "t", "e", "r", "2", "Enter"] {
        source.dispatch(&InputEvent::key(key));
    }

    // A burst of mouse movement collapses to one event per throttle window
    for i in 0..50 {
        source.dispatch(&InputEvent::MouseMove {
            x: i as f64,
            y: (i * 2) as f64,
        });
    }

    println!("Queued after interaction: {}", batcher.queue_len());
    println!("Waiting for the flush timer...");
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    batcher.track_page_view(Some("/checkout"));
    batcher.flush_events().await;
    batcher.shutdown();

    println!();
    println!("Activities delivered to the log client: {}", client.logged());
    println!();
    println!("{}", batcher.stats_handle().summary());
}
