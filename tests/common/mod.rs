//! Shared test doubles for batcher integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use behavior_tracker::{
    ActivityClient, ActivityError, BatcherDeps, EventBatcher, ManualSource, SessionAuth,
    StaticLocation, TrackerConfig, UserIdentity, VirtualScheduler,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const START_MS: i64 = 1_700_000_000_000;
pub const USER_ID: &str = "user-42";

/// One call made to an activity client.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub user_id: String,
    pub action: String,
    pub page: String,
    pub metadata: Map<String, Value>,
}

/// Activity client that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<RecordedCall>>,
    fail_next: AtomicUsize,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls fail with a network error.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Every call attempted, failed ones included.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn pages(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.page).collect()
    }
}

#[async_trait]
impl ActivityClient for RecordingClient {
    async fn track_activity(
        &self,
        user_id: &str,
        action: &str,
        page: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), ActivityError> {
        self.calls.lock().unwrap().push(RecordedCall {
            user_id: user_id.to_string(),
            action: action.to_string(),
            page: page.to_string(),
            metadata: metadata.clone(),
        });

        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ActivityError::Network("simulated failure".to_string()));
        }
        Ok(())
    }
}

/// Client whose first call pauses until released, to observe in-flight flushes.
#[derive(Default)]
pub struct GatedClient {
    pub recorder: RecordingClient,
    pub started: Notify,
    pub release: Notify,
    gated: AtomicBool,
}

impl GatedClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityClient for GatedClient {
    async fn track_activity(
        &self,
        user_id: &str,
        action: &str,
        page: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), ActivityError> {
        if !self.gated.swap(true, Ordering::SeqCst) {
            self.started.notify_one();
            self.release.notified().await;
        }
        self.recorder
            .track_activity(user_id, action, page, metadata)
            .await
    }
}

/// A batcher wired to test doubles on a virtual clock.
pub struct Harness<C> {
    pub source: Arc<ManualSource>,
    pub clock: Arc<VirtualScheduler>,
    pub auth: Arc<SessionAuth>,
    pub location: Arc<StaticLocation>,
    pub client: Arc<C>,
    pub batcher: EventBatcher,
}

pub fn harness(config: TrackerConfig) -> Harness<RecordingClient> {
    harness_with(config, RecordingClient::new(), true)
}

pub fn harness_with<C: ActivityClient + 'static>(
    config: TrackerConfig,
    client: C,
    signed_in: bool,
) -> Harness<C> {
    let source = Arc::new(ManualSource::new());
    let clock = Arc::new(VirtualScheduler::new(START_MS));
    let auth = Arc::new(if signed_in {
        SessionAuth::signed_in(UserIdentity::new(USER_ID))
    } else {
        SessionAuth::new()
    });
    let location = Arc::new(StaticLocation::new("/home"));
    let client = Arc::new(client);

    let batcher = EventBatcher::new(
        config,
        BatcherDeps {
            client: client.clone(),
            auth: auth.clone(),
            source: source.clone(),
            location: location.clone(),
            scheduler: clock.clone(),
        },
    )
    .expect("valid test config");

    Harness {
        source,
        clock,
        auth,
        location,
        client,
        batcher,
    }
}
