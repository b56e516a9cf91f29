//! Activity API clients.
//!
//! The batcher delivers events through the [`ActivityClient`] trait. The
//! HTTP implementation posts each event to the activity endpoint with a
//! bearer token; [`LogActivityClient`] only logs, for dry runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Activity endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API (default: http://127.0.0.1:8080)
    pub base_url: String,
    /// Bearer authentication token
    #[serde(default)]
    pub token: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            token: None,
        }
    }
}

/// Activity client error types.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    /// No bearer token is configured; no request was made
    #[error("Activity client has no auth token")]
    MissingToken,
    /// The endpoint URL could not be built
    #[error("Invalid activity URL: {0}")]
    InvalidUrl(String),
    /// Network/HTTP error
    #[error("Activity network error: {0}")]
    Network(String),
    /// Server returned an error response
    #[error("Activity server error ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Body of one activity request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub action: String,
    pub page: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Delivers a single activity to the tracking backend.
#[async_trait]
pub trait ActivityClient: Send + Sync {
    async fn track_activity(
        &self,
        user_id: &str,
        action: &str,
        page: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), ActivityError>;
}

/// Client that logs activities instead of sending them.
#[derive(Debug, Default)]
pub struct LogActivityClient {
    logged: AtomicU64,
}

impl LogActivityClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of activities logged so far.
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ActivityClient for LogActivityClient {
    async fn track_activity(
        &self,
        user_id: &str,
        action: &str,
        page: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), ActivityError> {
        self.logged.fetch_add(1, Ordering::Relaxed);
        let metadata = serde_json::Value::Object(metadata.clone());
        tracing::info!(user_id, action, page, %metadata, "activity");
        Ok(())
    }
}

/// HTTP client for the activity endpoint.
#[cfg(feature = "http")]
pub struct HttpActivityClient {
    base_url: reqwest::Url,
    token: std::sync::RwLock<Option<String>>,
    client: reqwest::Client,
    client_id: String,
}

#[cfg(feature = "http")]
impl HttpActivityClient {
    /// Create a new activity client.
    pub fn new(config: ClientConfig) -> Result<Self, ActivityError> {
        let base_url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| ActivityError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ActivityError::InvalidUrl(config.base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ActivityError::Network(format!("Failed to create HTTP client: {e}")))?;

        // Generate client ID from hostname + instance
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let client_id = format!(
            "tracker-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );

        Ok(Self {
            base_url,
            token: std::sync::RwLock::new(config.token),
            client,
            client_id,
        })
    }

    /// Replace the bearer token, e.g. after sign in. `None` disables delivery.
    pub fn set_token(&self, token: Option<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = token;
    }

    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Append escaped path segments to the base URL, keeping any base path.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ActivityError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ActivityError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build `{base}/api/users/{user_id}/activity`, escaping the user id.
    pub fn activity_url(&self, user_id: &str) -> Result<reqwest::Url, ActivityError> {
        self.endpoint(&["api", "users", user_id, "activity"])
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> Result<reqwest::Url, ActivityError> {
        self.endpoint(&["health"])
    }

    /// Test connection to the activity API.
    pub async fn test_connection(&self) -> Result<bool, ActivityError> {
        let response = self
            .client
            .get(self.health_url()?)
            .send()
            .await
            .map_err(|e| ActivityError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Get the client ID sent with each request.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl ActivityClient for HttpActivityClient {
    async fn track_activity(
        &self,
        user_id: &str,
        action: &str,
        page: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), ActivityError> {
        let token = self.token().ok_or(ActivityError::MissingToken)?;
        let url = self.activity_url(user_id)?;

        let record = ActivityRecord {
            action: action.to_string(),
            page: page.to_string(),
            metadata: metadata.clone(),
        };

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {token}"))
            .header("X-Client-Id", &self.client_id)
            .json(&record)
            .send()
            .await
            .map_err(|e| ActivityError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ActivityError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_client_counts() {
        let client = LogActivityClient::new();
        client
            .track_activity("u1", "click", "/", &Map::new())
            .await
            .unwrap();
        assert_eq!(client.logged(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = ActivityError::Server {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "Activity server error (401): unauthorized");

        let errors = [
            ActivityError::MissingToken,
            ActivityError::InvalidUrl("x".to_string()),
            ActivityError::Network("refused".to_string()),
            err,
        ];
        for error in &errors {
            let prefix = match error {
                ActivityError::MissingToken => "Activity client has no auth token",
                ActivityError::InvalidUrl(_) => "Invalid activity URL",
                ActivityError::Network(_) => "Activity network error",
                ActivityError::Server { .. } => "Activity server error",
            };
            assert!(error.to_string().starts_with(prefix));
        }
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_urls_keep_base_path() {
        let client =
            HttpActivityClient::new(ClientConfig::new("http://example.test/prefix", None))
                .unwrap();
        assert_eq!(
            client.activity_url("u1").unwrap().as_str(),
            "http://example.test/prefix/api/users/u1/activity"
        );
        assert_eq!(
            client.health_url().unwrap().as_str(),
            "http://example.test/prefix/health"
        );
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_activity_url() {
        let client =
            HttpActivityClient::new(ClientConfig::new("http://127.0.0.1:8080/", None)).unwrap();
        assert_eq!(
            client.activity_url("user 1").unwrap().as_str(),
            "http://127.0.0.1:8080/api/users/user%201/activity"
        );
        assert_eq!(
            client.health_url().unwrap().as_str(),
            "http://127.0.0.1:8080/health"
        );
        assert!(client.client_id().starts_with("tracker-"));
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_invalid_base_url() {
        let result = HttpActivityClient::new(ClientConfig::new("not a url", None));
        assert!(matches!(result, Err(ActivityError::InvalidUrl(_))));
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn test_missing_token_fails_fast() {
        // Port 9 (discard) is never contacted: the token check comes first.
        let client =
            HttpActivityClient::new(ClientConfig::new("http://127.0.0.1:9", None)).unwrap();
        let result = client
            .track_activity("u1", "page_view", "/", &Map::new())
            .await;
        assert!(matches!(result, Err(ActivityError::MissingToken)));
    }
}
