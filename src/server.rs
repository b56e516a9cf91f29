//! Local activity sink for development and testing.
//!
//! This module provides an HTTP server that:
//! - Accepts activity records via POST /api/users/:user_id/activity
//! - Checks the bearer token against the configured one
//! - Keeps records in memory and lists them via GET on the same path
//!
//! # Architecture
//!
//! ```text
//! EventBatcher ──→ HttpActivityClient ──→ POST /api/users/:id/activity ──→ sink
//!                                                                          ↓
//!                                                                   [in-memory log]
//! ```

use crate::client::ActivityRecord;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Bearer token clients must present
    pub token: String,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, token: impl Into<String>) -> Self {
        Self {
            port,
            token: token.into(),
        }
    }
}

/// An activity record as stored by the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredActivity {
    pub id: uuid::Uuid,
    pub user_id: String,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(flatten)]
    pub record: ActivityRecord,
}

/// Shared server state
pub struct ServerState {
    token: String,
    activities: RwLock<Vec<StoredActivity>>,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            token: config.token.clone(),
            activities: RwLock::new(Vec::new()),
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match presented {
            Some(token) if token == self.token => Ok(()),
            _ => Err(error(
                StatusCode::UNAUTHORIZED,
                "Missing or invalid bearer token",
                "UNAUTHORIZED",
            )),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error(status: StatusCode, message: &str, code: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/users/:user_id/activity
async fn record_activity(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(record): Json<ActivityRecord>,
) -> Result<(StatusCode, Json<StoredActivity>), (StatusCode, Json<ErrorResponse>)> {
    state.authorize(&headers)?;

    if record.action.trim().is_empty() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Activity action must not be empty",
            "INVALID_ACTIVITY",
        ));
    }

    let stored = StoredActivity {
        id: uuid::Uuid::new_v4(),
        user_id,
        received_at: Utc::now(),
        client_id: headers
            .get("X-Client-Id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        record,
    };

    tracing::debug!(
        user_id = %stored.user_id,
        action = %stored.record.action,
        page = %stored.record.page,
        "Activity received"
    );

    state.activities.write().await.push(stored.clone());
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/users/:user_id/activity
async fn list_activity(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<StoredActivity>>, (StatusCode, Json<ErrorResponse>)> {
    state.authorize(&headers)?;

    let activities = state
        .activities
        .read()
        .await
        .iter()
        .filter(|a| a.user_id == user_id)
        .cloned()
        .collect();
    Ok(Json(activities))
}

/// Build the sink router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/users/:user_id/activity",
            get(list_activity).post(record_activity),
        )
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Activity sink listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
