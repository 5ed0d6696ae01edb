//! Query and live-stream endpoints
//!
//! Routes (under the configured prefix):
//!
//! - `GET /health`     → `{ "ok": true, "captureEnabled": bool }`
//! - `GET /status`     → `{ "client": n, "count": n, "max": n }`
//! - `GET /logs`       → `{ "count": n, "max": n, "logs": [CallRecord...] }`
//! - `GET /sse`        → live stream of call records with heartbeats
//! - `GET /clear`      → `{ "ok": true, "message": "logs cleared" }`
//! - `GET /debug/make` → one self-test outbound call through the interceptor
//!
//! Clearing is a GET so a plain link or browser tab can trigger it without a
//! cross-site form post.

use crate::config::ObserveConfig;
use crate::hub::ObservabilityHub;
use crate::interceptor::Interceptor;
use crate::request_target::RequestOptions;
use crate::transport::{ReqwestTransport, Transport, TransportError};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared handler state
pub struct AppState<T> {
    hub: Arc<ObservabilityHub>,
    client: Interceptor<T>,
    debug_target: Arc<str>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            client: self.client.clone(),
            debug_target: Arc::clone(&self.debug_target),
        }
    }
}

impl<T: Transport> AppState<T> {
    pub fn new(client: Interceptor<T>, debug_target: impl Into<String>) -> Self {
        Self {
            hub: Arc::clone(client.hub()),
            client,
            debug_target: Arc::from(debug_target.into()),
        }
    }
}

/// Build the router, nested under `prefix` unless it is `/`
pub fn router<T: Transport>(state: AppState<T>, prefix: &str) -> Router {
    let routes = Router::new()
        .route("/health", get(health::<T>))
        .route("/status", get(status::<T>))
        .route("/logs", get(logs::<T>))
        .route("/sse", get(sse::<T>))
        .route("/clear", get(clear::<T>))
        .route("/debug/make", get(debug_make::<T>))
        .with_state(state);

    if prefix == "/" {
        routes
    } else {
        Router::new().nest(prefix, routes)
    }
}

/// Run the recorder service until Ctrl-C
pub async fn serve(config: ObserveConfig) -> Result<()> {
    config.validate()?;

    let hub = ObservabilityHub::new(config.hub_config());
    let transport = ReqwestTransport::new().context("Failed to build HTTP client")?;
    let client = Interceptor::new(transport, Arc::clone(&hub));
    let app = router(
        AppState::new(client, config.debug_target.clone()),
        &config.route_prefix,
    );

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    let prefix = config.route_prefix.trim_end_matches('/');
    tracing::info!(
        "http-observe listening on http://{} (routes: {}/{{health,status,logs,sse,clear,debug/make}})",
        config.bind,
        prefix
    );

    let shutdown_hub = Arc::clone(&hub);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
            shutdown_hub.shutdown();
        })
        .await
        .context("Server error")?;

    Ok(())
}

async fn health<T: Transport>(State(state): State<AppState<T>>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "captureEnabled": state.hub.capture_active(),
    }))
}

async fn status<T: Transport>(State(state): State<AppState<T>>) -> Response {
    Json(state.hub.status()).into_response()
}

async fn logs<T: Transport>(State(state): State<AppState<T>>) -> Response {
    Json(state.hub.snapshot()).into_response()
}

async fn clear<T: Transport>(State(state): State<AppState<T>>) -> Json<serde_json::Value> {
    state.hub.clear();
    Json(json!({ "ok": true, "message": "logs cleared" }))
}

/// Live stream; the observer lives as long as the response body
async fn sse<T: Transport>(State(state): State<AppState<T>>) -> Response {
    let frames = state.hub.subscribe();
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
            (HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no")),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

/// Self-test: POST a small JSON body to the debug target through the interceptor
async fn debug_make<T: Transport>(State(state): State<AppState<T>>) -> Response {
    let payload = json!({
        "demo": "http-observe",
        "now": chrono::Utc::now().timestamp_millis(),
    })
    .to_string();

    let options = RequestOptions::new()
        .method("POST")
        .header("content-type", "application/json");
    let mut call = state.client.request((&*state.debug_target, options));
    call.write(payload);

    let outcome = async {
        let response = call.end().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok::<_, TransportError>((status, text.len()))
    }
    .await;

    match outcome {
        Ok((status, len)) => Json(json!({ "ok": true, "status": status, "len": len })).into_response(),
        Err(e) => {
            tracing::warn!("Self-test call to {} failed: {}", state.debug_target, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
