//! HTTP surface: one screenshot route and a 404 for everything else.

use crate::{capture, EngineConfig, Error, Launcher, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;

/// Path served by the render pipeline
pub const SCREENSHOT_PATH: &str = "/api/screenshot";

/// `Cache-Control` value sent with every successful capture
pub const CACHE_CONTROL: &str = "public, max-age=60";

pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared handler state
///
/// The launcher is the injected browser capability; each request gets its own
/// session from it.
#[derive(Clone)]
pub struct AppState {
    launcher: Arc<dyn Launcher>,
    config: Arc<EngineConfig>,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(launcher: Arc<dyn Launcher>, config: EngineConfig) -> Self {
        Self {
            launcher,
            config: Arc::new(config),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

pub fn router(state: AppState) -> Router {
    let limit = state.max_body_bytes;
    Router::new()
        .route(SCREENSHOT_PATH, any(screenshot))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

async fn screenshot(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("{} request, {} byte body", SCREENSHOT_PATH, body.len());
    match capture::capture_screenshot(state.launcher.clone(), &state.config, &body).await {
        Ok(png) => png_response(png),
        Err(err) => err.into_response(),
    }
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn png_response(png: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        png,
    )
        .into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::ElementNotFound(selector) => {
                debug!("wrapper element {} never became visible", selector);
                (StatusCode::INTERNAL_SERVER_ERROR, "Element not found").into_response()
            }
            other => {
                error!("Screenshot error: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to capture screenshot").into_response()
            }
        }
    }
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::InitializationError(format!("Failed to bind {}: {}", addr, e)))?;
    info!("listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Other(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested, draining in-flight captures");
}
