// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server hosting a [`Renderer`].
//!
//! Files of the static directory are served first. Every other request goes
//! through `render_page()`; when the renderer does not handle the URL
//! (`http_response` is `None`) the answer is a plain 404.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    handler::Handler,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::json;
use ssrkit::{PageContextInit, Renderer};
use tower_http::services::ServeDir;

use super::body::into_response;
use crate::error::Result;

/// Shared application state for the server.
pub struct AppState {
    /// The page renderer.
    pub renderer: Arc<Renderer>,
    /// Root of the static files.
    pub static_dir: PathBuf,
}

impl AppState {
    /// Creates state serving `static_dir` next to `renderer`.
    pub fn new(renderer: Arc<Renderer>, static_dir: impl AsRef<Path>) -> Self {
        Self {
            renderer,
            static_dir: static_dir.as_ref().to_path_buf(),
        }
    }
}

/// Builds the axum router.
pub fn create_app(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(fallback_handler.with_state(state));

    Router::new().fallback_service(static_files)
}

/// Binds `addr` and serves until the process stops.
pub async fn create_server(addr: &str, state: Arc<AppState>) -> Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Renders the page for the request.
async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let init = page_context_init(&request);
    let mut page_context = state.renderer.render_page(init).await;

    match page_context.http_response.take() {
        Some(http_response) => {
            tracing::debug!(
                "{} {} -> {} ({:?})",
                request.method(),
                page_context.url,
                http_response.status_code(),
                page_context.page_id
            );
            into_response(http_response)
        }
        None => {
            tracing::debug!("{} {} not handled", request.method(), page_context.url);
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

/// Builds the renderer input: the URL plus the user agent, if any.
fn page_context_init(request: &Request<Body>) -> PageContextInit {
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut init = PageContextInit::new(url);
    if let Some(user_agent) = request.headers().get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        init = init.with("userAgent", json!(user_agent));
    }
    init
}
