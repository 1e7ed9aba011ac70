// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the axum adapter.
//!
//! These tests drive the full router (static files plus page rendering)
//! through `axum-test`.

use std::fs;
use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value as JsonValue};
use ssrkit::serialize::parse_page_context;
use ssrkit::{
    dangerously_skip_escape, escape_inject, hook_fn, BoxError, Export, FileExports, Hook, HookReturn,
    MemoryPageFiles, PageContext, Renderer,
};
use ssrkit_server::server::{create_app, AppState};
use tempfile::{tempdir, TempDir};

fn page_hook(body: &'static str) -> Arc<dyn Hook> {
    hook_fn(move |_ctx: &PageContext| async move {
        Ok(HookReturn::document(dangerously_skip_escape(format!(
            "<html><head></head><body>{}</body></html>",
            body
        ))))
    })
}

fn greeting_hook() -> Arc<dyn Hook> {
    hook_fn(|ctx: &PageContext| {
        let user_agent = ctx.field("userAgent").and_then(JsonValue::as_str).unwrap_or("nobody").to_string();
        let name = ctx.route_params.get("name").cloned().unwrap_or_default();
        let doc = escape_inject()
            .template("<html><body><h1>Hello ")
            .value(name)
            .template("</h1><p>")
            .value(user_agent)
            .template("</p></body></html>")
            .build();
        async move { Ok(HookReturn::document(doc)) }
    })
}

fn pages(with_error_page: bool) -> MemoryPageFiles {
    let greet_props = hook_fn(|ctx: &PageContext| {
        let name = ctx.route_params.get("name").cloned().unwrap_or_default();
        async move { Ok(HookReturn::page_context(json!({"pageProps": {"name": name}}))) }
    });

    let pages = MemoryPageFiles::new()
        .with_file("/pages/index.page", FileExports::new())
        .unwrap()
        .with_file("/pages/greet.page", FileExports::new())
        .unwrap()
        .with_file(
            "/pages/greet.page.route",
            FileExports::new().with("default", Export::Value(json!("/greet/:name"))),
        )
        .unwrap()
        .with_file(
            "/pages/greet.page.server",
            FileExports::new()
                .with_hook("render", greeting_hook())
                .with_hook("onBeforeRender", greet_props)
                .with("passToClient", Export::strings(["pageProps"])),
        )
        .unwrap()
        .with_file("/pages/broken.page", FileExports::new())
        .unwrap()
        .with_file(
            "/pages/broken.page.server",
            FileExports::new().with_hook(
                "onBeforeRender",
                hook_fn(|_ctx: &PageContext| async { Err::<HookReturn, BoxError>("database is down".into()) }),
            ),
        )
        .unwrap()
        .with_file("/pages/_default.page.server", FileExports::new().with_hook("render", page_hook("<h1>Home</h1>")))
        .unwrap()
        .with_file("/pages/_default.page.client", FileExports::new())
        .unwrap();

    if with_error_page {
        pages
            .with_file("/pages/_error.page", FileExports::new())
            .unwrap()
            .with_file(
                "/pages/_error.page.server",
                FileExports::new().with_hook("render", page_hook("<h1>Something went wrong</h1>")),
            )
            .unwrap()
    } else {
        pages
    }
}

/// Test server plus the static directory it serves.
fn create_test_server(with_error_page: bool) -> (TestServer, TempDir) {
    let static_dir = tempdir().unwrap();
    fs::write(static_dir.path().join("robots.txt"), "User-agent: *\n").unwrap();

    let renderer = Arc::new(Renderer::new(Arc::new(pages(with_error_page))));
    let state = Arc::new(AppState::new(renderer, static_dir.path()));
    let server = TestServer::new(create_app(state)).expect("Failed to create test server");
    (server, static_dir)
}

#[tokio::test]
async fn test_renders_page() {
    let (server, _static_dir) = create_test_server(true);

    let response = server.get("/").await;

    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "text/html;charset=utf-8");
    let text = response.text();
    assert!(text.contains("<h1>Home</h1>"));
    assert!(text.contains(r#"<script id="ssrkit_pageContext" type="application/json">"#));
}

#[tokio::test]
async fn test_route_params_and_user_agent() {
    let (server, _static_dir) = create_test_server(true);

    let response = server.get("/greet/ada").add_header(header::USER_AGENT, HeaderValue::from_static("test-agent")).await;

    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("<h1>Hello ada</h1>"));
    assert!(text.contains("<p>test-agent</p>"));
}

#[tokio::test]
async fn test_page_context_request() {
    let (server, _static_dir) = create_test_server(true);

    let response = server.get("/greet/ada.pageContext.json").await;

    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "application/json");
    let page_context = parse_page_context(&response.text()).unwrap();
    assert_eq!(page_context["_pageId"], json!("/pages/greet"));
    assert_eq!(page_context["pageProps"], json!({"name": "ada"}));
}

#[tokio::test]
async fn test_static_file_is_served() {
    let (server, _static_dir) = create_test_server(true);

    let response = server.get("/robots.txt").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "User-agent: *\n");
}

#[tokio::test]
async fn test_unknown_url_renders_error_page_404() {
    let (server, _static_dir) = create_test_server(true);

    let response = server.get("/does/not/exist").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.text().contains("<h1>Something went wrong</h1>"));
}

#[tokio::test]
async fn test_unknown_url_without_error_page_is_plain_404() {
    let (server, _static_dir) = create_test_server(false);

    let response = server.get("/does/not/exist").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "Not Found");
}

#[tokio::test]
async fn test_hook_error_renders_error_page_500() {
    let (server, _static_dir) = create_test_server(true);

    let response = server.get("/broken").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().contains("<h1>Something went wrong</h1>"));
}

#[tokio::test]
async fn test_hook_error_on_data_request_is_json_500() {
    let (server, _static_dir) = create_test_server(true);

    let response = server.get("/broken.pageContext.json").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<JsonValue>(), json!({"serverSideError": true}));
}

#[tokio::test]
async fn test_post_is_not_rendered() {
    let (server, _static_dir) = create_test_server(true);

    let response = server.post("/").await;

    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
}
