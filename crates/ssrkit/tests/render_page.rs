// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! End-to-end tests of the render pipeline through the public API.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value as JsonValue};
use ssrkit::serialize::parse_page_context;
use ssrkit::{
    dangerously_skip_escape, escape_inject, hook_fn, route_fn, BodyKind, BoxError, DocumentHtml, ErrorReporter,
    Export, FileExports, Hook, HookReturn, HookValue, MemoryPageFiles, PageContext, PageContextInit, PageFile,
    PageFileSource, Renderer, RendererConfig, RouteMatch, SsrEnv, SsrError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn reports(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ErrorReporter for Recorder {
    fn report(&self, report: &str) {
        self.0.lock().unwrap().push(report.to_string());
    }
}

/// Slow page file source counting its scans.
struct CountingSource {
    pages: MemoryPageFiles,
    scans: AtomicUsize,
    fail: bool,
}

impl CountingSource {
    fn new(pages: MemoryPageFiles) -> Self {
        Self {
            pages,
            scans: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(MemoryPageFiles::new())
        }
    }

    fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFileSource for CountingSource {
    async fn page_files(&self) -> ssrkit::Result<Vec<PageFile>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail {
            return Err(SsrError::Discovery("disk gone".to_string()));
        }
        self.pages.page_files().await
    }
}

fn html_hook(body: &'static str) -> Arc<dyn Hook> {
    hook_fn(move |_ctx: &PageContext| async move {
        Ok(HookReturn::document(dangerously_skip_escape(format!(
            "<html><head></head><body>{}</body></html>",
            body
        ))))
    })
}

fn failing_hook(message: &'static str) -> Arc<dyn Hook> {
    hook_fn(move |_ctx: &PageContext| async move { Err::<HookReturn, BoxError>(message.into()) })
}

fn counting_hook(counter: Arc<AtomicUsize>, body: &'static str) -> Arc<dyn Hook> {
    hook_fn(move |_ctx: &PageContext| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(HookReturn::document(dangerously_skip_escape(body))) }
    })
}

/// App with `/` and `/about`, a default client entry and no server hooks.
fn base_app() -> MemoryPageFiles {
    MemoryPageFiles::new()
        .with_file("/pages/index.page", FileExports::new())
        .unwrap()
        .with_file("/pages/about.page", FileExports::new())
        .unwrap()
        .with_file("/pages/_default.page.client", FileExports::new())
        .unwrap()
}

fn with_error_page(pages: MemoryPageFiles) -> MemoryPageFiles {
    pages
        .with_file("/pages/_error.page", FileExports::new())
        .unwrap()
        .with_file(
            "/pages/_error.page.server",
            FileExports::new().with_hook("render", html_hook("<h1>Error page</h1>")),
        )
        .unwrap()
}

fn app() -> MemoryPageFiles {
    let pages = base_app()
        .with_file(
            "/pages/_default.page.server",
            FileExports::new().with_hook("render", html_hook("<h1>Default</h1>")),
        )
        .unwrap()
        .with_file(
            "/pages/about.page.server",
            FileExports::new().with_hook("render", html_hook("<h1>About</h1>")),
        )
        .unwrap();
    with_error_page(pages)
}

fn renderer_with_recorder(pages: MemoryPageFiles) -> (Renderer, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let config = RendererConfig::new().with_env(SsrEnv::new().with_reporter(recorder.clone()));
    (Renderer::new(Arc::new(pages)).with_config(config), recorder)
}

async fn render(renderer: &Renderer, url: &str) -> PageContext {
    renderer.render_page(PageContextInit::new(url)).await
}

#[tokio::test]
async fn test_matched_page_renders_200() {
    let (renderer, recorder) = renderer_with_recorder(app());
    let ctx = render(&renderer, "/about").await;

    assert_eq!(ctx.page_id.as_deref(), Some("/pages/about"));
    let response = ctx.http_response.as_ref().unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.content_type(), "text/html;charset=utf-8");
    assert!(response.body().unwrap().contains("<h1>About</h1>"));
    assert!(recorder.reports().is_empty());
}

#[tokio::test]
async fn test_unmatched_url_with_error_page_is_404_or_200_for_data() {
    let (renderer, _) = renderer_with_recorder(app());

    for url in ["/missing", "/deeply/nested/missing", "/about/extra"] {
        let ctx = render(&renderer, url).await;
        assert_eq!(ctx.is_404, Some(true));
        let response = ctx.http_response.as_ref().unwrap();
        assert_eq!(response.status_code(), 404, "{}", url);
        assert!(response.body().unwrap().contains("<h1>Error page</h1>"));

        let data_url = ssrkit::url::page_context_request_url(url);
        let ctx = render(&renderer, &data_url).await;
        let response = ctx.http_response.as_ref().unwrap();
        assert_eq!(response.status_code(), 200, "{}", data_url);
        let page_context = parse_page_context(response.body().unwrap()).unwrap();
        assert_eq!(page_context["_pageId"], json!("/pages/_error"));
        assert_eq!(page_context["is404"], json!(true));
        assert_eq!(page_context["pageProps"], json!({"is404": true}));
    }
}

#[tokio::test]
async fn test_unmatched_url_without_error_page() {
    let pages = base_app()
        .with_file(
            "/pages/_default.page.server",
            FileExports::new().with_hook("render", html_hook("ok")),
        )
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/missing").await;
    assert!(ctx.http_response.is_none());

    let ctx = render(&renderer, "/missing.pageContext.json").await;
    let response = ctx.http_response.as_ref().unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.body().unwrap(), r#"{"pageContext404PageDoesNotExist":true}"#);
}

#[tokio::test]
async fn test_urls_outside_base_url_are_unhandled() {
    let pages = app();
    let renderer = Renderer::new(Arc::new(pages)).with_config(RendererConfig::new().with_base_url("/shop/"));

    for url in ["/", "/about", "/missing", "/shopping", "https://example.org/about"] {
        assert!(render(&renderer, url).await.http_response.is_none(), "{}", url);
    }
    let ctx = render(&renderer, "/shop/about").await;
    assert_eq!(ctx.http_response.unwrap().status_code(), 200);
    let ctx = render(&renderer, "https://example.org/shop/about").await;
    assert_eq!(ctx.url_pathname, "/about");
}

#[tokio::test]
async fn test_rendering_is_idempotent() {
    let (renderer, _) = renderer_with_recorder(app());
    let first = render(&renderer, "/about").await;
    let second = render(&renderer, "/about").await;
    assert_eq!(
        first.http_response.unwrap().body().unwrap(),
        second.http_response.unwrap().body().unwrap()
    );
}

#[tokio::test]
async fn test_unknown_hook_keys_are_usage_errors() {
    let bad_render = hook_fn(|_ctx: &PageContext| async {
        Ok(HookReturn::document(dangerously_skip_escape("<p>x</p>"))
            .with_entry("redirectTo", HookValue::Json(json!("/login"))))
    });
    let pages = base_app()
        .with_file("/pages/_default.page.server", FileExports::new().with_hook("render", bad_render))
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);

    let err = renderer.try_render_page(PageContextInit::new("/")).await.unwrap_err();
    assert!(err.is_usage());
    let message = err.to_string();
    assert!(message.contains("'redirectTo'"), "{}", message);
    assert!(message.contains("'documentHtml', 'pageContext'"), "{}", message);

    let bad_before_render = hook_fn(|_ctx: &PageContext| async {
        Ok(HookReturn::from(json!({"pageContext": {}, "pageProps": {}})))
    });
    let pages = base_app()
        .with_file(
            "/pages/_default.page.server",
            FileExports::new()
                .with_hook("render", html_hook("x"))
                .with_hook("onBeforeRender", bad_before_render),
        )
        .unwrap();
    let (renderer, recorder) = renderer_with_recorder(pages);
    let err = renderer.try_render_page(PageContextInit::new("/")).await.unwrap_err();
    assert!(err.to_string().contains("'pageProps'"));

    let ctx = render(&renderer, "/").await;
    assert!(ctx.http_response.is_none());
    assert!(ctx.error.as_ref().unwrap().is_usage());
    assert_eq!(recorder.reports().len(), 1);
}

#[tokio::test]
async fn test_render_returning_plain_string_is_rejected() {
    let render_string = hook_fn(|_ctx: &PageContext| async { Ok(HookReturn::from(json!("<h1>raw</h1>"))) });
    let pages = base_app()
        .with_file("/pages/_default.page.server", FileExports::new().with_hook("render", render_string))
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);
    let err = renderer.try_render_page(PageContextInit::new("/")).await.unwrap_err();
    assert!(err.to_string().contains("plain string"));
}

#[tokio::test]
async fn test_missing_render_hook_is_usage_error() {
    let pages = base_app()
        .with_file("/pages/_default.page.server", FileExports::new())
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);
    let err = renderer.try_render_page(PageContextInit::new("/about")).await.unwrap_err();
    assert!(err.to_string().contains("No `render()` hook found"));
}

#[tokio::test]
async fn test_page_props_round_trip_through_data_request() {
    let on_before_render = hook_fn(|ctx: &PageContext| {
        let user = ctx.field("user").cloned().unwrap_or(JsonValue::Null);
        async move {
            Ok(HookReturn::page_context(json!({
                "pageProps": {
                    "user": user,
                    "note": "!important",
                    "scores": [1, 2.5, null],
                    "nested": {"empty": {}, "flag": false}
                }
            })))
        }
    });
    let render_count = Arc::new(AtomicUsize::new(0));
    let pages = base_app()
        .with_file(
            "/pages/_default.page.server",
            FileExports::new()
                .with_hook("onBeforeRender", on_before_render)
                .with_hook("render", counting_hook(render_count.clone(), "<p>never</p>"))
                .with("passToClient", Export::strings(["pageProps"])),
        )
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);

    let ctx = renderer
        .render_page(PageContextInit::new("/about.pageContext.json").with("user", json!({"id": 7})))
        .await;
    assert!(ctx.is_page_context_request);
    assert_eq!(ctx.url_pathname, "/about");
    let response = ctx.http_response.as_ref().unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.content_type(), "application/json");

    let body = response.body().unwrap();
    assert!(body.contains("\"!!important\""));
    let page_context = parse_page_context(body).unwrap();
    assert_eq!(page_context["_pageId"], json!("/pages/about"));
    assert_eq!(Some(&page_context["pageProps"]), ctx.page_props());
    assert_eq!(render_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_favicon_skips_routing() {
    let route_calls = Arc::new(AtomicUsize::new(0));
    let calls = route_calls.clone();
    let pages = app()
        .with_file(
            "/pages/about.page.route",
            FileExports::new().with(
                "default",
                Export::Route(route_fn("counting route", move |_ctx: &PageContext| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(RouteMatch::no_match()) }
                })),
            ),
        )
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/favicon.ico").await;
    assert!(ctx.http_response.is_none());
    assert_eq!(route_calls.load(Ordering::SeqCst), 0);

    render(&renderer, "/about").await;
    assert_eq!(route_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_render_error_renders_500_page_and_logs_once() {
    let pages = with_error_page(
        base_app()
            .with_file("/pages/_default.page.server", FileExports::new().with_hook("render", html_hook("ok")))
            .unwrap()
            .with_file(
                "/pages/about.page.server",
                FileExports::new().with_hook("render", failing_hook("boom")),
            )
            .unwrap(),
    );
    let (renderer, recorder) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/about").await;
    assert_eq!(ctx.is_404, Some(false));
    assert_eq!(ctx.page_id.as_deref(), Some("/pages/_error"));
    let response = ctx.http_response.as_ref().unwrap();
    assert_eq!(response.status_code(), 500);
    assert!(response.body().unwrap().contains("<h1>Error page</h1>"));

    let reports = recorder.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("boom"));
    assert!(reports[0].contains("/pages/about.page.server"));

    let err = ctx.error.as_ref().unwrap();
    assert_eq!(err.as_hook_error().unwrap().hook_name(), "render");
    assert!(err.was_logged());
}

#[tokio::test]
async fn test_data_request_with_hook_error_gets_server_side_error() {
    let pages = with_error_page(
        base_app()
            .with_file(
                "/pages/_default.page.server",
                FileExports::new()
                    .with_hook("render", html_hook("ok"))
                    .with_hook("onBeforeRender", failing_hook("db down")),
            )
            .unwrap(),
    );
    let (renderer, recorder) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/about.pageContext.json").await;
    let response = ctx.http_response.as_ref().unwrap();
    assert_eq!(response.status_code(), 500);
    assert_eq!(response.body().unwrap(), r#"{"serverSideError":true}"#);
    assert_eq!(recorder.reports().len(), 1);
}

#[tokio::test]
async fn test_error_page_failing_too_gives_unhandled_response() {
    let pages = base_app()
        .with_file(
            "/pages/_default.page.server",
            FileExports::new().with_hook("render", failing_hook("page failed")),
        )
        .unwrap()
        .with_file("/pages/_error.page", FileExports::new())
        .unwrap()
        .with_file(
            "/pages/_error.page.server",
            FileExports::new().with_hook("render", failing_hook("error page failed")),
        )
        .unwrap();
    let (renderer, recorder) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/about").await;
    assert!(ctx.http_response.is_none());

    let reports = recorder.reports();
    assert_eq!(reports.len(), 2);
    assert!(reports[0].contains("page failed"));
    assert!(reports[1].contains("error page failed"));
}

#[tokio::test]
async fn test_hook_error_without_error_page_is_unhandled() {
    let pages = base_app()
        .with_file(
            "/pages/_default.page.server",
            FileExports::new().with_hook("render", failing_hook("boom")),
        )
        .unwrap();
    let (renderer, recorder) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/").await;
    assert!(ctx.http_response.is_none());
    assert!(ctx.error.is_some());
    assert_eq!(recorder.reports().len(), 1);
}

#[tokio::test]
async fn test_route_function_error_goes_to_500() {
    let pages = app()
        .with_file(
            "/pages/about.page.route",
            FileExports::new().with(
                "default",
                Export::Route(route_fn("broken", |_ctx: &PageContext| async {
                    Err::<RouteMatch, BoxError>("route broke".into())
                })),
            ),
        )
        .unwrap();
    let (renderer, recorder) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/anything").await;
    assert_eq!(ctx.http_response.as_ref().unwrap().status_code(), 500);
    let err = ctx.error.as_ref().unwrap().as_hook_error().unwrap();
    assert_eq!(err.hook_name(), "route");
    assert_eq!(err.hook_file_path(), "/pages/about.page.route");
    assert_eq!(recorder.reports().len(), 1);
}

#[tokio::test]
async fn test_route_strings_and_functions() {
    let pages = app()
        .with_file("/pages/product.page", FileExports::new())
        .unwrap()
        .with_file(
            "/pages/product.page.route",
            FileExports::new().with("default", Export::Value(json!("/product/:id"))),
        )
        .unwrap()
        .with_file("/pages/admin.page", FileExports::new())
        .unwrap()
        .with_file(
            "/pages/admin.page.route",
            FileExports::new().with(
                "default",
                Export::Route(route_fn("admin", |ctx: &PageContext| {
                    let matched = ctx.url_pathname.starts_with("/admin");
                    let section = ctx.url_pathname.trim_start_matches("/admin").trim_start_matches('/').to_string();
                    async move {
                        Ok(RouteMatch::from(matched).with_param("section", section).with_precedence(1))
                    }
                })),
            ),
        )
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/product/42?color=red").await;
    assert_eq!(ctx.page_id.as_deref(), Some("/pages/product"));
    assert_eq!(ctx.route_params.get("id").map(String::as_str), Some("42"));
    assert_eq!(ctx.url_parsed.search.get("color").map(String::as_str), Some("red"));

    let ctx = render(&renderer, "/admin/users").await;
    assert_eq!(ctx.page_id.as_deref(), Some("/pages/admin"));
    assert_eq!(ctx.route_params.get("section").map(String::as_str), Some("users"));
}

#[tokio::test]
async fn test_on_before_route_can_pick_the_page() {
    let on_before_route = hook_fn(|ctx: &PageContext| {
        let pathname = ctx.url_pathname.clone();
        async move {
            if pathname == "/legacy-about" {
                Ok(HookReturn::page_context(json!({"_pageId": "/pages/about", "legacy": true})))
            } else if pathname == "/blocked" {
                Ok(HookReturn::page_context(json!({"_pageId": null})))
            } else {
                Ok(HookReturn::Nothing)
            }
        }
    });
    let pages = app()
        .with_file(
            "/pages/_default.page.route",
            FileExports::new().with_hook("onBeforeRoute", on_before_route),
        )
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/legacy-about").await;
    assert_eq!(ctx.page_id.as_deref(), Some("/pages/about"));
    assert_eq!(ctx.field("legacy"), Some(&json!(true)));

    let ctx = render(&renderer, "/blocked").await;
    assert_eq!(ctx.is_404, Some(true));

    let ctx = render(&renderer, "/").await;
    assert_eq!(ctx.page_id.as_deref(), Some("/pages/index"));
}

#[tokio::test]
async fn test_render_page_context_patch_and_escaping() {
    let on_before_render = hook_fn(|ctx: &PageContext| {
        let id = ctx.route_params.get("id").cloned().unwrap_or_default();
        async move { Ok(HookReturn::page_context(json!({"pageProps": {"name": format!("<b>{}</b>", id)}}))) }
    });
    let render_hook = hook_fn(|ctx: &PageContext| {
        let name = ctx.page_props().and_then(|p| p["name"].as_str()).unwrap_or("").to_string();
        async move {
            let doc = escape_inject()
                .template("<html><head><title>x</title></head><body><h1>")
                .value(name)
                .template("</h1></body></html>")
                .build();
            Ok(HookReturn::document_with_page_context(doc, json!({"title": "Product"})))
        }
    });
    let pages = base_app()
        .with_file("/pages/product.page", FileExports::new())
        .unwrap()
        .with_file(
            "/pages/product.page.route",
            FileExports::new().with("default", Export::Value(json!("/product/:id"))),
        )
        .unwrap()
        .with_file(
            "/pages/product.page.server",
            FileExports::new()
                .with_hook("onBeforeRender", on_before_render)
                .with_hook("render", render_hook)
                .with("passToClient", Export::strings(["pageProps", "title"])),
        )
        .unwrap();
    let (renderer, _) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/product/7").await;
    assert_eq!(ctx.field("title"), Some(&json!("Product")));
    let body = ctx.http_response.as_ref().unwrap().body().unwrap().to_string();
    assert!(body.contains("<h1>&lt;b&gt;7&lt;/b&gt;</h1>"));
    assert!(body.contains(r#""pageProps":{"name":"\u003cb>7\u003c/b>"}"#), "{}", body);
    assert!(body.contains(r#""title":"Product""#));
}

#[tokio::test]
async fn test_stream_error_after_status_is_committed() {
    let streaming = hook_fn(|_ctx: &PageContext| async {
        let chunks: Vec<Result<Vec<u8>, BoxError>> = vec![
            Ok(b"<html><body>".to_vec()),
            Err("renderer crashed".into()),
            Ok(b"</body></html>".to_vec()),
        ];
        Ok(HookReturn::document(DocumentHtml::from_stream(stream::iter(chunks).boxed())))
    });
    let pages = with_error_page(
        base_app()
            .with_file("/pages/_default.page.server", FileExports::new().with_hook("render", streaming))
            .unwrap(),
    );
    let (renderer, recorder) = renderer_with_recorder(pages);

    let ctx = render(&renderer, "/").await;
    let response = ctx.http_response.as_ref().unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.body_kind(), BodyKind::Stream);
    assert!(response.body().unwrap_err().is_usage());

    let chunks: Vec<_> = response.body_stream().unwrap().collect().await;
    assert_eq!(chunks.len(), 2);
    assert!(chunks[1].is_err());
    assert!(ctx.server_side_error_while_streaming());

    let reports = recorder.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("renderer crashed"));
}

#[tokio::test]
async fn test_render_returning_nothing_is_unhandled() {
    let pages = base_app()
        .with_file(
            "/pages/_default.page.server",
            FileExports::new().with_hook("render", hook_fn(|_ctx: &PageContext| async { Ok(HookReturn::Nothing) })),
        )
        .unwrap();
    let (renderer, recorder) = renderer_with_recorder(pages);
    let ctx = render(&renderer, "/").await;
    assert!(ctx.http_response.is_none());
    assert!(ctx.error.is_none());
    assert!(recorder.reports().is_empty());
}

#[tokio::test]
async fn test_page_assets_accessor() {
    let (renderer, _) = renderer_with_recorder(app());
    let ctx = render(&renderer, "/about").await;
    let assets = ctx.get_page_assets().await.unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].src, "/pages/_default.page.client");
}

#[tokio::test]
async fn test_invalidate_picks_up_new_pages() {
    let pages = app();
    let (renderer, _) = renderer_with_recorder(pages.clone());
    assert_eq!(render(&renderer, "/contact").await.is_404, Some(true));

    pages.add_file("/pages/contact.page", FileExports::new()).unwrap();
    assert_eq!(render(&renderer, "/contact").await.is_404, Some(true));

    renderer.invalidate();
    let ctx = render(&renderer, "/contact").await;
    assert_eq!(ctx.page_id.as_deref(), Some("/pages/contact"));
    assert_eq!(ctx.http_response.unwrap().status_code(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_scan_page_files_once() {
    let source = Arc::new(CountingSource::new(app()));
    let recorder = Arc::new(Recorder::default());
    let config = RendererConfig::new().with_env(SsrEnv::new().with_reporter(recorder.clone()));
    let renderer = Arc::new(Renderer::new(source.clone()).with_config(config));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let renderer = renderer.clone();
            tokio::spawn(async move {
                let url = if i % 2 == 0 { "/about" } else { "/" };
                renderer.render_page(PageContextInit::new(url)).await.http_response.map(|r| r.status_code())
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Some(200));
    }
    assert_eq!(source.scans(), 1);
    assert!(recorder.reports().is_empty());
}

#[tokio::test]
async fn test_discovery_failure_is_attempted_and_logged_once() {
    let source = Arc::new(CountingSource::failing());
    let recorder = Arc::new(Recorder::default());
    let config = RendererConfig::new().with_env(SsrEnv::new().with_reporter(recorder.clone()));
    let renderer = Renderer::new(source.clone()).with_config(config);

    let ctx = render(&renderer, "/about").await;
    assert!(ctx.http_response.is_none());
    assert!(matches!(ctx.error.as_deref(), Some(SsrError::Discovery(_))));
    assert_eq!(source.scans(), 1);
    assert_eq!(recorder.reports(), vec!["Page file discovery failed: disk gone".to_string()]);
}

#[tokio::test]
async fn test_error_page_usage_error_is_not_retried() {
    let pages = base_app()
        .with_file(
            "/pages/_default.page.server",
            FileExports::new().with_hook("render", failing_hook("page failed")),
        )
        .unwrap()
        .with_file("/pages/_error.page", FileExports::new())
        .unwrap()
        .with_file(
            "/pages/_error.page.server",
            FileExports::new().with_hook("render", hook_fn(|_ctx: &PageContext| async {
                Ok(HookReturn::from(json!("<h1>raw</h1>")))
            })),
        )
        .unwrap();
    let source = Arc::new(CountingSource::new(pages));
    let recorder = Arc::new(Recorder::default());
    let config = RendererConfig::new().with_env(SsrEnv::new().with_reporter(recorder.clone()));
    let renderer = Renderer::new(source.clone()).with_config(config);

    let ctx = render(&renderer, "/about").await;
    assert!(ctx.http_response.is_none());
    assert!(ctx.error.as_ref().unwrap().as_hook_error().is_some());
    assert_eq!(source.scans(), 1);

    let reports = recorder.reports();
    assert_eq!(reports.len(), 2, "{:?}", reports);
    assert!(reports[0].contains("page failed"));
    assert!(reports[1].contains("plain string"));
}

#[tokio::test]
async fn test_from_json_argument_validation() {
    assert!(PageContextInit::from_json(Some(json!({"url": 1}))).unwrap_err().is_usage());
    let init = PageContextInit::from_json(Some(json!({"url": "/about", "locale": "de"}))).unwrap();
    let (renderer, _) = renderer_with_recorder(app());
    let ctx = renderer.render_page(init).await;
    assert_eq!(ctx.field("locale"), Some(&json!("de")));
}
