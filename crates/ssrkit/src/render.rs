// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The render pipeline.
//!
//! [`Renderer::render_page`] takes a request URL (plus caller fields) and
//! returns a [`PageContext`] whose `http_response` is either a response to
//! send or `None`, meaning the request is not ours and should fall through
//! to the next handler.
//!
//! ```text
//! validate ─▶ analyze URL ─▶ global context ─▶ route ─┬─▶ page files ─▶ onBeforeRender ─▶ render ─▶ 200
//!                                                      └─▶ error page (is404) ─────────────────────▶ 404
//! hook error anywhere ─▶ log once ─▶ error page ─▶ 500
//! any other error ─▶ log once ─▶ unhandled
//! ```
//!
//! Data requests (`/about.pageContext.json`) stop after `onBeforeRender()`
//! and get the serialized context as JSON.

use crate::assets::{asset_tags, AssetResolver, DevAssetResolver};
use crate::config::RendererConfig;
use crate::context::{PageAssetsAccessor, PageContext, PageContextInit};
use crate::diagnostics::{warn_404, warn_could_not_render_500, warn_missing_error_page};
use crate::env::SsrEnv;
use crate::error::{HookError, Result, SsrError};
use crate::global::{GlobalContext, GlobalContextCache};
use crate::hooks::{page_context_patch, render_output, run_hook, HookResult};
use crate::html::{inject_html, HtmlRender};
use crate::loader::PageFiles;
use crate::page_files::{is_error_page, PageFileSource};
use crate::response::{HttpResponse, StreamErrorHandler};
use crate::route::{route, RouteOutcome};
use crate::serialize::{
    escape_for_html_script, page_404_does_not_exist, serialize_page_context, server_side_error, stringify,
};
use crate::url::{analyze_url, parse_url, split_origin, validate_url, UrlAnalysis};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

/// Id of the `<script>` element holding the serialized page context.
pub const PAGE_CONTEXT_SCRIPT_ID: &str = "ssrkit_pageContext";

/// Keys every error page sends to the client.
const ERROR_PAGE_PASS_TO_CLIENT: &[&str] = &["pageProps", "is404"];

/// Server-side renderer. Cheap to share behind an `Arc`.
pub struct Renderer {
    source: Arc<dyn PageFileSource>,
    assets: Arc<dyn AssetResolver>,
    config: RendererConfig,
    global: GlobalContextCache,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("global", &self.global)
            .finish()
    }
}

impl Renderer {
    /// Renderer over the page files of `source`, with the default configuration.
    pub fn new(source: Arc<dyn PageFileSource>) -> Self {
        Self {
            source,
            assets: Arc::new(DevAssetResolver::default()),
            config: RendererConfig::default(),
            global: GlobalContextCache::new(),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: RendererConfig) -> Self {
        let env = config.env.clone().with_production(config.production);
        self.config = RendererConfig { env, ..config };
        self
    }

    /// Sets the asset resolver used by [`PageContext::get_page_assets`].
    pub fn with_asset_resolver(mut self, assets: Arc<dyn AssetResolver>) -> Self {
        self.assets = assets;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The environment descriptor.
    pub fn env(&self) -> &SsrEnv {
        &self.config.env
    }

    /// The global context, built on first use.
    ///
    /// Concurrent first calls share one discovery pass.
    pub async fn global_context(&self) -> Result<Arc<GlobalContext>> {
        self.global.get(self.source.as_ref()).await
    }

    /// Drops the cached global context and page loads.
    pub fn invalidate(&self) {
        self.global.invalidate();
    }

    /// Renders the page for `init`. Never fails.
    ///
    /// Hook errors are routed to the error page. Any other error is logged
    /// and turned into an unhandled response (`http_response == None`) with
    /// [`PageContext::error`] set. Nothing is attempted twice.
    pub async fn render_page(&self, init: PageContextInit) -> PageContext {
        if let Err(err) = validate_url(&init.url) {
            return self.unhandled(&init, err);
        }
        match self.render_page_inner(&init).await {
            Ok(ctx) => ctx,
            Err(err) => self.unhandled(&init, err),
        }
    }

    /// Like [`Renderer::render_page`], but errors that are not hook errors
    /// (invalid URL, usage errors, discovery failures) are returned.
    pub async fn try_render_page(&self, init: PageContextInit) -> Result<PageContext> {
        validate_url(&init.url)?;
        self.render_page_inner(&init).await
    }

    fn unhandled(&self, init: &PageContextInit, err: SsrError) -> PageContext {
        self.env().log_error(&err);
        let mut ctx = PageContext::new(init, false);
        ctx.error = Some(Arc::new(err));
        ctx
    }

    async fn render_page_inner(&self, init: &PageContextInit) -> Result<PageContext> {
        let mut ctx = PageContext::new(init, false);

        if ctx.url.ends_with("/favicon.ico") {
            return Ok(ctx);
        }
        let analysis = analyze_url(&ctx.url, &self.config.base_url);
        if !analysis.has_base_url {
            tracing::debug!("URL {} is outside of the base URL {}", ctx.url, self.config.base_url);
            return Ok(ctx);
        }
        add_computed_url_props(&mut ctx, &analysis);

        let global = self.global_context().await?;

        let mut status_code = 200;
        match route(&mut ctx, &global.page_routes, global.on_before_route.as_ref()).await? {
            RouteOutcome::HookError(err) => {
                return Ok(self.render_500_page_or_unhandled(init, err, &global).await);
            }
            RouteOutcome::Matched { page_id, route_params } => {
                ctx.page_id = Some(page_id);
                ctx.route_params = route_params;
            }
            RouteOutcome::Unmatched => {
                if !ctx.is_page_context_request {
                    warn_404(self.env(), &global, &ctx.url_pathname)?;
                }
                let Some(error_page_id) = global.error_page_id.clone() else {
                    warn_missing_error_page(self.env());
                    if ctx.is_page_context_request {
                        let body = stringify(&page_404_does_not_exist())?;
                        ctx.http_response = Some(HttpResponse::json(200, body));
                    }
                    return Ok(ctx);
                };
                ctx.page_id = Some(error_page_id);
                ctx.is_404 = Some(true);
                if !ctx.is_page_context_request {
                    status_code = 404;
                }
            }
        }

        let page_id = ctx.page_id.clone().unwrap_or_default();
        let page_files = global.page_files(&page_id).await?;
        self.attach_page_files(&mut ctx, page_files);

        if let HookResult::Failure(err) = self.execute_on_before_render(&mut ctx).await? {
            return Ok(self.render_500_page_or_unhandled(init, err, &global).await);
        }

        if ctx.is_page_context_request {
            let body = serialize_for_client(&ctx)?;
            ctx.http_response = Some(HttpResponse::json(200, body));
            return Ok(ctx);
        }

        if let HookResult::Failure(err) = self.execute_render(&mut ctx, status_code).await? {
            return Ok(self.render_500_page_or_unhandled(init, err, &global).await);
        }

        Ok(ctx)
    }

    /// Renders the error page for `err` with status 500.
    ///
    /// `err` is logged once. A hook failing while rendering the error page
    /// is logged too and yields a context without response.
    pub async fn render_500_page(&self, init: &PageContextInit, err: Arc<SsrError>) -> Result<PageContext> {
        let global = self.global_context().await?;
        self.render_500_page_with(init, err, &global).await
    }

    /// Error path of a failed hook. Any error raised while rendering the
    /// error page is logged and degrades to an unhandled response that
    /// keeps `err` as [`PageContext::error`].
    async fn render_500_page_or_unhandled(
        &self,
        init: &PageContextInit,
        err: HookError,
        global: &GlobalContext,
    ) -> PageContext {
        let err = Arc::new(SsrError::Hook(err));
        match self.render_500_page_with(init, err.clone(), global).await {
            Ok(ctx) => ctx,
            Err(secondary) => {
                self.env().log_error(&secondary);
                let mut ctx = PageContext::new(init, false);
                ctx.error = Some(err);
                ctx
            }
        }
    }

    async fn render_500_page_with(
        &self,
        init: &PageContextInit,
        err: Arc<SsrError>,
        global: &GlobalContext,
    ) -> Result<PageContext> {
        self.env().log_error(&err);

        let mut ctx = PageContext::new(init, false);
        let analysis = analyze_url(&ctx.url, &self.config.base_url);
        add_computed_url_props(&mut ctx, &analysis);
        ctx.is_404 = Some(false);
        ctx.error = Some(err);
        ctx.route_params.clear();

        if ctx.is_page_context_request {
            let body = stringify(&server_side_error())?;
            ctx.http_response = Some(HttpResponse::json(500, body));
            return Ok(ctx);
        }

        let Some(error_page_id) = global.error_page_id.clone() else {
            warn_missing_error_page(self.env());
            return Ok(ctx);
        };
        ctx.page_id = Some(error_page_id.clone());
        let page_files = global.page_files(&error_page_id).await?;
        self.attach_page_files(&mut ctx, page_files);

        if let HookResult::Failure(err) = self.execute_on_before_render(&mut ctx).await? {
            self.could_not_render_500(err);
            return Ok(ctx);
        }
        if let HookResult::Failure(err) = self.execute_render(&mut ctx, 500).await? {
            self.could_not_render_500(err);
            return Ok(ctx);
        }
        Ok(ctx)
    }

    fn could_not_render_500(&self, err: HookError) {
        warn_could_not_render_500(&err);
        self.env().log_error(&SsrError::Hook(err));
    }

    pub(crate) fn attach_page_files(&self, ctx: &mut PageContext, page_files: Arc<PageFiles>) {
        ctx.page = page_files.page.clone();
        ctx.page_exports = page_files.page_exports.clone();
        ctx.pass_to_client = page_files.pass_to_client.clone();
        if is_error_page(&page_files.page_id) {
            for key in ERROR_PAGE_PASS_TO_CLIENT {
                if !ctx.pass_to_client.iter().any(|k| k == key) {
                    ctx.pass_to_client.push(key.to_string());
                }
            }
            ctx.fill_error_page_props();
        }
        ctx.assets = Some(PageAssetsAccessor {
            resolver: self.assets.clone(),
            dependencies: page_files.dependencies.clone(),
            client_entry: page_files.page_client_path.clone(),
            is_pre_rendering: ctx.is_pre_rendering,
        });
        ctx.page_files = Some(page_files);
    }

    /// Runs `onBeforeRender()`, if any, and merges its patch.
    pub(crate) async fn execute_on_before_render(&self, ctx: &mut PageContext) -> Result<HookResult<()>> {
        let Some(page_files) = ctx.page_files.clone() else {
            return Ok(HookResult::Success(()));
        };
        let Some((hook, file_path)) = page_files.on_before_render_hook() else {
            return Ok(HookResult::Success(()));
        };
        let ret = match run_hook(hook.as_ref(), "onBeforeRender", file_path, ctx).await {
            HookResult::Success(ret) => ret,
            HookResult::Failure(err) => return Ok(HookResult::Failure(err)),
        };
        if let Some(patch) = page_context_patch(ret, "onBeforeRender", file_path)? {
            ctx.merge_patch(patch)?;
        }
        Ok(HookResult::Success(()))
    }

    /// Runs `render()` and sets the response with `status_code`.
    ///
    /// A `render()` returning nothing leaves the response unset.
    pub(crate) async fn execute_render(&self, ctx: &mut PageContext, status_code: u16) -> Result<HookResult<()>> {
        let page_files = ctx
            .page_files
            .clone()
            .ok_or_else(|| SsrError::usage("Page files must be loaded before `render()` runs."))?;
        let (hook, file_path) = page_files.render_hook().ok_or_else(|| {
            SsrError::usage(format!(
                "No `render()` hook found. Make sure to define `export {{ render }}` in `{}.page.server` or in a `_default.page.server` file.",
                page_files.page_id
            ))
        })?;

        let ret = match run_hook(hook.as_ref(), "render", file_path, ctx).await {
            HookResult::Success(ret) => ret,
            HookResult::Failure(err) => return Ok(HookResult::Failure(err)),
        };
        let output = render_output(ret, file_path)?;
        if let Some(patch) = output.patch {
            ctx.merge_patch(patch)?;
        }
        let Some(document) = output.document else {
            tracing::debug!("render() of {} returned no HTML for {}", file_path, ctx.url);
            return Ok(HookResult::Success(()));
        };

        let render = match document.into_render() {
            HtmlRender::String(html) => HtmlRender::String(self.inject_page_context(ctx, &html).await?),
            streaming => streaming,
        };
        let handler = StreamErrorHandler::new(self.env().clone(), file_path);
        ctx.http_response = Some(HttpResponse::html(status_code, render, file_path, handler));
        Ok(HookResult::Success(()))
    }

    /// Injects the page assets and the serialized context into `html`.
    async fn inject_page_context(&self, ctx: &PageContext, html: &str) -> Result<String> {
        let assets = ctx.get_page_assets().await?;
        let (head, scripts) = asset_tags(&assets);
        let serialized = escape_for_html_script(&serialize_for_client(ctx)?);
        let body_end = format!(
            "<script id=\"{}\" type=\"application/json\">{}</script>\n{}",
            PAGE_CONTEXT_SCRIPT_ID, serialized, scripts
        );
        Ok(inject_html(html, &head, &body_end))
    }
}

pub(crate) fn add_computed_url_props(ctx: &mut PageContext, analysis: &UrlAnalysis) {
    let mut url_parsed = parse_url(&analysis.url_normalized);
    url_parsed.origin = split_origin(&ctx.url).0;
    ctx.url_normalized = analysis.url_normalized.clone();
    ctx.url_pathname = url_parsed.pathname.clone();
    ctx.url_parsed = url_parsed;
    ctx.is_page_context_request = analysis.is_page_context_request;
}

/// `{"pageContext": {...}}` with `_pageId` and the keys listed in `passToClient`.
pub(crate) fn serialize_for_client(ctx: &PageContext) -> Result<String> {
    let mut entries = Map::new();
    if let Some(page_id) = &ctx.page_id {
        entries.insert("_pageId".to_string(), JsonValue::String(page_id.clone()));
    }
    for key in ctx.pass_to_client() {
        if let Some(value) = ctx.get_json(key) {
            entries.insert(key.clone(), value);
        }
    }
    serialize_page_context(entries)
}
