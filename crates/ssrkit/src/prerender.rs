// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pre-rendering: rendering pages to static HTML at build time.
//!
//! Unlike live requests there is no error page fallback: any hook error is
//! returned to the caller, which is expected to abort the build.
//!
//! URLs to pre-render come from two places: pages with a static route, and
//! `prerender()` hooks returning URLs (optionally with their page context
//! already computed) for parameterized routes. A single `onBeforePrerender()`
//! hook may then rewrite the whole list.

use crate::context::{PageContext, PageContextInit};
use crate::error::{BoxError, HookError, Result, SsrError};
use crate::exports::ServerExports;
use crate::hooks::HookResult;
use crate::page_files::{find_default_files, FileKind};
use crate::render::{add_computed_url_props, serialize_for_client, Renderer};
use crate::route::{route, RouteOutcome};
use crate::url::analyze_url;
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// URL the static 404 page is rendered for.
pub const FAKE_404_URL: &str = "/fake-404-url";

/// One URL returned by a `prerender()` hook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrerenderUrl {
    /// URL to pre-render.
    pub url: String,
    /// Page context computed by the hook. `onBeforeRender()` is skipped when set.
    pub page_context: Option<Map<String, JsonValue>>,
}

impl PrerenderUrl {
    /// URL without precomputed context.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page_context: None,
        }
    }

    /// Attaches a precomputed page context.
    pub fn with_page_context(mut self, page_context: Map<String, JsonValue>) -> Self {
        self.page_context = Some(page_context);
        self
    }
}

/// `prerender()` hook of a page: lists the URLs of a parameterized route.
#[async_trait]
pub trait PrerenderHook: Send + Sync {
    /// URLs to pre-render.
    async fn urls(&self) -> std::result::Result<Vec<PrerenderUrl>, BoxError>;
}

struct PrerenderFn<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> PrerenderHook for PrerenderFn<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Vec<PrerenderUrl>, BoxError>> + Send + 'static,
{
    async fn urls(&self) -> std::result::Result<Vec<PrerenderUrl>, BoxError> {
        (self.f)().await
    }
}

/// Wraps a closure into a [`PrerenderHook`].
pub fn prerender_fn<F, Fut>(f: F) -> Arc<dyn PrerenderHook>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Vec<PrerenderUrl>, BoxError>> + Send + 'static,
{
    Arc::new(PrerenderFn { f, _fut: PhantomData })
}

/// A page about to be pre-rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrerenderContext {
    /// URL of the page.
    pub url: String,
    /// Page id, once routed.
    pub page_id: Option<String>,
    /// Route parameters.
    pub route_params: BTreeMap<String, String>,
    /// Whether a `prerender()` hook already provided the page context.
    pub page_context_already_provided: bool,
    /// Extra context fields.
    pub fields: Map<String, JsonValue>,
}

impl PrerenderContext {
    /// Context for `url`, routed later.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// `onBeforePrerender()` hook: receives and returns every page to pre-render.
#[async_trait]
pub trait OnBeforePrerenderHook: Send + Sync {
    /// Rewrites the list.
    async fn call(
        &self,
        contexts: Vec<PrerenderContext>,
    ) -> std::result::Result<Vec<PrerenderContext>, BoxError>;
}

struct OnBeforePrerenderFn<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> OnBeforePrerenderHook for OnBeforePrerenderFn<F, Fut>
where
    F: Fn(Vec<PrerenderContext>) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Vec<PrerenderContext>, BoxError>> + Send + 'static,
{
    async fn call(
        &self,
        contexts: Vec<PrerenderContext>,
    ) -> std::result::Result<Vec<PrerenderContext>, BoxError> {
        (self.f)(contexts).await
    }
}

/// Wraps a closure into an [`OnBeforePrerenderHook`].
pub fn on_before_prerender_fn<F, Fut>(f: F) -> Arc<dyn OnBeforePrerenderHook>
where
    F: Fn(Vec<PrerenderContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Vec<PrerenderContext>, BoxError>> + Send + 'static,
{
    Arc::new(OnBeforePrerenderFn { f, _fut: PhantomData })
}

/// Output of pre-rendering one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerenderResult {
    /// URL of the page.
    pub url: String,
    /// Materialized HTML.
    pub document_html: String,
    /// Serialized context for the client router, when it is used.
    pub page_context_serialized: Option<String>,
}

/// The `onBeforePrerender()` hook and the file defining it.
#[derive(Clone)]
pub struct LoadedOnBeforePrerender {
    /// The hook.
    pub hook: Arc<dyn OnBeforePrerenderHook>,
    /// File exporting it.
    pub file_path: String,
}

impl Renderer {
    /// Pre-renders one page. `prerender_ctx.page_id` must be set.
    pub async fn prerender_page(&self, prerender_ctx: &PrerenderContext) -> Result<PrerenderResult> {
        self.prerender(prerender_ctx, false).await
    }

    /// Pre-renders the error page as a static 404 page, if the app has one.
    pub async fn render_static_404_page(&self) -> Result<Option<PrerenderResult>> {
        let global = self.global_context().await?;
        let Some(error_page_id) = global.error_page_id.clone() else {
            return Ok(None);
        };
        let prerender_ctx = PrerenderContext {
            url: FAKE_404_URL.to_string(),
            page_id: Some(error_page_id),
            ..PrerenderContext::default()
        };
        self.prerender(&prerender_ctx, true).await.map(Some)
    }

    async fn prerender(&self, prerender_ctx: &PrerenderContext, is_404: bool) -> Result<PrerenderResult> {
        let page_id = prerender_ctx.page_id.clone().ok_or_else(|| {
            SsrError::Prerender(format!("{} isn't routed to a page", prerender_ctx.url))
        })?;
        let global = self.global_context().await?;

        let init = PageContextInit {
            url: prerender_ctx.url.clone(),
            extra: prerender_ctx.fields.clone(),
        };
        let mut ctx = PageContext::new(&init, true);
        let analysis = analyze_url(&ctx.url, &self.config().base_url);
        add_computed_url_props(&mut ctx, &analysis);
        ctx.page_id = Some(page_id.clone());
        ctx.route_params = prerender_ctx.route_params.clone();
        if is_404 {
            ctx.is_404 = Some(true);
        }
        let page_files = global.page_files(&page_id).await?;
        self.attach_page_files(&mut ctx, page_files);

        if !prerender_ctx.page_context_already_provided {
            if let HookResult::Failure(err) = self.execute_on_before_render(&mut ctx).await? {
                return Err(SsrError::Hook(err));
            }
        }
        if let HookResult::Failure(err) = self.execute_render(&mut ctx, if is_404 { 404 } else { 200 }).await? {
            return Err(SsrError::Hook(err));
        }

        let response = ctx.http_response.as_ref().ok_or_else(|| {
            SsrError::Prerender(format!(
                "the `render()` hook of page `{}` didn't return any HTML for `{}`",
                page_id, prerender_ctx.url
            ))
        })?;
        let document_html = response.get_body().await?;
        let page_context_serialized = if self.config().uses_client_router {
            Some(serialize_for_client(&ctx)?)
        } else {
            None
        };

        tracing::debug!("Pre-rendered {} ({})", prerender_ctx.url, page_id);

        Ok(PrerenderResult {
            url: prerender_ctx.url.clone(),
            document_html,
            page_context_serialized,
        })
    }

    /// The `onBeforePrerender()` hook. Only `_default.page.server` files may
    /// define it, and at most one of them.
    pub async fn load_on_before_prerender_hook(&self) -> Result<Option<LoadedOnBeforePrerender>> {
        let global = self.global_context().await?;
        let mut found: Option<LoadedOnBeforePrerender> = None;
        for file in find_default_files(global.all_page_files.files(FileKind::PageServer)) {
            let exports = ServerExports::from_exports(&file.load().await?, file.file_path())?;
            let Some(hook) = exports.on_before_prerender else {
                continue;
            };
            if let Some(existing) = &found {
                return Err(SsrError::usage(format!(
                    "There can be only one `onBeforePrerender()` hook. It is defined in both {} and {}.",
                    existing.file_path,
                    file.file_path()
                )));
            }
            found = Some(LoadedOnBeforePrerender {
                hook,
                file_path: file.file_path().to_string(),
            });
        }
        Ok(found)
    }

    /// Collects every page to pre-render: static routes plus the URLs of
    /// `prerender()` hooks, routed and passed through `onBeforePrerender()`.
    pub async fn collect_prerender_contexts(&self) -> Result<Vec<PrerenderContext>> {
        let global = self.global_context().await?;
        let mut contexts: Vec<PrerenderContext> = Vec::new();
        let mut skipped: BTreeSet<String> = BTreeSet::new();
        let mut provided: BTreeSet<String> = BTreeSet::new();

        for page_route in global.page_routes.routes() {
            let page_files = global.page_files(&page_route.page_id).await?;
            if page_files.do_not_prerender() {
                skipped.insert(page_route.page_id.clone());
                continue;
            }
            let prerender_hook = page_files
                .page_server_file
                .as_ref()
                .and_then(|file| file.exports.prerender.clone().map(|hook| (hook, file.file_path.clone())));
            if let Some((hook, file_path)) = prerender_hook {
                let urls = hook
                    .urls()
                    .await
                    .map_err(|err| SsrError::Hook(HookError::new(err, "prerender", file_path.clone())))?;
                for prerender_url in urls {
                    if contexts.iter().any(|c| c.url == prerender_url.url) {
                        return Err(SsrError::usage(format!(
                            "The `prerender()` hook exported by {} returned the URL `{}` which is already pre-rendered.",
                            file_path, prerender_url.url
                        )));
                    }
                    let mut prerender_ctx = PrerenderContext::new(prerender_url.url);
                    if let Some(fields) = prerender_url.page_context {
                        prerender_ctx.page_context_already_provided = true;
                        prerender_ctx.fields = fields;
                    }
                    contexts.push(prerender_ctx);
                }
                provided.insert(page_route.page_id.clone());
            }
        }

        for page_route in global.page_routes.routes() {
            if skipped.contains(&page_route.page_id) {
                continue;
            }
            match page_route.route_string() {
                Some(url) if page_route.is_static() => {
                    if !contexts.iter().any(|c| c.url == url) {
                        contexts.push(PrerenderContext {
                            url: url.to_string(),
                            page_id: Some(page_route.page_id.clone()),
                            ..PrerenderContext::default()
                        });
                    }
                }
                _ if provided.contains(&page_route.page_id) => {}
                _ => tracing::warn!(
                    "Cannot pre-render page `{}` because it has a non-static route and no `prerender()` hook returned its URLs.",
                    page_route.page_id
                ),
            }
        }

        for prerender_ctx in contexts.iter_mut().filter(|c| c.page_id.is_none()) {
            let mut ctx = PageContext::new(&PageContextInit::new(prerender_ctx.url.clone()), true);
            let analysis = analyze_url(&ctx.url, &self.config().base_url);
            add_computed_url_props(&mut ctx, &analysis);
            match route(&mut ctx, &global.page_routes, global.on_before_route.as_ref()).await? {
                RouteOutcome::Matched { page_id, route_params } => {
                    prerender_ctx.page_id = Some(page_id);
                    prerender_ctx.route_params = route_params;
                }
                RouteOutcome::Unmatched => {
                    return Err(SsrError::usage(format!(
                        "A `prerender()` hook returned the URL `{}` but it doesn't match the route of any of your pages.",
                        prerender_ctx.url
                    )))
                }
                RouteOutcome::HookError(err) => return Err(SsrError::Hook(err)),
            }
        }
        contexts.retain(|c| c.page_id.as_ref().map(|id| !skipped.contains(id)).unwrap_or(false));

        if let Some(on_before_prerender) = self.load_on_before_prerender_hook().await? {
            contexts = on_before_prerender.hook.call(contexts).await.map_err(|err| {
                SsrError::Hook(HookError::new(err, "onBeforePrerender", on_before_prerender.file_path.clone()))
            })?;
        }

        Ok(contexts)
    }
}
