// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route resolution.
//!
//! Every page gets one route:
//!
//! - a **filesystem route** derived from its page id
//!   (`/pages/product/index` → `/product`),
//! - or a **route string** exported by its `.page.route` file
//!   (`/product/:id`, `/docs/*`),
//! - or a **route function** exported by its `.page.route` file.
//!
//! Route strings and filesystem routes are matched with `matchit`, static
//! segments before parameters. Route functions are evaluated first: a
//! matching route function beats any route string, and among several
//! matching functions the highest precedence wins.
//!
//! An `onBeforeRoute()` hook exported by a `_default.page.route` file runs
//! before all of this and may pick the page itself.

use crate::context::PageContext;
use crate::error::{BoxError, HookError, Result, SsrError};
use crate::exports::Export;
use crate::hooks::{page_context_patch, run_hook, Hook, HookResult};
use crate::page_files::{find_default_files, is_error_page, AllPageFiles, FileKind};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

const CATCH_ALL_PARAM: &str = "__ssrkit_rest";

/// Result of a route function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    /// Whether the URL matches.
    pub is_match: bool,
    /// Higher precedence wins among matching route functions.
    pub precedence: i64,
    /// Parameters extracted from the URL.
    pub route_params: BTreeMap<String, String>,
}

impl RouteMatch {
    /// A match without parameters.
    pub fn matched() -> Self {
        Self {
            is_match: true,
            ..Self::default()
        }
    }

    /// No match.
    pub fn no_match() -> Self {
        Self::default()
    }

    /// Sets the precedence.
    pub fn with_precedence(mut self, precedence: i64) -> Self {
        self.precedence = precedence;
        self
    }

    /// Adds a route parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_params.insert(name.into(), value.into());
        self
    }
}

impl From<bool> for RouteMatch {
    fn from(is_match: bool) -> Self {
        Self {
            is_match,
            ..Self::default()
        }
    }
}

/// A route function deciding whether a URL belongs to its page.
#[async_trait]
pub trait RouteFn: Send + Sync {
    /// Matches the request.
    async fn matches(&self, ctx: &PageContext) -> std::result::Result<RouteMatch, BoxError>;

    /// Short description shown in 404 diagnostics.
    fn describe(&self) -> String {
        "route function".to_string()
    }
}

struct RouteFnClosure<F, Fut> {
    f: F,
    description: String,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> RouteFn for RouteFnClosure<F, Fut>
where
    F: Fn(&PageContext) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<RouteMatch, BoxError>> + Send + 'static,
{
    async fn matches(&self, ctx: &PageContext) -> std::result::Result<RouteMatch, BoxError> {
        (self.f)(ctx).await
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Wraps a closure into a [`RouteFn`]. `description` shows up in 404 diagnostics.
pub fn route_fn<F, Fut>(description: impl Into<String>, f: F) -> Arc<dyn RouteFn>
where
    F: Fn(&PageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<RouteMatch, BoxError>> + Send + 'static,
{
    Arc::new(RouteFnClosure {
        f,
        description: description.into(),
        _fut: PhantomData,
    })
}

/// Route defined by a `.page.route` file.
#[derive(Clone)]
pub enum RouteDef {
    /// Route string such as `/product/:id`.
    String(String),
    /// Route function.
    Function(Arc<dyn RouteFn>),
}

impl fmt::Debug for RouteDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDef::String(s) => f.debug_tuple("String").field(s).finish(),
            RouteDef::Function(func) => f.debug_tuple("Function").field(&func.describe()).finish(),
        }
    }
}

/// The route of one page.
#[derive(Debug, Clone)]
pub struct PageRoute {
    /// Page id.
    pub page_id: String,
    /// Route derived from the page id.
    pub filesystem_route: String,
    /// Route defined by the page's `.page.route` file, if any.
    pub route: Option<RouteDef>,
    /// Path of the `.page.route` file.
    pub route_file_path: Option<String>,
}

impl PageRoute {
    /// Route string matched by `matchit`, if the page has no route function.
    pub fn route_string(&self) -> Option<&str> {
        match &self.route {
            None => Some(&self.filesystem_route),
            Some(RouteDef::String(s)) => Some(s),
            Some(RouteDef::Function(_)) => None,
        }
    }

    /// Whether the route has no parameters (and can be pre-rendered as is).
    pub fn is_static(&self) -> bool {
        self.route_string()
            .map(|route| parse_segments(route).iter().all(|s| matches!(s, RouteSegment::Static(_))))
            .unwrap_or(false)
    }

    fn describe(&self) -> (String, &'static str) {
        match &self.route {
            None => (self.filesystem_route.clone(), "Filesystem Route"),
            Some(RouteDef::String(s)) => (s.clone(), "Route String"),
            Some(RouteDef::Function(func)) => (truncate(&func.describe(), 64), "Route Function"),
        }
    }
}

/// Segment of a route string.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteSegment {
    /// Literal segment.
    Static(String),
    /// `:name` parameter.
    Param(String),
    /// Trailing `*`.
    CatchAll,
}

impl RouteSegment {
    fn to_pattern(&self) -> String {
        match self {
            RouteSegment::Static(s) => s.replace('{', "{{").replace('}', "}}"),
            RouteSegment::Param(name) => format!("{{{}}}", name),
            RouteSegment::CatchAll => format!("{{*{}}}", CATCH_ALL_PARAM),
        }
    }
}

/// Splits a route string into segments.
pub fn parse_segments(route: &str) -> Vec<RouteSegment> {
    route
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if segment == "*" {
                RouteSegment::CatchAll
            } else if let Some(name) = segment.strip_prefix(':') {
                RouteSegment::Param(name.to_string())
            } else {
                RouteSegment::Static(segment.to_string())
            }
        })
        .collect()
}

/// Converts a route string to a `matchit` pattern.
pub fn route_to_pattern(route: &str) -> String {
    let segments: Vec<String> = parse_segments(route).iter().map(RouteSegment::to_pattern).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Filesystem route of `page_id`.
///
/// `pages`, `src` and `index` segments are dropped, then the directory
/// prefix shared by all pages is removed.
pub fn filesystem_route(page_id: &str, all_page_ids: &[String]) -> String {
    let segments = route_segments(page_id);
    let common = common_dir_prefix(all_page_ids);
    let rest = segments.get(common.len()..).unwrap_or(&[]);
    format!("/{}", rest.join("/"))
}

fn route_segments(page_id: &str) -> Vec<&str> {
    page_id
        .split('/')
        .filter(|s| !s.is_empty() && !matches!(*s, "pages" | "src" | "index"))
        .collect()
}

fn common_dir_prefix(all_page_ids: &[String]) -> Vec<&str> {
    let mut dirs = all_page_ids.iter().map(|id| {
        let mut segments = route_segments(id);
        if !id.ends_with("/index") {
            segments.pop();
        }
        segments
    });
    let Some(mut common) = dirs.next() else {
        return Vec::new();
    };
    for dir in dirs {
        let shared = common.iter().zip(dir.iter()).take_while(|(a, b)| a == b).count();
        common.truncate(shared);
    }
    common
}

fn normalize_pathname(pathname: &str) -> &str {
    if pathname.is_empty() || pathname == "/" {
        "/"
    } else {
        pathname.trim_end_matches('/')
    }
}

fn truncate(s: &str, len: usize) -> String {
    let one_line = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() <= len {
        one_line
    } else {
        format!("{}...", one_line.chars().take(len).collect::<String>())
    }
}

/// Compiled route table.
pub struct PageRoutes {
    routes: Vec<PageRoute>,
    matcher: matchit::Router<usize>,
}

impl fmt::Debug for PageRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRoutes").field("routes", &self.routes).finish()
    }
}

impl PageRoutes {
    /// Compiles the table. Static routes are registered before dynamic ones.
    pub fn new(mut routes: Vec<PageRoute>) -> Self {
        routes.sort_by(|a, b| {
            let a_static = a.is_static();
            let b_static = b.is_static();
            match (a_static, b_static) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                _ => a.page_id.cmp(&b.page_id),
            }
        });

        let mut matcher = matchit::Router::new();
        for (index, route) in routes.iter().enumerate() {
            let Some(route_string) = route.route_string() else {
                continue;
            };
            let pattern = route_to_pattern(route_string);
            if let Err(e) = matcher.insert(pattern.as_str(), index) {
                tracing::warn!("Could not register route {} of {}: {}", route_string, route.page_id, e);
            }
        }

        Self { routes, matcher }
    }

    /// All page routes.
    pub fn routes(&self) -> &[PageRoute] {
        &self.routes
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether there are no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route of `page_id`.
    pub fn get(&self, page_id: &str) -> Option<&PageRoute> {
        self.routes.iter().find(|route| route.page_id == page_id)
    }

    /// Matches `pathname` against route strings and filesystem routes.
    pub fn match_pathname(&self, pathname: &str) -> Option<(String, BTreeMap<String, String>)> {
        let matched = self.matcher.at(normalize_pathname(pathname)).ok()?;
        let route = &self.routes[*matched.value];
        let params = matched
            .params
            .iter()
            .map(|(k, v)| {
                let key = if k == CATCH_ALL_PARAM { "*" } else { k };
                (key.to_string(), v.to_string())
            })
            .collect();
        Some((route.page_id.clone(), params))
    }

    /// Numbered, sorted list of routes for diagnostics.
    pub fn describe(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .routes
            .iter()
            .map(|route| {
                let (display, route_type) = route.describe();
                format!("`{}` ({} of `{}.page.*`)", display, route_type, route.page_id)
            })
            .collect();
        lines.sort();
        let width = lines.len().to_string().len();
        lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| format!(" ({:0width$}) {}", i + 1, line, width = width))
            .collect()
    }
}

/// The `onBeforeRoute()` hook and the file defining it.
#[derive(Clone)]
pub struct OnBeforeRouteHook {
    /// The hook.
    pub hook: Arc<dyn Hook>,
    /// File exporting it.
    pub file_path: String,
}

impl fmt::Debug for OnBeforeRouteHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnBeforeRouteHook").field("file_path", &self.file_path).finish()
    }
}

/// Loads `.page.route` files and compiles the route table.
pub async fn load_page_routes(
    all_page_files: &AllPageFiles,
    all_page_ids: &[String],
) -> Result<(PageRoutes, Option<OnBeforeRouteHook>)> {
    let route_files = all_page_files.files(FileKind::PageRoute);
    let routable: Vec<String> = all_page_ids.iter().filter(|id| !is_error_page(id)).cloned().collect();

    let mut routes = Vec::new();
    for page_id in &routable {
        let mut page_route = PageRoute {
            page_id: page_id.clone(),
            filesystem_route: filesystem_route(page_id, &routable),
            route: None,
            route_file_path: None,
        };
        if let Some(file) = route_files.iter().find(|f| !f.is_default() && f.page_id() == page_id) {
            let exports = file.load().await?;
            let route = match exports.get("default") {
                Some(Export::Value(JsonValue::String(s))) => RouteDef::String(s.clone()),
                Some(Export::Route(func)) => RouteDef::Function(func.clone()),
                _ => {
                    return Err(SsrError::usage(format!(
                        "{} should `export default` a route string or a route function.",
                        file.file_path()
                    )))
                }
            };
            if let RouteDef::String(s) = &route {
                if !s.starts_with('/') {
                    return Err(SsrError::usage(format!(
                        "The route string `{}` of {} should start with `/`.",
                        s,
                        file.file_path()
                    )));
                }
            }
            page_route.route = Some(route);
            page_route.route_file_path = Some(file.file_path().to_string());
        }
        routes.push(page_route);
    }

    let mut on_before_route = None;
    for file in find_default_files(route_files) {
        let exports = file.load().await?;
        for (name, export) in exports.iter() {
            match (name, export) {
                ("onBeforeRoute", Export::Hook(hook)) => {
                    if on_before_route.is_some() {
                        return Err(SsrError::usage(
                            "There can be only one `onBeforeRoute()` hook across all `_default.page.route` files.",
                        ));
                    }
                    on_before_route = Some(OnBeforeRouteHook {
                        hook: hook.clone(),
                        file_path: file.file_path().to_string(),
                    });
                }
                _ => {
                    return Err(SsrError::usage(format!(
                        "{} should only export an `onBeforeRoute()` hook, found `{}`.",
                        file.file_path(),
                        name
                    )))
                }
            }
        }
    }

    Ok((PageRoutes::new(routes), on_before_route))
}

/// Outcome of routing one request.
#[derive(Debug)]
pub enum RouteOutcome {
    /// A page matched.
    Matched {
        /// Matched page id.
        page_id: String,
        /// Route parameters.
        route_params: BTreeMap<String, String>,
    },
    /// No page matched.
    Unmatched,
    /// A route function or `onBeforeRoute()` threw.
    HookError(HookError),
}

/// Routes `ctx.url_pathname`.
pub async fn route(
    ctx: &mut PageContext,
    page_routes: &PageRoutes,
    on_before_route: Option<&OnBeforeRouteHook>,
) -> Result<RouteOutcome> {
    if let Some(on_before_route) = on_before_route {
        match run_hook(on_before_route.hook.as_ref(), "onBeforeRoute", &on_before_route.file_path, ctx).await {
            HookResult::Failure(err) => return Ok(RouteOutcome::HookError(err)),
            HookResult::Success(ret) => {
                if let Some(mut patch) = page_context_patch(ret, "onBeforeRoute", &on_before_route.file_path)? {
                    let decision = patch.remove("_pageId");
                    ctx.merge_patch(patch)?;
                    match decision {
                        Some(JsonValue::Null) => return Ok(RouteOutcome::Unmatched),
                        Some(JsonValue::String(page_id)) => {
                            if page_routes.get(&page_id).is_none() {
                                return Err(SsrError::usage(format!(
                                    "The `onBeforeRoute()` hook exported by {} returned `{{ pageContext: {{ _pageId: '{}' }} }}` but no page has that id.",
                                    on_before_route.file_path, page_id
                                )));
                            }
                            return Ok(RouteOutcome::Matched {
                                page_id,
                                route_params: ctx.route_params.clone(),
                            });
                        }
                        Some(_) => {
                            return Err(SsrError::usage(format!(
                                "The `onBeforeRoute()` hook exported by {} should return `_pageId` as a string or `null`.",
                                on_before_route.file_path
                            )))
                        }
                        None => {}
                    }
                }
            }
        }
    }

    let mut best: Option<(i64, &PageRoute, BTreeMap<String, String>)> = None;
    for page_route in page_routes.routes() {
        let Some(RouteDef::Function(func)) = &page_route.route else {
            continue;
        };
        let file_path = page_route.route_file_path.as_deref().unwrap_or(&page_route.page_id);
        let result = match func.matches(ctx).await {
            Ok(result) => result,
            Err(err) => return Ok(RouteOutcome::HookError(HookError::new(err, "route", file_path))),
        };
        if !result.is_match {
            continue;
        }
        let better = match &best {
            None => true,
            Some((precedence, _, _)) => result.precedence > *precedence,
        };
        if better {
            best = Some((result.precedence, page_route, result.route_params));
        }
    }
    if let Some((_, page_route, route_params)) = best {
        return Ok(RouteOutcome::Matched {
            page_id: page_route.page_id.clone(),
            route_params,
        });
    }

    match page_routes.match_pathname(&ctx.url_pathname) {
        Some((page_id, route_params)) => Ok(RouteOutcome::Matched { page_id, route_params }),
        None => Ok(RouteOutcome::Unmatched),
    }
}

/// The error page id, if the app has one.
pub fn error_page_id(all_page_ids: &[String]) -> Result<Option<String>> {
    let error_pages: Vec<&String> = all_page_ids.iter().filter(|id| is_error_page(id)).collect();
    match error_pages.as_slice() {
        [] => Ok(None),
        [page_id] => Ok(Some((*page_id).clone())),
        _ => Err(SsrError::usage(format!(
            "Only one `_error.page` file is allowed but found {}.",
            error_pages.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn fs_route(page_id: &str, all: &[String]) -> PageRoute {
        PageRoute {
            page_id: page_id.to_string(),
            filesystem_route: filesystem_route(page_id, all),
            route: None,
            route_file_path: None,
        }
    }

    #[test]
    fn test_filesystem_route() {
        let all = ids(&["/pages/index", "/pages/about", "/pages/product/index", "/pages/blog/post"]);
        assert_eq!(filesystem_route("/pages/index", &all), "/");
        assert_eq!(filesystem_route("/pages/about", &all), "/about");
        assert_eq!(filesystem_route("/pages/product/index", &all), "/product");
        assert_eq!(filesystem_route("/pages/blog/post", &all), "/blog/post");
    }

    #[test]
    fn test_filesystem_route_common_prefix() {
        let all = ids(&["/renderer/app/about", "/renderer/app/contact"]);
        assert_eq!(filesystem_route("/renderer/app/about", &all), "/about");
        let single = ids(&["/pages/about"]);
        assert_eq!(filesystem_route("/pages/about", &single), "/about");
    }

    #[test]
    fn test_route_to_pattern() {
        assert_eq!(route_to_pattern("/"), "/");
        assert_eq!(route_to_pattern("/product/:id"), "/product/{id}");
        assert_eq!(route_to_pattern("/docs/*"), "/docs/{*__ssrkit_rest}");
    }

    #[test]
    fn test_match_pathname() {
        let all = ids(&["/pages/index", "/pages/about"]);
        let mut routes = vec![fs_route("/pages/index", &all), fs_route("/pages/about", &all)];
        routes.push(PageRoute {
            page_id: "/pages/product".to_string(),
            filesystem_route: "/product".to_string(),
            route: Some(RouteDef::String("/product/:id".to_string())),
            route_file_path: Some("/pages/product.page.route".to_string()),
        });
        routes.push(PageRoute {
            page_id: "/pages/docs".to_string(),
            filesystem_route: "/docs".to_string(),
            route: Some(RouteDef::String("/docs/*".to_string())),
            route_file_path: Some("/pages/docs.page.route".to_string()),
        });
        let table = PageRoutes::new(routes);

        assert_eq!(table.match_pathname("/").unwrap().0, "/pages/index");
        assert_eq!(table.match_pathname("/about/").unwrap().0, "/pages/about");

        let (page_id, params) = table.match_pathname("/product/42").unwrap();
        assert_eq!(page_id, "/pages/product");
        assert_eq!(params.get("id").map(String::as_str), Some("42"));

        let (_, params) = table.match_pathname("/docs/guide/intro").unwrap();
        assert_eq!(params.get("*").map(String::as_str), Some("guide/intro"));

        assert!(table.match_pathname("/missing").is_none());
        assert!(table.match_pathname("/product").is_none());
    }

    #[test]
    fn test_describe_routes() {
        let all = ids(&["/pages/index", "/pages/about"]);
        let table = PageRoutes::new(vec![fs_route("/pages/index", &all), fs_route("/pages/about", &all)]);
        let lines = table.describe();
        assert_eq!(lines[0], " (1) `/` (Filesystem Route of `/pages/index.page.*`)");
        assert_eq!(lines[1], " (2) `/about` (Filesystem Route of `/pages/about.page.*`)");
    }

    #[test]
    fn test_error_page_id() {
        assert_eq!(error_page_id(&ids(&["/pages/a"])).unwrap(), None);
        assert_eq!(
            error_page_id(&ids(&["/pages/a", "/pages/_error"])).unwrap(),
            Some("/pages/_error".to_string())
        );
        assert!(error_page_id(&ids(&["/a/_error", "/b/_error"])).is_err());
    }

    #[test]
    fn test_is_static() {
        let all = ids(&["/pages/about"]);
        assert!(fs_route("/pages/about", &all).is_static());
        let dynamic = PageRoute {
            page_id: "/pages/p".into(),
            filesystem_route: "/p".into(),
            route: Some(RouteDef::String("/p/:id".into())),
            route_file_path: None,
        };
        assert!(!dynamic.is_static());
    }
}
