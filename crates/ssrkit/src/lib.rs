// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # ssrkit
//!
//! Server-side rendering orchestration for Rust web servers.
//!
//! ssrkit sits between an HTTP server and the pages of an application. Given
//! a request URL it finds the page, runs the page's `onBeforeRender()` and
//! `render()` hooks and hands back a response envelope, or `None` when the
//! request is not a page request and should fall through to static files.
//!
//! ## Features
//!
//! - Filesystem routes, route strings (`/product/:id`) and route functions
//! - Error page fallback for 404 and 500, with errors logged exactly once
//! - Data requests (`/about.pageContext.json`) for client-side navigation
//! - String, stream and pipe bodies
//! - Pre-rendering to static HTML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ssrkit::{dangerously_skip_escape, hook_fn, FileExports, HookReturn, MemoryPageFiles};
//! use ssrkit::{PageContextInit, Renderer};
//! use std::sync::Arc;
//!
//! let pages = MemoryPageFiles::new();
//! pages.add_file("/pages/index.page", FileExports::new())?;
//! pages.add_file("/pages/_default.page.client", FileExports::new())?;
//! pages.add_file(
//!     "/pages/_default.page.server",
//!     FileExports::new().with_hook("render", hook_fn(|_ctx| async {
//!         Ok(HookReturn::document(dangerously_skip_escape("<html><body>Hi</body></html>")))
//!     })),
//! )?;
//!
//! let renderer = Renderer::new(Arc::new(pages));
//! let ctx = renderer.render_page(PageContextInit::new("/")).await;
//! let html = ctx.http_response.unwrap().get_body().await?;
//! ```

/// Page assets and asset resolvers.
pub mod assets;
/// Renderer configuration.
pub mod config;
/// The per-request page context.
pub mod context;
/// Developer-facing warnings.
pub mod diagnostics;
/// Environment descriptor and error reporting.
pub mod env;
/// Error types.
pub mod error;
/// Page file exports.
pub mod exports;
/// Process-wide global context.
pub mod global;
/// Hook executor.
pub mod hooks;
/// HTML document values.
pub mod html;
/// Page file loader.
pub mod loader;
/// Page file discovery.
pub mod page_files;
/// Pre-rendering.
pub mod prerender;
/// The render pipeline.
pub mod render;
/// Response envelope.
pub mod response;
/// Route resolution.
pub mod route;
/// Client-side page context serialization.
pub mod serialize;
/// URL analysis.
pub mod url;

pub use assets::{AssetResolver, AssetType, DevAssetResolver, ManifestAssetResolver, PageAsset, PreloadType};
pub use config::RendererConfig;
pub use context::{PageContext, PageContextInit};
pub use env::{DevServer, ErrorReporter, SsrEnv, TracingReporter};
pub use error::{BoxError, HookError, Result, SsrError, UsageError};
pub use exports::{Component, Export, FileExports, ServerExports};
pub use global::GlobalContext;
pub use hooks::{hook_fn, Hook, HookResult, HookReturn, HookValue};
pub use html::{dangerously_skip_escape, escape_inject, BodySink, DocumentHtml, HtmlStream};
pub use page_files::{FileKind, FileLoader, MemoryPageFiles, PageFile, PageFileSource};
pub use prerender::{
    on_before_prerender_fn, prerender_fn, OnBeforePrerenderHook, PrerenderContext, PrerenderHook, PrerenderResult,
    PrerenderUrl,
};
pub use render::Renderer;
pub use response::{BodyKind, BodyStream, HttpResponse};
pub use route::{route_fn, RouteFn, RouteMatch};
