// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pages of the demo app.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use ssrkit::{
    escape_inject, hook_fn, prerender_fn, BoxError, Export, FileExports, FileLoader, Hook, HookReturn,
    MemoryPageFiles, PageContext, PrerenderUrl,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PRODUCTS: [(&str, &str); 3] = [("1", "Teapot"), ("2", "Kettle"), ("3", "Mug")];

/// Registers every page of the app.
pub fn register(content_dir: &Path) -> ssrkit::Result<MemoryPageFiles> {
    let pages = MemoryPageFiles::new();

    pages.add_file(
        "/pages/_default.page.server",
        FileExports::new()
            .with_hook("render", layout())
            .with("passToClient", Export::strings(["pageProps"])),
    )?;
    pages.add_file("/pages/_default.page.client", FileExports::new())?;

    pages.add_file("/pages/index.page", FileExports::new())?;
    pages.add_file(
        "/pages/index.page.server",
        FileExports::new().with_hook("onBeforeRender", props("Home", "Welcome to the ssrkit demo.")),
    )?;

    pages.add_file("/pages/about.page", FileExports::new())?;
    pages.add_loader(
        "/pages/about.page.server",
        Arc::new(AboutPage {
            path: content_dir.join("about.txt"),
        }),
    )?;

    pages.add_file("/pages/product.page", FileExports::new())?;
    pages.add_file(
        "/pages/product.page.route",
        FileExports::new().with("default", Export::Value(json!("/product/:id"))),
    )?;
    pages.add_file(
        "/pages/product.page.server",
        FileExports::new()
            .with_hook("onBeforeRender", product())
            .with(
                "prerender",
                Export::Prerender(prerender_fn(|| async {
                    Ok(PRODUCTS
                        .iter()
                        .map(|(id, _)| PrerenderUrl::new(format!("/product/{}", id)))
                        .collect())
                })),
            ),
    )?;

    pages.add_file("/pages/_error.page", FileExports::new())?;

    Ok(pages)
}

/// Wraps `pageProps.title` and `pageProps.body` into the HTML shell.
fn layout() -> Arc<dyn Hook> {
    hook_fn(|ctx: &PageContext| {
        let props = ctx.page_props().cloned().unwrap_or(JsonValue::Null);
        let (title, body) = match props.get("is404").and_then(JsonValue::as_bool) {
            Some(true) => ("Page not found".to_string(), "This page could not be found.".to_string()),
            Some(false) => ("Internal error".to_string(), "Something went wrong.".to_string()),
            None => (text(&props, "title"), text(&props, "body")),
        };
        let doc = escape_inject()
            .template("<!DOCTYPE html><html><head><title>")
            .value(&title)
            .template("</title></head><body><nav><a href=\"/\">Home</a> <a href=\"/about\">About</a> <a href=\"/product/1\">Product</a></nav><h1>")
            .value(&title)
            .template("</h1><p>")
            .value(&body)
            .template("</p></body></html>")
            .build();
        async move { Ok(HookReturn::document(doc)) }
    })
}

fn text(props: &JsonValue, key: &str) -> String {
    props.get(key).and_then(JsonValue::as_str).unwrap_or_default().to_string()
}

fn props(title: &'static str, body: &'static str) -> Arc<dyn Hook> {
    hook_fn(move |_ctx: &PageContext| async move {
        Ok(HookReturn::page_context(json!({"pageProps": {"title": title, "body": body}})))
    })
}

fn product() -> Arc<dyn Hook> {
    hook_fn(|ctx: &PageContext| {
        let id = ctx.route_params.get("id").cloned().unwrap_or_default();
        async move {
            let (_, name) = PRODUCTS
                .iter()
                .find(|(product_id, _)| *product_id == id)
                .ok_or_else(|| BoxError::from(format!("No product with id {}", id)))?;
            Ok(HookReturn::page_context(json!({
                "pageProps": {"title": name, "body": format!("Product #{}", id)}
            })))
        }
    })
}

/// Server file whose text lives in `content/about.txt`, read again after
/// every reload.
struct AboutPage {
    path: PathBuf,
}

#[async_trait]
impl FileLoader for AboutPage {
    async fn load(&self) -> Result<FileExports, BoxError> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        let hook = hook_fn(move |_ctx: &PageContext| {
            let body = body.clone();
            async move { Ok(HookReturn::page_context(json!({"pageProps": {"title": "About", "body": body}}))) }
        });
        Ok(FileExports::new().with_hook("onBeforeRender", hook))
    }
}
