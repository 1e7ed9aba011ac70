// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Static pre-render writer.
//!
//! Renders every pre-renderable page and writes it below an output
//! directory:
//!
//! | URL      | HTML                                  | serialized context        |
//! |----------|---------------------------------------|---------------------------|
//! | `/`      | `index.html`                          | `index.pageContext.json`  |
//! | `/about` | `about/index.html` (or `about.html`)  | `about.pageContext.json`  |
//! | 404      | `404.html`                            |                           |
//!
//! The context files sit where the client router requests them. Any hook
//! error aborts the whole run.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use ssrkit::url::page_context_request_url;
use ssrkit::{PrerenderResult, Renderer};

use crate::error::{Result, ServerError};

/// Options of a pre-render run.
#[derive(Debug, Clone)]
pub struct PrerenderOptions {
    /// Directory the files are written to.
    pub out_dir: PathBuf,
    /// Write `/about` to `about.html` instead of `about/index.html`.
    pub no_extra_dir: bool,
}

impl PrerenderOptions {
    /// Writes into `out_dir`, one directory per page.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            no_extra_dir: false,
        }
    }

    /// Sets whether pages get their own directory.
    pub fn with_no_extra_dir(mut self, no_extra_dir: bool) -> Self {
        self.no_extra_dir = no_extra_dir;
        self
    }
}

/// What a pre-render run wrote.
#[derive(Debug, Default)]
pub struct PrerenderSummary {
    /// Pre-rendered URLs, in render order.
    pub urls: Vec<String>,
    /// Every written file.
    pub files: Vec<PathBuf>,
    /// Whether `404.html` was written.
    pub wrote_404: bool,
}

/// Pre-renders every page of `renderer` to disk.
pub async fn prerender(renderer: &Renderer, options: &PrerenderOptions) -> Result<PrerenderSummary> {
    let contexts = renderer.collect_prerender_contexts().await?;
    tracing::info!("Pre-rendering {} page(s) to {}", contexts.len(), options.out_dir.display());

    let mut summary = PrerenderSummary::default();
    let mut outputs: HashMap<PathBuf, String> = HashMap::new();

    for prerender_ctx in &contexts {
        let result = renderer.prerender_page(prerender_ctx).await?;
        write_page(&result, options, &mut outputs, &mut summary).await?;
        summary.urls.push(result.url);
    }

    if let Some(result) = renderer.render_static_404_page().await? {
        let path = options.out_dir.join("404.html");
        write_file(&path, &result.document_html).await?;
        summary.files.push(path);
        summary.wrote_404 = true;
    }

    Ok(summary)
}

async fn write_page(
    result: &PrerenderResult,
    options: &PrerenderOptions,
    outputs: &mut HashMap<PathBuf, String>,
    summary: &mut PrerenderSummary,
) -> Result<()> {
    let html_path = options.out_dir.join(html_file(&result.url, options.no_extra_dir)?);
    claim_output(outputs, &html_path, &result.url)?;
    write_file(&html_path, &result.document_html).await?;
    summary.files.push(html_path);

    if let Some(serialized) = &result.page_context_serialized {
        let json_path = options.out_dir.join(page_context_file(&result.url)?);
        claim_output(outputs, &json_path, &result.url)?;
        write_file(&json_path, serialized).await?;
        summary.files.push(json_path);
    }

    Ok(())
}

fn claim_output(outputs: &mut HashMap<PathBuf, String>, path: &Path, url: &str) -> Result<()> {
    if let Some(first) = outputs.get(path) {
        return Err(ServerError::DuplicateOutput {
            first: first.clone(),
            second: url.to_string(),
            path: path.to_path_buf(),
        });
    }
    outputs.insert(path.to_path_buf(), url.to_string());
    Ok(())
}

async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// Pathname of `url`, checked to stay inside the output directory.
fn pathname(url: &str) -> Result<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let pathname = &url[..end];
    if !pathname.starts_with('/') {
        return Err(ServerError::InvalidUrl(url.to_string()));
    }
    let escapes = Path::new(pathname)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ServerError::InvalidUrl(url.to_string()));
    }
    Ok(pathname)
}

/// Relative HTML file path of `url`.
pub fn html_file(url: &str, no_extra_dir: bool) -> Result<PathBuf> {
    let pathname = pathname(url)?;
    let relative = if pathname.ends_with('/') {
        format!("{}index.html", pathname)
    } else if no_extra_dir {
        format!("{}.html", pathname)
    } else {
        format!("{}/index.html", pathname)
    };
    Ok(PathBuf::from(relative.trim_start_matches('/')))
}

/// Relative path of the serialized context file of `url`.
pub fn page_context_file(url: &str) -> Result<PathBuf> {
    let relative = page_context_request_url(pathname(url)?);
    Ok(PathBuf::from(relative.trim_start_matches('/')))
}
