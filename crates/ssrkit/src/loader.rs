// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page file loader.
//!
//! Resolves everything the pipeline needs for one page id into a
//! [`PageFiles`] bundle: the component, its exports, the server hooks
//! (page-specific file and closest `_default` file), the client entry and
//! the list of context keys sent to the client.

use crate::error::{Result, SsrError};
use crate::exports::{Component, Export, FileExports, ServerExports};
use crate::hooks::Hook;
use crate::page_files::{find_default_file, find_page_file, AllPageFiles, FileKind, PageFile};
use std::fmt;
use std::sync::Arc;

/// A loaded `.page.server` file.
#[derive(Debug, Clone)]
pub struct ServerFile {
    /// Path of the file.
    pub file_path: String,
    /// Validated exports.
    pub exports: ServerExports,
}

impl ServerFile {
    async fn load(file: &PageFile) -> Result<Self> {
        let exports = file.load().await?;
        Ok(Self {
            file_path: file.file_path().to_string(),
            exports: ServerExports::from_exports(&exports, file.file_path())?,
        })
    }
}

/// Everything loaded for one page.
#[derive(Clone)]
pub struct PageFiles {
    /// Page id.
    pub page_id: String,
    /// The UI component (`Page` or `default` export).
    pub page: Option<Component>,
    /// Exports of the `.page` files, page-specific overriding default.
    pub page_exports: FileExports,
    /// Path of the page's `.page` file.
    pub page_main_file: Option<String>,
    /// Path of the closest `_default.page` file.
    pub page_main_file_default: Option<String>,
    /// The page's `.page.server` file.
    pub page_server_file: Option<ServerFile>,
    /// The closest `_default.page.server` file.
    pub page_server_file_default: Option<ServerFile>,
    /// Client entry of the page.
    pub page_client_path: String,
    /// Context keys sent to the client.
    pub pass_to_client: Vec<String>,
    /// Files the page depends on, for asset resolution.
    pub dependencies: Vec<String>,
}

impl fmt::Debug for PageFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFiles")
            .field("page_id", &self.page_id)
            .field("page_main_file", &self.page_main_file)
            .field("page_server_file", &self.page_server_file)
            .field("page_server_file_default", &self.page_server_file_default)
            .field("page_client_path", &self.page_client_path)
            .field("pass_to_client", &self.pass_to_client)
            .finish()
    }
}

impl PageFiles {
    fn server_files(&self) -> impl Iterator<Item = &ServerFile> {
        self.page_server_file.iter().chain(self.page_server_file_default.iter())
    }

    /// The `render()` hook and its file: page-specific first, then default.
    pub fn render_hook(&self) -> Option<(Arc<dyn Hook>, &str)> {
        self.server_files()
            .find_map(|file| file.exports.render.clone().map(|hook| (hook, file.file_path.as_str())))
    }

    /// The `onBeforeRender()` hook and its file: page-specific first, then default.
    pub fn on_before_render_hook(&self) -> Option<(Arc<dyn Hook>, &str)> {
        self.server_files().find_map(|file| {
            file.exports
                .on_before_render
                .clone()
                .map(|hook| (hook, file.file_path.as_str()))
        })
    }

    /// Whether the page opted out of pre-rendering.
    pub fn do_not_prerender(&self) -> bool {
        self.page_server_file
            .as_ref()
            .map(|file| file.exports.do_not_prerender)
            .unwrap_or(false)
    }
}

/// Loads the files of `page_id`.
pub async fn load_page_files(all_page_files: &AllPageFiles, page_id: &str) -> Result<PageFiles> {
    let main_files = all_page_files.files(FileKind::Page);
    let page_main = find_page_file(main_files, page_id);
    let page_main_default = find_default_file(main_files, page_id);

    let mut page_exports = FileExports::new();
    if let Some(file) = page_main_default {
        page_exports = page_exports.merged_with(&file.load().await?);
    }
    if let Some(file) = page_main {
        page_exports = page_exports.merged_with(&file.load().await?);
    }
    let page = ["Page", "default"].iter().find_map(|name| match page_exports.get(name) {
        Some(Export::Component(component)) => Some(component.clone()),
        _ => None,
    });

    let server_files = all_page_files.files(FileKind::PageServer);
    if server_files.is_empty() {
        return Err(SsrError::usage(
            "No `*.page.server` file found. Create a `_default.page.server` file or a `.page.server` file per page.",
        ));
    }
    let page_server_file = match find_page_file(server_files, page_id) {
        Some(file) => Some(ServerFile::load(file).await?),
        None => None,
    };
    let page_server_file_default = match find_default_file(server_files, page_id) {
        Some(file) => Some(ServerFile::load(file).await?),
        None => None,
    };
    if page_server_file.is_none() && page_server_file_default.is_none() {
        return Err(SsrError::usage(format!(
            "No `.page.server` file found for page `{}`. Create `{}.page.server` or a `_default.page.server` file in one of its parent directories.",
            page_id, page_id
        )));
    }

    let client_files = all_page_files.files(FileKind::PageClient);
    let page_client_path = find_page_file(client_files, page_id)
        .or_else(|| find_default_file(client_files, page_id))
        .map(|file| file.file_path().to_string())
        .ok_or_else(|| {
            SsrError::usage(format!(
                "No `*.page.client` file found for page `{}`. Create `{}.page.client` or a `_default.page.client` file.",
                page_id, page_id
            ))
        })?;

    let pass_to_client = page_server_file
        .as_ref()
        .and_then(|file| file.exports.pass_to_client.clone())
        .or_else(|| {
            page_server_file_default
                .as_ref()
                .and_then(|file| file.exports.pass_to_client.clone())
        })
        .unwrap_or_default();

    let page_main_file = page_main.map(|file| file.file_path().to_string());
    let page_main_file_default = page_main_default.map(|file| file.file_path().to_string());
    let mut dependencies: Vec<String> = Vec::new();
    for dep in page_main_file
        .iter()
        .chain(page_main_file_default.iter())
        .chain(std::iter::once(&page_client_path))
    {
        if !dependencies.contains(dep) {
            dependencies.push(dep.clone());
        }
    }

    tracing::debug!("Loaded page files of {}", page_id);

    Ok(PageFiles {
        page_id: page_id.to_string(),
        page,
        page_exports,
        page_main_file,
        page_main_file_default,
        page_server_file,
        page_server_file_default,
        page_client_path,
        pass_to_client,
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PageContext;
    use crate::hooks::{hook_fn, HookReturn};
    use serde_json::json;

    fn noop_hook() -> Arc<dyn Hook> {
        hook_fn(|_ctx: &PageContext| async { Ok(HookReturn::Nothing) })
    }

    fn file(path: &str, exports: FileExports) -> PageFile {
        PageFile::with_exports(path, exports).unwrap()
    }

    #[tokio::test]
    async fn test_load_page_files_with_defaults() {
        let all = AllPageFiles::new(vec![
            file("/pages/_default.page", FileExports::new().with("title", Export::Value(json!("base")))),
            file(
                "/pages/about.page",
                FileExports::new()
                    .with("Page", Export::component("About"))
                    .with("title", Export::Value(json!("About"))),
            ),
            file(
                "/pages/_default.page.server",
                FileExports::new()
                    .with_hook("render", noop_hook())
                    .with("passToClient", Export::strings(["pageProps"])),
            ),
            file("/pages/about.page.server", FileExports::new().with_hook("onBeforeRender", noop_hook())),
            file("/pages/_default.page.client", FileExports::new()),
        ]);

        let files = load_page_files(&all, "/pages/about").await.unwrap();
        assert_eq!(files.page_exports.to_json(), json!({"title": "About"}));
        assert_eq!(
            files.page.as_ref().and_then(|p| p.downcast_ref::<&str>()).copied(),
            Some("About")
        );
        assert_eq!(files.render_hook().unwrap().1, "/pages/_default.page.server");
        assert_eq!(files.on_before_render_hook().unwrap().1, "/pages/about.page.server");
        assert_eq!(files.page_client_path, "/pages/_default.page.client");
        assert_eq!(files.pass_to_client, vec!["pageProps".to_string()]);
        assert_eq!(
            files.dependencies,
            vec!["/pages/about.page", "/pages/_default.page", "/pages/_default.page.client"]
        );
    }

    #[tokio::test]
    async fn test_page_pass_to_client_overrides_default() {
        let all = AllPageFiles::new(vec![
            file("/pages/a.page", FileExports::new()),
            file("/pages/_default.page.server", FileExports::new().with("passToClient", Export::strings(["x"]))),
            file("/pages/a.page.server", FileExports::new().with("passToClient", Export::strings(["y"]))),
            file("/pages/a.page.client", FileExports::new()),
        ]);
        let files = load_page_files(&all, "/pages/a").await.unwrap();
        assert_eq!(files.pass_to_client, vec!["y".to_string()]);
        assert_eq!(files.page_client_path, "/pages/a.page.client");
    }

    #[tokio::test]
    async fn test_missing_server_and_client_files() {
        let all = AllPageFiles::new(vec![file("/pages/a.page", FileExports::new())]);
        let err = load_page_files(&all, "/pages/a").await.unwrap_err();
        assert!(err.to_string().contains("No `*.page.server` file found"));

        let all = AllPageFiles::new(vec![
            file("/pages/a.page", FileExports::new()),
            file("/pages/a.page.server", FileExports::new()),
        ]);
        let err = load_page_files(&all, "/pages/a").await.unwrap_err();
        assert!(err.to_string().contains("page.client"));
    }

    #[tokio::test]
    async fn test_invalid_server_export_fails_load() {
        let all = AllPageFiles::new(vec![
            file("/pages/a.page", FileExports::new()),
            file("/pages/a.page.server", FileExports::new().with("unknown", Export::Value(json!(1)))),
            file("/pages/a.page.client", FileExports::new()),
        ]);
        assert!(load_page_files(&all, "/pages/a").await.unwrap_err().is_usage());
    }
}
