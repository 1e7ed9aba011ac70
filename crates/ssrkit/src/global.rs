// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Global context: discovered page files and the compiled route table.
//!
//! Built once on first use and shared by every request. Per-page loads are
//! memoized too. [`GlobalContextCache::invalidate`] drops both, which is how
//! the dev server reloads after a file change.

use crate::error::Result;
use crate::loader::{load_page_files, PageFiles};
use crate::page_files::{AllPageFiles, PageFileSource};
use crate::route::{error_page_id, load_page_routes, OnBeforeRouteHook, PageRoutes};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

type PageFilesCell = Arc<OnceCell<Arc<PageFiles>>>;

/// Process-wide state shared by all requests.
pub struct GlobalContext {
    /// All discovered page files.
    pub all_page_files: AllPageFiles,
    /// Ids of all pages, sorted.
    pub all_page_ids: Vec<String>,
    /// The error page, if any.
    pub error_page_id: Option<String>,
    /// Compiled routes.
    pub page_routes: PageRoutes,
    /// Global `onBeforeRoute()` hook.
    pub on_before_route: Option<OnBeforeRouteHook>,
    page_files: Mutex<HashMap<String, PageFilesCell>>,
}

impl fmt::Debug for GlobalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalContext")
            .field("all_page_ids", &self.all_page_ids)
            .field("error_page_id", &self.error_page_id)
            .field("page_routes", &self.page_routes)
            .finish()
    }
}

impl GlobalContext {
    /// Discovers the page files and compiles routes.
    pub async fn load(source: &dyn PageFileSource) -> Result<Self> {
        let all_page_files = AllPageFiles::new(source.page_files().await?);
        let all_page_ids = all_page_files.page_ids();
        let error_page_id = error_page_id(&all_page_ids)?;
        let (page_routes, on_before_route) = load_page_routes(&all_page_files, &all_page_ids).await?;

        tracing::debug!(
            "Global context loaded: {} pages, {} routes",
            all_page_ids.len(),
            page_routes.len()
        );

        Ok(Self {
            all_page_files,
            all_page_ids,
            error_page_id,
            page_routes,
            on_before_route,
            page_files: Mutex::new(HashMap::new()),
        })
    }

    /// Loaded files of `page_id`, memoized.
    pub async fn page_files(&self, page_id: &str) -> Result<Arc<PageFiles>> {
        let cell = {
            let mut cache = self.page_files.lock().unwrap_or_else(PoisonError::into_inner);
            cache.entry(page_id.to_string()).or_default().clone()
        };
        let files = cell
            .get_or_try_init(|| async {
                load_page_files(&self.all_page_files, page_id).await.map(Arc::new)
            })
            .await?;
        Ok(files.clone())
    }

    /// Whether the app has pages other than the error page.
    pub fn has_routes(&self) -> bool {
        !self.page_routes.is_empty()
    }
}

/// Lazily built, invalidatable [`GlobalContext`].
#[derive(Default)]
pub struct GlobalContextCache {
    cell: Mutex<Arc<OnceCell<Arc<GlobalContext>>>>,
}

impl GlobalContextCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> MutexGuard<'_, Arc<OnceCell<Arc<GlobalContext>>>> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The global context, built on first call.
    ///
    /// A failed build is not cached; the next call retries.
    pub async fn get(&self, source: &dyn PageFileSource) -> Result<Arc<GlobalContext>> {
        let cell = self.current().clone();
        let ctx = cell
            .get_or_try_init(|| async { GlobalContext::load(source).await.map(Arc::new) })
            .await?;
        Ok(ctx.clone())
    }

    /// Drops the cached context. Requests in flight keep the one they hold.
    pub fn invalidate(&self) {
        *self.current() = Arc::new(OnceCell::new());
        tracing::debug!("Global context invalidated");
    }
}

impl fmt::Debug for GlobalContextCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalContextCache")
            .field("initialized", &self.current().initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::FileExports;
    use crate::page_files::MemoryPageFiles;

    fn source() -> MemoryPageFiles {
        MemoryPageFiles::new()
            .with_file("/pages/index.page", FileExports::new())
            .unwrap()
            .with_file("/pages/about.page", FileExports::new())
            .unwrap()
            .with_file("/pages/_error.page", FileExports::new())
            .unwrap()
            .with_file("/pages/_default.page.server", FileExports::new())
            .unwrap()
            .with_file("/pages/_default.page.client", FileExports::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_global_context_load() {
        let ctx = GlobalContext::load(&source()).await.unwrap();
        assert_eq!(ctx.all_page_ids, vec!["/pages/_error", "/pages/about", "/pages/index"]);
        assert_eq!(ctx.error_page_id.as_deref(), Some("/pages/_error"));
        assert_eq!(ctx.page_routes.len(), 2);
        assert!(ctx.has_routes());
    }

    #[tokio::test]
    async fn test_page_files_memoized() {
        let ctx = GlobalContext::load(&source()).await.unwrap();
        let a = ctx.page_files("/pages/about").await.unwrap();
        let b = ctx.page_files("/pages/about").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_cache_invalidate() {
        let source = source();
        let cache = GlobalContextCache::new();
        let first = cache.get(&source).await.unwrap();
        assert!(Arc::ptr_eq(&first, &cache.get(&source).await.unwrap()));

        source.add_file("/pages/contact.page", FileExports::new()).unwrap();
        cache.invalidate();
        let second = cache.get(&source).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.page_routes.len(), 3);
    }
}
