// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page file discovery.
//!
//! Page files follow a naming convention:
//!
//! | file | kind |
//! |---|---|
//! | `/pages/about.page` | [`FileKind::Page`] (the component) |
//! | `/pages/about.page.server` | [`FileKind::PageServer`] (server hooks) |
//! | `/pages/about.page.client` | [`FileKind::PageClient`] (client entry) |
//! | `/pages/about.page.route` | [`FileKind::PageRoute`] (route string or function) |
//!
//! An optional extension may follow (`about.page.server.ts`). The page id is
//! the path up to `.page` (`/pages/about`). Files named `_default.page.*`
//! apply to every page in their directory and below; the closest one wins.
//!
//! Discovery is abstracted by [`PageFileSource`]. [`MemoryPageFiles`] keeps
//! the files in memory, which is how applications register pages in code.

use crate::error::{BoxError, Result, SsrError};
use crate::exports::FileExports;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Kind of a page file, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `.page`: the UI component.
    Page,
    /// `.page.server`: server-side hooks.
    PageServer,
    /// `.page.client`: client entry.
    PageClient,
    /// `.page.route`: route string or route function.
    PageRoute,
}

impl FileKind {
    /// All kinds.
    pub const ALL: [FileKind; 4] = [
        FileKind::Page,
        FileKind::PageServer,
        FileKind::PageClient,
        FileKind::PageRoute,
    ];

    /// Suffix of the kind, e.g. `.page.server`.
    pub fn suffix(&self) -> &'static str {
        match self {
            FileKind::Page => ".page",
            FileKind::PageServer => ".page.server",
            FileKind::PageClient => ".page.client",
            FileKind::PageRoute => ".page.route",
        }
    }

    /// Detects the kind of `file_path`.
    pub fn from_path(file_path: &str) -> Option<FileKind> {
        let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
        let idx = file_name.find(".page")?;
        let rest = &file_name[idx + ".page".len()..];
        let mut parts = rest.split('.').skip(1);
        match parts.next() {
            Some("server") => Some(FileKind::PageServer),
            Some("client") => Some(FileKind::PageClient),
            Some("route") => Some(FileKind::PageRoute),
            _ if rest.is_empty() || rest.starts_with('.') => Some(FileKind::Page),
            _ => None,
        }
    }
}

/// Loads the exports of one page file.
#[async_trait]
pub trait FileLoader: Send + Sync {
    /// Loads (imports) the file.
    async fn load(&self) -> std::result::Result<FileExports, BoxError>;
}

/// Loader returning exports that are already in memory.
#[derive(Clone)]
pub struct StaticLoader(FileExports);

#[async_trait]
impl FileLoader for StaticLoader {
    async fn load(&self) -> std::result::Result<FileExports, BoxError> {
        Ok(self.0.clone())
    }
}

/// A discovered page file.
#[derive(Clone)]
pub struct PageFile {
    file_path: String,
    kind: FileKind,
    page_id: String,
    loader: Arc<dyn FileLoader>,
}

impl fmt::Debug for PageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFile")
            .field("file_path", &self.file_path)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PageFile {
    /// Creates a page file. Fails if the name does not follow the convention.
    pub fn new(file_path: impl Into<String>, loader: Arc<dyn FileLoader>) -> Result<Self> {
        let file_path = file_path.into();
        let kind = FileKind::from_path(&file_path).ok_or_else(|| {
            SsrError::usage(format!(
                "{} is not a page file: its name should contain `.page`, `.page.server`, `.page.client` or `.page.route`.",
                file_path
            ))
        })?;
        if !file_path.starts_with('/') {
            return Err(SsrError::usage(format!(
                "Page file path {} should start with `/`.",
                file_path
            )));
        }
        let page_id = compute_page_id(&file_path);
        Ok(Self {
            file_path,
            kind,
            page_id,
            loader,
        })
    }

    /// Creates a page file from in-memory exports.
    pub fn with_exports(file_path: impl Into<String>, exports: FileExports) -> Result<Self> {
        Self::new(file_path, Arc::new(StaticLoader(exports)))
    }

    /// Path of the file.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Kind of the file.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Page id: the path up to `.page`.
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Whether this is a `_default.page.*` file.
    pub fn is_default(&self) -> bool {
        is_default_page_id(&self.page_id)
    }

    /// Loads the file's exports.
    pub async fn load(&self) -> Result<FileExports> {
        self.loader
            .load()
            .await
            .map_err(|err| SsrError::Discovery(format!("Failed to load {}: {}", self.file_path, err)))
    }
}

/// Page id of `file_path`.
pub fn compute_page_id(file_path: &str) -> String {
    let dir_end = file_path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match file_path[dir_end..].find(".page") {
        Some(idx) => file_path[..dir_end + idx].to_string(),
        None => file_path.to_string(),
    }
}

/// Whether the page id names a `_default` file.
pub fn is_default_page_id(page_id: &str) -> bool {
    last_segment(page_id).starts_with("_default")
}

/// Whether the page id names the error page (`_error`).
pub fn is_error_page(page_id: &str) -> bool {
    last_segment(page_id) == "_error"
}

fn last_segment(page_id: &str) -> &str {
    page_id.rsplit('/').next().unwrap_or(page_id)
}

/// Directory a `_default` file applies to, with trailing slash.
fn default_file_dir(page_id: &str) -> &str {
    match page_id.rfind('/') {
        Some(i) => &page_id[..=i],
        None => "",
    }
}

/// All discovered page files, grouped by kind.
#[derive(Clone, Debug, Default)]
pub struct AllPageFiles {
    by_kind: HashMap<FileKind, Vec<PageFile>>,
}

impl AllPageFiles {
    /// Groups `files` by kind. Within a kind, files are sorted by path.
    pub fn new(files: impl IntoIterator<Item = PageFile>) -> Self {
        let mut by_kind: HashMap<FileKind, Vec<PageFile>> = HashMap::new();
        for file in files {
            by_kind.entry(file.kind()).or_default().push(file);
        }
        for files in by_kind.values_mut() {
            files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        }
        Self { by_kind }
    }

    /// Files of one kind.
    pub fn files(&self, kind: FileKind) -> &[PageFile] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of all pages: every non-default `.page` file.
    pub fn page_ids(&self) -> Vec<String> {
        self.files(FileKind::Page)
            .iter()
            .filter(|file| !file.is_default())
            .map(|file| file.page_id().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// The page-specific file of `page_id`.
pub fn find_page_file<'a>(files: &'a [PageFile], page_id: &str) -> Option<&'a PageFile> {
    files.iter().find(|file| !file.is_default() && file.page_id() == page_id)
}

/// All `_default` files.
pub fn find_default_files(files: &[PageFile]) -> Vec<&PageFile> {
    files.iter().filter(|file| file.is_default()).collect()
}

/// The `_default` file closest to `page_id`.
pub fn find_default_file<'a>(files: &'a [PageFile], page_id: &str) -> Option<&'a PageFile> {
    files
        .iter()
        .filter(|file| file.is_default())
        .filter(|file| page_id.starts_with(default_file_dir(file.page_id())))
        .max_by_key(|file| default_file_dir(file.page_id()).len())
}

/// Page file discovery service.
#[async_trait]
pub trait PageFileSource: Send + Sync {
    /// Lists all page files.
    async fn page_files(&self) -> Result<Vec<PageFile>>;
}

/// In-memory page file registry.
#[derive(Clone, Default)]
pub struct MemoryPageFiles {
    files: Arc<Mutex<Vec<PageFile>>>,
}

impl MemoryPageFiles {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, Vec<PageFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a file with in-memory exports, replacing a file with the same path.
    pub fn add_file(&self, file_path: &str, exports: FileExports) -> Result<()> {
        self.add(PageFile::with_exports(file_path, exports)?);
        Ok(())
    }

    /// Registers a file with a custom loader.
    pub fn add_loader(&self, file_path: &str, loader: Arc<dyn FileLoader>) -> Result<()> {
        self.add(PageFile::new(file_path, loader)?);
        Ok(())
    }

    /// Registers a page file, replacing a file with the same path.
    pub fn add(&self, file: PageFile) {
        let mut files = self.files();
        files.retain(|existing| existing.file_path() != file.file_path());
        files.push(file);
    }

    /// Builder variant of [`MemoryPageFiles::add_file`].
    pub fn with_file(self, file_path: &str, exports: FileExports) -> Result<Self> {
        self.add_file(file_path, exports)?;
        Ok(self)
    }

    /// Removes a file.
    pub fn remove_file(&self, file_path: &str) {
        self.files().retain(|file| file.file_path() != file_path);
    }

    /// Removes all files.
    pub fn clear(&self) {
        self.files().clear();
    }
}

#[async_trait]
impl PageFileSource for MemoryPageFiles {
    async fn page_files(&self) -> Result<Vec<PageFile>> {
        Ok(self.files().clone())
    }
}
