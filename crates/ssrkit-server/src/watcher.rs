// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching for dev reloads.
//!
//! [`FileWatcher`] debounces change events (750ms) under a directory and
//! reports the changed paths. [`reload_on_change`] wires it to a
//! [`Renderer`] so the next request reloads every page file.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use ssrkit::Renderer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

const DEBOUNCE: Duration = Duration::from_millis(750);

/// Watches a directory tree and reports changed files.
///
/// Watching stops when the value is dropped.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FileWatcher {
    /// Creates a watcher for `path`.
    ///
    /// `on_change` receives the changed paths relative to `path`. Editor
    /// swap files and hidden files are ignored.
    pub fn new<F>(path: &Path, on_change: F) -> Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let base_path = path.to_path_buf();

        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let mut changed_paths: Vec<PathBuf> = events
                    .iter()
                    .flat_map(|e| e.paths.iter())
                    .filter(|p| is_relevant(p))
                    .map(|p| p.strip_prefix(&base_path).unwrap_or(p).to_path_buf())
                    .collect();
                changed_paths.sort();
                changed_paths.dedup();

                if !changed_paths.is_empty() {
                    on_change(changed_paths);
                }
            }
            Err(errors) => {
                for err in errors {
                    tracing::warn!("File watcher error: {}", err);
                }
            }
        })?;

        debouncer.watch(path, RecursiveMode::Recursive)?;

        Ok(Self { _debouncer: debouncer })
    }
}

fn is_relevant(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !(name.starts_with('.') || name.ends_with('~') || name.ends_with(".swp"))
}

/// Invalidates the renderer's global context whenever `path` changes.
pub fn reload_on_change(path: &Path, renderer: Arc<Renderer>) -> Result<FileWatcher> {
    FileWatcher::new(path, move |paths| {
        let changed = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!("Reloading page files: {}", changed);
        renderer.invalidate();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevant_files() {
        assert!(is_relevant(Path::new("pages/index.page.server.rs")));
        assert!(is_relevant(Path::new("pages/about/index.md")));
        assert!(!is_relevant(Path::new("pages/.index.page.rs.swp")));
        assert!(!is_relevant(Path::new("pages/index.page.rs~")));
        assert!(!is_relevant(Path::new("pages/.DS_Store")));
    }

    #[test]
    fn test_watcher_starts_on_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FileWatcher::new(dir.path(), |_paths| {});
        assert!(watcher.is_ok());
    }

    #[test]
    fn test_watcher_fails_on_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FileWatcher::new(&dir.path().join("missing"), |_paths| {});
        assert!(watcher.is_err());
    }
}
