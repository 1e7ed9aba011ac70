// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development server command with page reloads.

use console::style;
use ssrkit::PageFileSource;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::server::{create_server, AppState};
use crate::watcher::reload_on_change;

/// Runs the development server.
///
/// Dev diagnostics are always on. Changes below `[dev] watch_dir` drop the
/// renderer's cached page files so the next request loads them again.
pub async fn run(config: &Config, pages: Arc<dyn PageFileSource>, quiet: bool) -> anyhow::Result<()> {
    let renderer = super::renderer(config, pages, false);

    let watch_dir = Path::new(&config.dev.watch_dir);
    let watcher = if watch_dir.is_dir() {
        Some(reload_on_change(watch_dir, renderer.clone())?)
    } else {
        tracing::warn!("Watch directory {} not found, page files won't reload", watch_dir.display());
        None
    };

    let state = Arc::new(AppState::new(renderer, &config.server.static_dir));
    let addr = config.addr();

    if !quiet {
        println!(
            "{} {}",
            style("Server:").cyan(),
            style(format!("http://{}", addr)).green().bold()
        );
        if watcher.is_some() {
            println!(
                "{} {}",
                style("Status:").cyan(),
                style(format!("Watching {} for changes...", watch_dir.display())).dim()
            );
        }
        println!();
    }

    create_server(&addr, state).await?;

    Ok(())
}
