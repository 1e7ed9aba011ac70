// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Production server command.
//!
//! No file watching; page files load once and stay cached.

use console::style;
use ssrkit::PageFileSource;
use std::sync::Arc;

use crate::config::Config;
use crate::server::{create_server, AppState};

/// Runs the production server.
pub async fn run(config: &Config, pages: Arc<dyn PageFileSource>) -> anyhow::Result<()> {
    let renderer = super::renderer(config, pages, true);

    // Fail on broken page files before accepting requests.
    let global = renderer.global_context().await?;
    tracing::info!("Loaded {} page(s)", global.all_page_ids.len());

    let state = Arc::new(AppState::new(renderer, &config.server.static_dir));
    let addr = config.addr();

    println!(
        "{} {}",
        style("Production server running at").green().bold(),
        style(format!("http://{}", addr)).cyan().underlined()
    );
    println!("{}", style("Press Ctrl+C to stop").dim());

    create_server(&addr, state).await?;

    Ok(())
}
