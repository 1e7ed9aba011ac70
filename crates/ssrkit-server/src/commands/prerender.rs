// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Static pre-render command.

use console::style;
use ssrkit::PageFileSource;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::prerender::{prerender, PrerenderOptions};

/// Pre-renders every page into `[prerender] out_dir`.
pub async fn run(config: &Config, pages: Arc<dyn PageFileSource>) -> anyhow::Result<()> {
    let renderer = super::renderer(config, pages, config.render.production);
    let options = PrerenderOptions::new(config.out_dir()).with_no_extra_dir(config.prerender.no_extra_dir);

    let start = Instant::now();
    let summary = match prerender(&renderer, &options).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!(
                "  {} {}",
                style("✗").red(),
                style(format!("Pre-rendering failed: {}", e)).red()
            );
            return Err(e.into());
        }
    };

    for url in &summary.urls {
        println!("  {} {}", style("✓").green(), style(url).dim());
    }
    if summary.wrote_404 {
        println!("  {} {}", style("✓").green(), style("404.html").dim());
    }
    println!(
        "{} {} file(s) to {} {}",
        style("Wrote").green().bold(),
        summary.files.len(),
        options.out_dir.display(),
        style(format!("{}ms", start.elapsed().as_millis())).dim()
    );

    Ok(())
}
