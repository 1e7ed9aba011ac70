// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Command implementations.
//!
//! - `dev`: serve with dev diagnostics and reload page files on change
//! - `serve`: serve in production
//! - `prerender`: write every page as static HTML

use std::sync::Arc;

use ssrkit::{PageFileSource, Renderer};

use crate::config::Config;

/// Development server command.
pub mod dev;
/// Static pre-render command.
pub mod prerender;
/// Production server command.
pub mod serve;

/// Renderer for `pages` configured from the `[render]` section.
pub fn renderer(config: &Config, pages: Arc<dyn PageFileSource>, production: bool) -> Arc<Renderer> {
    let renderer_config = config.renderer_config().with_production(production);
    Arc::new(Renderer::new(pages).with_config(renderer_config))
}
