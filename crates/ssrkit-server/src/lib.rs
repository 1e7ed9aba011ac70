// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! ssrkit server library.
//!
//! Hosts an [`ssrkit::Renderer`] behind an axum server and writes
//! pre-rendered pages to disk.
//!
//! # Features
//!
//! - **Fallback handler** that renders pages and falls through to static files
//! - **Dev mode** with a file watcher that reloads page files on change
//! - **Pre-rendering** of every page to `index.html` plus its serialized context
//!
//! # Usage
//!
//! Applications register their pages and hand the renderer to a command:
//!
//! ```rust,ignore
//! let renderer = Arc::new(Renderer::new(Arc::new(pages)));
//! ssrkit_server::commands::serve::run(&config, renderer).await?;
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `ssrkit.toml` at the project root.

/// Server commands (dev, serve, prerender).
pub mod commands;
/// Project configuration from `ssrkit.toml`.
pub mod config;
/// Server error type.
pub mod error;
/// Static pre-render writer.
pub mod prerender;
/// HTTP server.
pub mod server;
/// File system watching for dev reloads.
pub mod watcher;

pub use config::Config;
pub use error::ServerError;
