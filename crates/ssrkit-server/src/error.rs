// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the server, the config loader and the pre-render writer.
#[derive(Error, Debug)]
pub enum ServerError {
    /// `ssrkit.toml` exists but could not be parsed.
    #[error("Invalid config file {path}: {source}")]
    Config {
        /// Path of the config file.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Rendering failed.
    #[error(transparent)]
    Render(#[from] ssrkit::SsrError),

    /// A pre-rendered URL cannot be mapped to a file.
    #[error("Cannot write pre-rendered page for URL `{0}`")]
    InvalidUrl(String),

    /// Two URLs map to the same output file.
    #[error("URLs `{first}` and `{second}` both pre-render to {path}")]
    DuplicateOutput {
        /// First URL.
        first: String,
        /// Second URL.
        second: String,
        /// The shared output file.
        path: PathBuf,
    },

    /// Filesystem or socket error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File watcher error.
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Result alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
