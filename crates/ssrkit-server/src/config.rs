// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! ssrkit project configuration.
//!
//! Configuration is loaded from `ssrkit.toml` at the project root.
//!
//! # Example Configuration
//!
//! ```toml
//! [project]
//! name = "my-app"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! static_dir = "public"
//!
//! [render]
//! base_url = "/"
//! production = true
//!
//! [prerender]
//! out_dir = "dist/client"
//! no_extra_dir = false
//!
//! [dev]
//! watch_dir = "pages"
//! ```

use crate::error::{Result, ServerError};
use serde::Deserialize;
use ssrkit::RendererConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the project root.
pub const CONFIG_FILE: &str = "ssrkit.toml";

/// Main configuration structure loaded from `ssrkit.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Renderer settings.
    #[serde(default)]
    pub render: RenderConfig,
    /// Pre-rendering settings.
    #[serde(default)]
    pub prerender: PrerenderConfig,
    /// Dev mode settings.
    #[serde(default)]
    pub dev: DevConfig,
}

/// Project metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project name (default: "unnamed").
    #[serde(default = "default_name")]
    pub name: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served for requests no page handles (default: "public").
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

/// Renderer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Base URL the app is served under (default: "/").
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Production mode silences dev-only warnings.
    #[serde(default)]
    pub production: bool,
}

/// Pre-rendering configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PrerenderConfig {
    /// Output directory (default: "dist/client").
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
    /// Write `/about` to `about.html` instead of `about/index.html`.
    #[serde(default)]
    pub no_extra_dir: bool,
}

/// Dev mode configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DevConfig {
    /// Directory watched for changes (default: "pages").
    #[serde(default = "default_watch_dir")]
    pub watch_dir: String,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_base_url() -> String {
    "/".to_string()
}

fn default_out_dir() -> String {
    "dist/client".to_string()
}

fn default_watch_dir() -> String {
    "pages".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_name() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            production: false,
        }
    }
}

impl Default for PrerenderConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            no_extra_dir: false,
        }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            watch_dir: default_watch_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from `ssrkit.toml` in the current directory.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|source| ServerError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses a config document.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Renderer settings derived from the `[render]` section.
    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig::new()
            .with_base_url(self.render.base_url.clone())
            .with_production(self.render.production)
    }

    /// Address the server binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Pre-render output directory.
    pub fn out_dir(&self) -> PathBuf {
        PathBuf::from(&self.prerender.out_dir)
    }
}
