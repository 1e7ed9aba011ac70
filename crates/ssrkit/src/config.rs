// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Renderer configuration.

use crate::env::SsrEnv;
use serde::Deserialize;

/// Settings of a [`Renderer`](crate::render::Renderer).
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    /// Base URL the app is served under (default: `/`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whether this is a production deployment. Silences dev-only warnings.
    #[serde(default)]
    pub production: bool,

    /// Whether the client router takes over navigation. Pre-rendered pages
    /// then also get their serialized context.
    #[serde(default = "default_uses_client_router")]
    pub uses_client_router: bool,

    /// Environment descriptor. Not deserialized; set with [`RendererConfig::with_env`].
    #[serde(skip)]
    pub env: SsrEnv,
}

fn default_base_url() -> String {
    "/".to_string()
}

fn default_uses_client_router() -> bool {
    true
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            production: false,
            uses_client_router: default_uses_client_router(),
            env: SsrEnv::default(),
        }
    }
}

impl RendererConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the production flag, on the config and on its environment.
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self.env = self.env.with_production(production);
        self
    }

    /// Sets whether the client router is used.
    pub fn with_client_router(mut self, uses_client_router: bool) -> Self {
        self.uses_client_router = uses_client_router;
        self
    }

    /// Sets the environment. Its production flag follows the config's.
    pub fn with_env(mut self, env: SsrEnv) -> Self {
        self.env = env.with_production(self.production);
        self
    }
}
