// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server components.
//!
//! - `http`: axum router and the page rendering fallback
//! - `body`: conversion of rendered bodies into axum bodies

/// Conversion of response envelopes into axum responses.
pub mod body;
/// HTTP server implementation using Axum.
pub mod http;

pub use http::{create_app, create_server, AppState};
