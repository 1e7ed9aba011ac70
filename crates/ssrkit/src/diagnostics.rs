// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Developer-facing warnings.

use crate::env::SsrEnv;
use crate::error::{HookError, Result, SsrError};
use crate::global::GlobalContext;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FILE_EXTENSION: Regex = Regex::new(r"^[a-z0-9]+$").unwrap();
}

/// Whether `pathname` looks like a static file (`/logo.svg`).
pub fn is_file_request(pathname: &str) -> bool {
    let last_segment = pathname.rsplit('/').next().unwrap_or(pathname);
    match last_segment.rsplit_once('.') {
        Some((_, extension)) => FILE_EXTENSION.is_match(extension),
        None => false,
    }
}

/// Reports a URL no route matched.
///
/// An app without any page is a usage error. Otherwise, outside
/// production and for non-file URLs, the known routes are listed.
pub(crate) fn warn_404(env: &SsrEnv, global: &GlobalContext, pathname: &str) -> Result<()> {
    if !global.has_routes() {
        return Err(SsrError::usage(
            "No page found. Create a file that ends with the suffix `.page`.",
        ));
    }
    if env.is_production() || is_file_request(pathname) {
        return Ok(());
    }
    tracing::warn!(
        "URL `{}` doesn't match the route of any of your pages. Your pages are:\n{}\n(This warning is not shown in production.)",
        pathname,
        global.page_routes.describe().join("\n")
    );
    Ok(())
}

pub(crate) fn warn_missing_error_page(env: &SsrEnv) {
    if env.is_production() {
        return;
    }
    tracing::warn!(
        "No `_error.page` found. We recommend creating a `_error.page` file. (This warning is not shown in production.)"
    );
}

pub(crate) fn warn_could_not_render_500(err: &HookError) {
    tracing::warn!(
        "The error page `_error.page` could not be rendered because your `{}()` hook exported by {} threw an error.",
        err.hook_name(),
        err.hook_file_path()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_file_request() {
        assert!(is_file_request("/logo.svg"));
        assert!(is_file_request("/assets/app.js"));
        assert!(is_file_request("/favicon.ico"));
        assert!(!is_file_request("/about"));
        assert!(!is_file_request("/v1.2/docs"));
        assert!(!is_file_request("/name.With-Caps"));
        assert!(!is_file_request("/"));
    }
}
