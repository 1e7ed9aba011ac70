// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! URL analysis for incoming requests.
//!
//! A request URL goes through three steps before routing:
//!
//! 1. The data-request suffix ([`PAGE_CONTEXT_REQUEST_SUFFIX`]) is stripped.
//! 2. The configured base URL is stripped. A URL outside the base URL is not
//!    ours to handle.
//! 3. The origin (`http://host:port`) is stripped so the result starts with `/`.

use crate::error::{Result, SsrError};
use ::url::{Position, Url};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::collections::BTreeMap;

/// Suffix appended by the client router to fetch a page's context as JSON.
pub const PAGE_CONTEXT_REQUEST_SUFFIX: &str = ".pageContext.json";

const FAKE_ORIGIN: &str = "http://fake-origin.example.org";

/// Result of [`analyze_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlAnalysis {
    /// URL without suffix, base URL and origin. Always starts with `/`.
    pub url_normalized: String,
    /// Whether the URL carried the data-request suffix.
    pub is_page_context_request: bool,
    /// Whether the URL lives under the configured base URL.
    pub has_base_url: bool,
}

/// Components of a normalized URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlParsed {
    /// `http://host:port`, if the URL was absolute.
    pub origin: Option<String>,
    /// Path without query string and hash.
    pub pathname: String,
    /// Decoded query parameters. Later duplicates win.
    pub search: BTreeMap<String, String>,
    /// Raw query string including the leading `?`.
    pub search_string: Option<String>,
    /// Decoded fragment without the leading `#`.
    pub hash: String,
    /// Raw fragment including the leading `#`.
    pub hash_string: Option<String>,
}

/// Checks that `url` is usable as a request URL.
///
/// The URL must start with `/` or `http` and must parse as a URL (relative
/// URLs are resolved against a placeholder origin).
pub fn validate_url(url: &str) -> Result<()> {
    if !(url.starts_with('/') || url.starts_with("http")) {
        return Err(SsrError::usage(format!(
            "`render_page()`: `url` should start with `/` (e.g. `/product/42`) or `http` (e.g. `http://example.org/product/42`) but `url == \"{}\"`.",
            url
        )));
    }
    parse_with_origin(url).map_err(|_| {
        SsrError::usage(format!("`render_page()`: `url` should be a URL but `url == \"{}\"`.", url))
    })?;
    Ok(())
}

/// Parses `url`, resolving path-absolute URLs against a placeholder origin.
fn parse_with_origin(url: &str) -> std::result::Result<Url, ::url::ParseError> {
    if url.starts_with('/') {
        Url::parse(&format!("{}{}", FAKE_ORIGIN, url))
    } else {
        Url::parse(url)
    }
}

/// Normalizes a request URL. See the module documentation.
pub fn analyze_url(url: &str, base_url: &str) -> UrlAnalysis {
    let (url, is_page_context_request) = strip_page_context_request_suffix(url);
    let (_, url) = split_origin(&url);
    let (url, has_base_url) = strip_base_url(&url, base_url);
    let url_normalized = if url.starts_with('/') { url } else { format!("/{}", url) };

    UrlAnalysis {
        url_normalized,
        is_page_context_request,
        has_base_url,
    }
}

/// Strips [`PAGE_CONTEXT_REQUEST_SUFFIX`] from the pathname of `url`.
///
/// `/about.pageContext.json` becomes `/about` and `/index.pageContext.json`
/// becomes `/`. Query string and hash are preserved.
pub fn strip_page_context_request_suffix(url: &str) -> (String, bool) {
    let (origin, rest) = split_origin(url);
    let (pathname, tail) = split_pathname(&rest);

    let Some(stripped) = pathname.strip_suffix(PAGE_CONTEXT_REQUEST_SUFFIX) else {
        return (url.to_string(), false);
    };
    let stripped = match stripped.strip_suffix("/index") {
        Some(dir) => format!("{}/", dir),
        None if stripped.is_empty() => "/".to_string(),
        None => stripped.to_string(),
    };

    (format!("{}{}{}", origin.unwrap_or_default(), stripped, tail), true)
}

/// Inverse of [`strip_page_context_request_suffix`]: the URL the client
/// router fetches to get the context of the page at `url`.
pub fn page_context_request_url(url: &str) -> String {
    let (origin, rest) = split_origin(url);
    let (pathname, tail) = split_pathname(&rest);
    let pathname = if pathname.ends_with('/') {
        format!("{}index{}", pathname, PAGE_CONTEXT_REQUEST_SUFFIX)
    } else {
        format!("{}{}", pathname, PAGE_CONTEXT_REQUEST_SUFFIX)
    };
    format!("{}{}{}", origin.unwrap_or_default(), pathname, tail)
}

/// Splits an absolute URL into its origin and the rest.
///
/// Path-absolute URLs, and anything that doesn't parse as a URL with a host,
/// have no origin and are returned unchanged.
pub fn split_origin(url: &str) -> (Option<String>, String) {
    if url.starts_with('/') {
        return (None, url.to_string());
    }
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => (
            Some(parsed[..Position::BeforePath].to_string()),
            parsed[Position::BeforePath..].to_string(),
        ),
        _ => (None, url.to_string()),
    }
}

/// Normalizes a base URL: leading slash, no trailing slash. The root is `""`.
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn strip_base_url(url: &str, base_url: &str) -> (String, bool) {
    let base = normalize_base_url(base_url);
    if base.is_empty() {
        return (url.to_string(), true);
    }
    let (pathname, tail) = split_pathname(url);
    match pathname.strip_prefix(base.as_str()) {
        Some("") => (format!("/{}", tail), true),
        Some(rest) if rest.starts_with('/') => (format!("{}{}", rest, tail), true),
        _ => (url.to_string(), false),
    }
}

/// Splits `url` into its pathname and the query/hash tail.
fn split_pathname(url: &str) -> (&str, &str) {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    (&url[..end], &url[end..])
}

/// Parses a normalized URL into its components.
pub fn parse_url(url: &str) -> UrlParsed {
    let (origin, rest) = split_origin(url);
    let Ok(parsed) = parse_with_origin(url) else {
        let (pathname, _) = split_pathname(&rest);
        return UrlParsed {
            origin,
            pathname: pathname.to_string(),
            ..UrlParsed::default()
        };
    };

    UrlParsed {
        origin,
        pathname: parsed.path().to_string(),
        search: parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect(),
        search_string: parsed.query().map(|q| format!("?{}", q)),
        hash: parsed
            .fragment()
            .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned())
            .unwrap_or_default(),
        hash_string: parsed.fragment().map(|f| format!("#{}", f)),
    }
}
