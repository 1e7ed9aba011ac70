// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The page context: the per-request record built up by the pipeline.
//!
//! Built-in fields are typed. Everything else (caller extension fields,
//! `pageProps`, values returned by hooks) lives in a JSON map and is merged
//! shallowly, last write wins.

use crate::assets::{AssetResolver, PageAsset};
use crate::error::{Result, SsrError};
use crate::exports::{Component, FileExports};
use crate::loader::PageFiles;
use crate::response::HttpResponse;
use crate::url::{validate_url, UrlParsed};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Keys the pipeline owns. Hooks cannot overwrite them.
const READ_ONLY_KEYS: &[&str] = &[
    "url",
    "urlNormalized",
    "urlPathname",
    "urlParsed",
    "_pageId",
    "Page",
    "pageExports",
    "httpResponse",
    "_isPreRendering",
    "_isPageContextRequest",
];

/// Argument of the entry point: the request URL plus caller fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContextInit {
    /// Request URL, path-absolute (`/about`) or absolute (`https://x.org/about`).
    pub url: String,
    /// Extension fields made available to hooks (`user`, `headers`, ...).
    pub extra: Map<String, JsonValue>,
}

impl PageContextInit {
    /// Context init for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra: Map::new(),
        }
    }

    /// Adds an extension field.
    pub fn with(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Builds the init from an untyped argument, validating its shape.
    pub fn from_json(arg: Option<JsonValue>) -> Result<Self> {
        let arg = match arg {
            None | Some(JsonValue::Null) => {
                return Err(SsrError::usage(
                    "`render_page(pageContext)`: argument `pageContext` is missing.",
                ))
            }
            Some(arg) => arg,
        };
        let JsonValue::Object(mut extra) = arg else {
            return Err(SsrError::usage(format!(
                "`render_page(pageContext)`: argument `pageContext` should be a plain object, but it is {}.",
                json_type(&arg)
            )));
        };
        let url = match extra.remove("url") {
            None => {
                return Err(SsrError::usage(
                    "`render_page(pageContext)`: The `pageContext` you passed is missing the property `pageContext.url`.",
                ))
            }
            Some(JsonValue::String(url)) => url,
            Some(other) => {
                return Err(SsrError::usage(format!(
                    "`render_page(pageContext)`: `pageContext.url` should be a string but it is {}.",
                    json_type(&other)
                )))
            }
        };
        validate_url(&url)?;
        Ok(Self { url, extra })
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Lazy accessor for a page's assets.
#[derive(Clone)]
pub(crate) struct PageAssetsAccessor {
    pub(crate) resolver: Arc<dyn AssetResolver>,
    pub(crate) dependencies: Vec<String>,
    pub(crate) client_entry: String,
    pub(crate) is_pre_rendering: bool,
}

/// Per-request page context.
pub struct PageContext {
    /// Request URL as received.
    pub url: String,
    /// URL without data-request suffix, base URL and origin.
    pub url_normalized: String,
    /// Pathname of the normalized URL.
    pub url_pathname: String,
    /// Components of the normalized URL.
    pub url_parsed: UrlParsed,
    /// Route parameters of the matched route.
    pub route_params: BTreeMap<String, String>,
    /// Matched page id. `None` until routed or when nothing matched.
    pub page_id: Option<String>,
    /// `Some(true)` when the error page renders a 404, `Some(false)` for a 500.
    pub is_404: Option<bool>,
    /// Whether the page is being pre-rendered.
    pub is_pre_rendering: bool,
    /// Whether the request asks for the serialized context only.
    pub is_page_context_request: bool,
    /// The page's UI component.
    pub page: Option<Component>,
    /// Exports of the page's `.page` files.
    pub page_exports: FileExports,
    /// Caller extension fields and values added by hooks.
    pub fields: Map<String, JsonValue>,
    /// The response. `None` means the request was not handled.
    pub http_response: Option<HttpResponse>,
    /// Error that sent the request down the error page path.
    pub error: Option<Arc<SsrError>>,
    pub(crate) page_files: Option<Arc<PageFiles>>,
    pub(crate) pass_to_client: Vec<String>,
    pub(crate) assets: Option<PageAssetsAccessor>,
}

impl fmt::Debug for PageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageContext")
            .field("url", &self.url)
            .field("url_normalized", &self.url_normalized)
            .field("route_params", &self.route_params)
            .field("page_id", &self.page_id)
            .field("is_404", &self.is_404)
            .field("fields", &self.fields)
            .field("http_response", &self.http_response)
            .finish()
    }
}

impl PageContext {
    /// Bare context for `init`; URL props are computed by the pipeline.
    pub(crate) fn new(init: &PageContextInit, is_pre_rendering: bool) -> Self {
        Self {
            url: init.url.clone(),
            url_normalized: init.url.clone(),
            url_pathname: String::new(),
            url_parsed: UrlParsed::default(),
            route_params: BTreeMap::new(),
            page_id: None,
            is_404: None,
            is_pre_rendering,
            is_page_context_request: false,
            page: None,
            page_exports: FileExports::default(),
            fields: init.extra.clone(),
            http_response: None,
            error: None,
            page_files: None,
            pass_to_client: Vec::new(),
            assets: None,
        }
    }

    /// `pageProps`, if a hook set them.
    pub fn page_props(&self) -> Option<&JsonValue> {
        self.fields.get("pageProps")
    }

    /// A caller or hook field.
    pub fn field(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    /// The page component downcast to `T`.
    pub fn page_component<T: 'static>(&self) -> Option<&T> {
        self.page.as_ref().and_then(|page| page.downcast_ref::<T>())
    }

    /// Context keys sent to the client.
    pub fn pass_to_client(&self) -> &[String] {
        &self.pass_to_client
    }

    /// Whether a stream failed after the response started.
    pub fn server_side_error_while_streaming(&self) -> bool {
        self.http_response
            .as_ref()
            .map(|response| response.stream_error().is_some())
            .unwrap_or(false)
    }

    /// Assets (styles, scripts, preloads) of the page, resolved on demand.
    pub async fn get_page_assets(&self) -> Result<Vec<PageAsset>> {
        let accessor = self.assets.as_ref().ok_or_else(|| {
            SsrError::usage("`get_page_assets()` is only available once the page files are loaded.")
        })?;
        accessor
            .resolver
            .page_assets(&accessor.dependencies, &accessor.client_entry, accessor.is_pre_rendering)
            .await
    }

    /// Shallow merge of a hook's `pageContext` patch.
    ///
    /// `routeParams` and `is404` update the typed fields; keys owned by the
    /// pipeline are rejected.
    pub fn merge_patch(&mut self, patch: Map<String, JsonValue>) -> Result<()> {
        for (key, value) in patch {
            if READ_ONLY_KEYS.contains(&key.as_str()) {
                return Err(SsrError::usage(format!(
                    "`pageContext.{}` is set by ssrkit and cannot be overwritten by a hook.",
                    key
                )));
            }
            match key.as_str() {
                "routeParams" => self.route_params = route_params_from_json(&value)?,
                "is404" => match value {
                    JsonValue::Bool(flag) => self.is_404 = Some(flag),
                    JsonValue::Null => self.is_404 = None,
                    _ => return Err(SsrError::usage("`pageContext.is404` should be a boolean.")),
                },
                _ => {
                    self.fields.insert(key, value);
                }
            }
        }
        Ok(())
    }

    /// JSON value of a context key, as seen by the client.
    pub fn get_json(&self, key: &str) -> Option<JsonValue> {
        match key {
            "url" => Some(JsonValue::String(self.url.clone())),
            "urlNormalized" => Some(JsonValue::String(self.url_normalized.clone())),
            "urlPathname" => Some(JsonValue::String(self.url_pathname.clone())),
            "urlParsed" => serde_json::to_value(&self.url_parsed).ok(),
            "routeParams" => serde_json::to_value(&self.route_params).ok(),
            "_pageId" => self.page_id.clone().map(JsonValue::String),
            "is404" => self.is_404.map(JsonValue::Bool),
            "pageExports" => Some(self.page_exports.to_json()),
            _ => self.fields.get(key).cloned(),
        }
    }

    /// Sets `pageProps.is404` on error pages.
    pub(crate) fn fill_error_page_props(&mut self) {
        let is_404 = self.is_404.unwrap_or(false);
        let page_props = self
            .fields
            .entry("pageProps")
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if let JsonValue::Object(props) = page_props {
            let current = props.get("is404").and_then(JsonValue::as_bool).unwrap_or(false);
            props.insert("is404".to_string(), JsonValue::Bool(current || is_404));
        }
    }
}

fn route_params_from_json(value: &JsonValue) -> Result<BTreeMap<String, String>> {
    let JsonValue::Object(map) = value else {
        return Err(SsrError::usage("`pageContext.routeParams` should be an object of strings."));
    };
    map.iter()
        .map(|(k, v)| match v {
            JsonValue::String(s) => Ok((k.clone(), s.clone())),
            _ => Err(SsrError::usage(format!(
                "`pageContext.routeParams.{}` should be a string.",
                k
            ))),
        })
        .collect()
}
