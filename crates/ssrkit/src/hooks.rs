// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Hook executor.
//!
//! User hooks (`onBeforeRender()`, `render()`, `onBeforeRoute()`) are plain
//! trait objects. [`run_hook`] invokes one and captures any error it returns
//! into a [`HookResult::Failure`] so the pipeline can branch on it without
//! unwinding. Return values are then checked against the keys each hook is
//! allowed to return; a wrong shape is a usage error, never a hook error.

use crate::context::PageContext;
use crate::error::{BoxError, HookError, Result, SsrError};
use crate::html::DocumentHtml;
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A user hook receiving the request's page context.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Runs the hook.
    async fn call(&self, ctx: &PageContext) -> std::result::Result<HookReturn, BoxError>;
}

/// Hook backed by a closure. See [`hook_fn`].
pub struct HookFn<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> Hook for HookFn<F, Fut>
where
    F: Fn(&PageContext) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<HookReturn, BoxError>> + Send + 'static,
{
    async fn call(&self, ctx: &PageContext) -> std::result::Result<HookReturn, BoxError> {
        (self.f)(ctx).await
    }
}

/// Wraps a closure into a [`Hook`].
///
/// The closure reads what it needs from the context synchronously and
/// returns a `'static` future:
///
/// ```rust,ignore
/// let render = hook_fn(|ctx: &PageContext| {
///     let title = ctx.page_props().and_then(|p| p["title"].as_str()).unwrap_or("").to_string();
///     async move { Ok(HookReturn::document(escape_inject().template("<h1>").value(&title).template("</h1>").build())) }
/// });
/// ```
pub fn hook_fn<F, Fut>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&PageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<HookReturn, BoxError>> + Send + 'static,
{
    Arc::new(HookFn { f, _fut: PhantomData })
}

/// A value inside an object returned by a hook.
pub enum HookValue {
    /// HTML produced by [`crate::html::escape_inject`] or
    /// [`crate::html::dangerously_skip_escape`], or a stream.
    Document(DocumentHtml),
    /// Any JSON value (a `pageContext` patch, for instance).
    Json(JsonValue),
}

impl fmt::Debug for HookValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookValue::Document(doc) => f.debug_tuple("Document").field(doc).finish(),
            HookValue::Json(value) => f.debug_tuple("Json").field(value).finish(),
        }
    }
}

/// What a hook returned.
///
/// The variants mirror the shapes a dynamically typed hook could return so
/// that every shape, including forbidden ones, can be validated.
pub enum HookReturn {
    /// `null` / `undefined`.
    Nothing,
    /// A bare document, as returned by `render()`.
    Document(DocumentHtml),
    /// A bare string. Always rejected: HTML must be built through the
    /// escaping primitives.
    Text(String),
    /// A plain object.
    Object(BTreeMap<String, HookValue>),
    /// Anything else (numbers, arrays, booleans).
    Other(JsonValue),
}

impl HookReturn {
    /// `{ documentHtml }`.
    pub fn document(doc: DocumentHtml) -> Self {
        HookReturn::Document(doc)
    }

    /// `{ pageContext: patch }`.
    pub fn page_context(patch: JsonValue) -> Self {
        let mut object = BTreeMap::new();
        object.insert("pageContext".to_string(), HookValue::Json(patch));
        HookReturn::Object(object)
    }

    /// `{ documentHtml, pageContext: patch }`.
    pub fn document_with_page_context(doc: DocumentHtml, patch: JsonValue) -> Self {
        let mut object = BTreeMap::new();
        object.insert("documentHtml".to_string(), HookValue::Document(doc));
        object.insert("pageContext".to_string(), HookValue::Json(patch));
        HookReturn::Object(object)
    }

    /// Adds an entry, turning the return value into an object if needed.
    pub fn with_entry(self, key: impl Into<String>, value: HookValue) -> Self {
        let mut object = match self {
            HookReturn::Object(object) => object,
            HookReturn::Document(doc) => {
                let mut object = BTreeMap::new();
                object.insert("documentHtml".to_string(), HookValue::Document(doc));
                object
            }
            _ => BTreeMap::new(),
        };
        object.insert(key.into(), value);
        HookReturn::Object(object)
    }

    fn shape(&self) -> &'static str {
        match self {
            HookReturn::Nothing => "null",
            HookReturn::Document(_) => "a document",
            HookReturn::Text(_) => "a string",
            HookReturn::Object(_) => "an object",
            HookReturn::Other(_) => "a non-object value",
        }
    }
}

impl From<JsonValue> for HookReturn {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => HookReturn::Nothing,
            JsonValue::String(s) => HookReturn::Text(s),
            JsonValue::Object(map) => HookReturn::Object(
                map.into_iter().map(|(k, v)| (k, HookValue::Json(v))).collect(),
            ),
            other => HookReturn::Other(other),
        }
    }
}

impl From<DocumentHtml> for HookReturn {
    fn from(doc: DocumentHtml) -> Self {
        HookReturn::Document(doc)
    }
}

impl fmt::Debug for HookReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookReturn::Nothing => write!(f, "Nothing"),
            HookReturn::Document(doc) => f.debug_tuple("Document").field(doc).finish(),
            HookReturn::Text(s) => f.debug_tuple("Text").field(s).finish(),
            HookReturn::Object(object) => f.debug_tuple("Object").field(object).finish(),
            HookReturn::Other(value) => f.debug_tuple("Other").field(value).finish(),
        }
    }
}

/// Outcome of running a hook: success, or the captured error.
#[derive(Debug)]
pub enum HookResult<T> {
    /// The hook returned normally.
    Success(T),
    /// The hook threw.
    Failure(HookError),
}

/// Runs `hook` with `ctx`, capturing a thrown error as [`HookResult::Failure`].
pub async fn run_hook(
    hook: &dyn Hook,
    hook_name: &str,
    hook_file_path: &str,
    ctx: &PageContext,
) -> HookResult<HookReturn> {
    match hook.call(ctx).await {
        Ok(ret) => HookResult::Success(ret),
        Err(err) => {
            tracing::debug!("Hook {}() of {} failed: {}", hook_name, hook_file_path, err);
            HookResult::Failure(HookError::new(err, hook_name, hook_file_path))
        }
    }
}

/// What `render()` produced once validated.
#[derive(Debug, Default)]
pub struct RenderOutput {
    /// `None` means the hook declined to render.
    pub document: Option<DocumentHtml>,
    /// `pageContext` patch to merge before HTML generation.
    pub patch: Option<Map<String, JsonValue>>,
}

/// Validates the return value of a hook that may only return a
/// `pageContext` patch (`onBeforeRender()`, `onBeforeRoute()`).
pub fn page_context_patch(
    ret: HookReturn,
    hook_name: &str,
    hook_file_path: &str,
) -> Result<Option<Map<String, JsonValue>>> {
    let prefix = format!("The `{}()` hook exported by {}", hook_name, hook_file_path);
    match ret {
        HookReturn::Nothing => Ok(None),
        HookReturn::Object(mut object) => {
            assert_keys(object.keys(), &["pageContext"], &prefix)?;
            match object.remove("pageContext") {
                None => Ok(None),
                Some(value) => patch_from_value(value, &prefix).map(Some),
            }
        }
        other => Err(SsrError::usage(format!(
            "{} should return `null`, `undefined`, or a plain object but it returned {}.",
            prefix,
            other.shape()
        ))),
    }
}

/// Validates the return value of `render()`.
pub fn render_output(ret: HookReturn, hook_file_path: &str) -> Result<RenderOutput> {
    let prefix = format!("The `render()` hook exported by {}", hook_file_path);
    let expected = "HTML built with `escape_inject()` or `dangerously_skip_escape()`";

    match ret {
        HookReturn::Nothing => Ok(RenderOutput::default()),
        HookReturn::Document(doc) => Ok(RenderOutput {
            document: Some(doc),
            patch: None,
        }),
        HookReturn::Text(_) => Err(SsrError::usage(format!(
            "{} returned a plain string which is forbidden; instead, it should return {}.",
            prefix, expected
        ))),
        HookReturn::Object(mut object) => {
            assert_keys(object.keys(), &["documentHtml", "pageContext"], &prefix)?;
            let patch = match object.remove("pageContext") {
                None => None,
                Some(value) => Some(patch_from_value(value, &prefix)?),
            };
            let document = match object.remove("documentHtml") {
                None | Some(HookValue::Json(JsonValue::Null)) => None,
                Some(HookValue::Document(doc)) => Some(doc),
                Some(HookValue::Json(JsonValue::String(_))) => {
                    return Err(SsrError::usage(format!(
                        "{} returned `{{ documentHtml }}`, but `documentHtml` is a plain string which is forbidden; `documentHtml` should be {}.",
                        prefix, expected
                    )))
                }
                Some(HookValue::Json(_)) => {
                    return Err(SsrError::usage(format!(
                        "{} returned `{{ documentHtml }}`, but `documentHtml` should be {}.",
                        prefix, expected
                    )))
                }
            };
            Ok(RenderOutput { document, patch })
        }
        HookReturn::Other(_) => Err(SsrError::usage(format!(
            "{} should return `null`, a `documentHtml`, or an object `{{ documentHtml, pageContext }}` where `documentHtml` is {}.",
            prefix, expected
        ))),
    }
}

fn patch_from_value(value: HookValue, prefix: &str) -> Result<Map<String, JsonValue>> {
    match value {
        HookValue::Json(JsonValue::Object(map)) => Ok(map),
        HookValue::Json(JsonValue::Null) => Ok(Map::new()),
        _ => Err(SsrError::usage(format!(
            "{} returned `{{ pageContext }}` but `pageContext` should be a plain object.",
            prefix
        ))),
    }
}

/// Fails with a usage error naming every key outside `allowed`.
pub fn assert_keys<'a>(
    keys: impl IntoIterator<Item = &'a String>,
    allowed: &[&str],
    prefix: &str,
) -> Result<()> {
    let unknown: Vec<&str> = keys
        .into_iter()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    Err(SsrError::usage(format!(
        "{} returned an object with unknown keys {}. Only following keys are allowed: {}.",
        prefix,
        stringify_string_array(&unknown),
        stringify_string_array(allowed)
    )))
}

/// Formats `["a", "b"]` as `['a', 'b']`.
pub fn stringify_string_array(items: &[&str]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{}'", item)).collect();
    format!("[{}]", quoted.join(", "))
}
