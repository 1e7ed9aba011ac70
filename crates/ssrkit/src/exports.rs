// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Exports of page files.
//!
//! A page file exposes named [`Export`]s. Server files are resolved once, at
//! load time, into a [`ServerExports`] record so the pipeline never looks a
//! hook up by name per request.

use crate::error::{Result, SsrError};
use crate::hooks::{stringify_string_array, Hook};
use crate::prerender::{OnBeforePrerenderHook, PrerenderHook};
use crate::route::RouteFn;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Opaque UI component reference.
pub type Component = Arc<dyn Any + Send + Sync>;

/// One exported member of a page file.
#[derive(Clone)]
pub enum Export {
    /// A UI component (`Page`, `default`).
    Component(Component),
    /// A hook receiving the page context.
    Hook(Arc<dyn Hook>),
    /// A route function (`default` export of a `.page.route` file).
    Route(Arc<dyn RouteFn>),
    /// A `prerender()` hook.
    Prerender(Arc<dyn PrerenderHook>),
    /// An `onBeforePrerender()` hook.
    OnBeforePrerender(Arc<dyn OnBeforePrerenderHook>),
    /// A list of strings (`passToClient`).
    Strings(Vec<String>),
    /// Plain data (route strings, flags, anything else).
    Value(JsonValue),
}

impl Export {
    /// Wraps a component value.
    pub fn component<T: Any + Send + Sync>(component: T) -> Self {
        Export::Component(Arc::new(component))
    }

    /// Builds a string list export.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Export::Strings(items.into_iter().map(Into::into).collect())
    }

    fn type_name(&self) -> &'static str {
        match self {
            Export::Component(_) => "component",
            Export::Hook(_) => "hook",
            Export::Route(_) => "route function",
            Export::Prerender(_) => "prerender hook",
            Export::OnBeforePrerender(_) => "onBeforePrerender hook",
            Export::Strings(_) => "string list",
            Export::Value(_) => "value",
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Strings(items) => f.debug_tuple("Strings").field(items).finish(),
            Export::Value(value) => f.debug_tuple("Value").field(value).finish(),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

/// Named exports of one page file.
#[derive(Clone, Default, Debug)]
pub struct FileExports {
    exports: BTreeMap<String, Export>,
}

impl FileExports {
    /// Creates an empty export set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an export.
    pub fn with(mut self, name: impl Into<String>, export: Export) -> Self {
        self.exports.insert(name.into(), export);
        self
    }

    /// Adds a hook export.
    pub fn with_hook(self, name: impl Into<String>, hook: Arc<dyn Hook>) -> Self {
        self.with(name, Export::Hook(hook))
    }

    /// Looks an export up by name.
    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    /// Whether an export with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    /// Export names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    /// Iterates over all exports.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Export)> {
        self.exports.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlays `other` on top of `self`.
    pub fn merged_with(&self, other: &FileExports) -> FileExports {
        let mut exports = self.exports.clone();
        exports.extend(other.exports.iter().map(|(k, v)| (k.clone(), v.clone())));
        FileExports { exports }
    }

    /// JSON view of the data exports. Code exports are left out.
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .exports
            .iter()
            .filter_map(|(name, export)| match export {
                Export::Value(value) => Some((name.clone(), value.clone())),
                Export::Strings(items) => Some((name.clone(), JsonValue::from(items.clone()))),
                _ => None,
            })
            .collect();
        JsonValue::Object(map)
    }
}

const SERVER_EXPORTS: &[&str] = &[
    "render",
    "onBeforeRender",
    "passToClient",
    "prerender",
    "doNotPrerender",
    "onBeforePrerender",
];

const RENAMED_SERVER_EXPORTS: &[(&str, &str)] = &[("_onBeforePrerender", "onBeforePrerender")];

const REPLACED_SERVER_EXPORTS: &[(&str, &str)] = &[("addPageContext", "onBeforeRender")];

/// Validated exports of a `.page.server` file.
#[derive(Clone, Default)]
pub struct ServerExports {
    /// `render()` hook.
    pub render: Option<Arc<dyn Hook>>,
    /// `onBeforeRender()` hook.
    pub on_before_render: Option<Arc<dyn Hook>>,
    /// Context keys sent to the client.
    pub pass_to_client: Option<Vec<String>>,
    /// `prerender()` hook.
    pub prerender: Option<Arc<dyn PrerenderHook>>,
    /// Whether the page opts out of pre-rendering.
    pub do_not_prerender: bool,
    /// `onBeforePrerender()` hook.
    pub on_before_prerender: Option<Arc<dyn OnBeforePrerenderHook>>,
}

impl fmt::Debug for ServerExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerExports")
            .field("render", &self.render.is_some())
            .field("on_before_render", &self.on_before_render.is_some())
            .field("pass_to_client", &self.pass_to_client)
            .field("prerender", &self.prerender.is_some())
            .field("do_not_prerender", &self.do_not_prerender)
            .field("on_before_prerender", &self.on_before_prerender.is_some())
            .finish()
    }
}

impl ServerExports {
    /// Validates the exports of the server file at `file_path`.
    pub fn from_exports(exports: &FileExports, file_path: &str) -> Result<Self> {
        assert_server_export_names(exports, file_path)?;

        let mut server = ServerExports::default();
        for (name, export) in exports.iter() {
            match (name, export) {
                ("render", Export::Hook(hook)) => server.render = Some(hook.clone()),
                ("onBeforeRender", Export::Hook(hook)) => server.on_before_render = Some(hook.clone()),
                ("passToClient", Export::Strings(items)) => server.pass_to_client = Some(items.clone()),
                ("passToClient", Export::Value(JsonValue::Array(items))) => {
                    let strings: Option<Vec<String>> =
                        items.iter().map(|item| item.as_str().map(str::to_string)).collect();
                    server.pass_to_client = Some(strings.ok_or_else(|| {
                        SsrError::usage(format!(
                            "The `passToClient` export defined in {} should be an array of strings.",
                            file_path
                        ))
                    })?);
                }
                ("prerender", Export::Prerender(hook)) => server.prerender = Some(hook.clone()),
                ("doNotPrerender", Export::Value(JsonValue::Bool(flag))) => server.do_not_prerender = *flag,
                ("onBeforePrerender", Export::OnBeforePrerender(hook)) => {
                    server.on_before_prerender = Some(hook.clone())
                }
                (name, export) => {
                    return Err(SsrError::usage(format!(
                        "The `{}` export defined in {} should be {} but it is a {}.",
                        name,
                        file_path,
                        expected_server_export(name),
                        export.type_name()
                    )))
                }
            }
        }
        Ok(server)
    }
}

fn expected_server_export(name: &str) -> &'static str {
    match name {
        "render" | "onBeforeRender" | "prerender" | "onBeforePrerender" => "a function",
        "passToClient" => "an array of strings",
        "doNotPrerender" => "a boolean",
        _ => "a supported export",
    }
}

fn assert_server_export_names(exports: &FileExports, file_path: &str) -> Result<()> {
    for name in exports.names() {
        if SERVER_EXPORTS.contains(&name) {
            continue;
        }
        if let Some((_, new_name)) = RENAMED_SERVER_EXPORTS.iter().find(|(old, _)| *old == name) {
            return Err(SsrError::usage(format!(
                "Rename `export {{ {} }}` to `export {{ {} }}` in {}",
                name, new_name, file_path
            )));
        }
        if let Some((_, new_name)) = REPLACED_SERVER_EXPORTS.iter().find(|(old, _)| *old == name) {
            return Err(SsrError::usage(format!(
                "`export {{ {} }}` of {} is outdated: use `export {{ {} }}` instead.",
                name, file_path, new_name
            )));
        }
        return Err(SsrError::usage(format!(
            "`export {{ {} }}` of {} is not supported. Only following exports are allowed: {}.",
            name,
            file_path,
            stringify_string_array(SERVER_EXPORTS)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{hook_fn, HookReturn};
    use crate::context::PageContext;
    use serde_json::json;

    fn noop_hook() -> Arc<dyn Hook> {
        hook_fn(|_ctx: &PageContext| async { Ok(HookReturn::Nothing) })
    }

    #[test]
    fn test_server_exports() {
        let exports = FileExports::new()
            .with_hook("render", noop_hook())
            .with("passToClient", Export::strings(["pageProps"]))
            .with("doNotPrerender", Export::Value(json!(true)));

        let server = ServerExports::from_exports(&exports, "/pages/a.page.server").unwrap();
        assert!(server.render.is_some());
        assert!(server.on_before_render.is_none());
        assert_eq!(server.pass_to_client, Some(vec!["pageProps".to_string()]));
        assert!(server.do_not_prerender);
    }

    #[test]
    fn test_unknown_export() {
        let exports = FileExports::new().with("setPageProps", Export::Value(json!(1)));
        let err = ServerExports::from_exports(&exports, "/pages/a.page.server").unwrap_err();
        assert!(err.to_string().contains("setPageProps"));
        assert!(err.to_string().contains("'onBeforeRender'"));
    }

    #[test]
    fn test_renamed_exports_give_hints() {
        let exports = FileExports::new().with("_onBeforePrerender", Export::Value(json!(1)));
        let err = ServerExports::from_exports(&exports, "f").unwrap_err();
        assert!(err.to_string().contains("Rename `export { _onBeforePrerender }` to `export { onBeforePrerender }`"));

        let exports = FileExports::new().with_hook("addPageContext", noop_hook());
        let err = ServerExports::from_exports(&exports, "f").unwrap_err();
        assert!(err.to_string().contains("onBeforeRender"));
    }

    #[test]
    fn test_wrong_export_type() {
        let exports = FileExports::new().with("render", Export::Value(json!("<h1>")));
        let err = ServerExports::from_exports(&exports, "/pages/a.page.server").unwrap_err();
        assert!(err.to_string().contains("`render` export"));
        assert!(err.to_string().contains("a function"));

        let exports = FileExports::new().with("passToClient", Export::Value(json!([1])));
        assert!(ServerExports::from_exports(&exports, "f").is_err());
    }

    #[test]
    fn test_merged_with_overrides() {
        let base = FileExports::new().with("title", Export::Value(json!("base")));
        let page = FileExports::new().with("title", Export::Value(json!("page")));
        let merged = base.merged_with(&page);
        assert_eq!(merged.to_json(), json!({"title": "page"}));
    }
}
