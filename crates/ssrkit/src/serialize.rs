// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Serialization of the page context sent to the client.
//!
//! The format is JSON with one twist: strings starting with `!` are reserved
//! for tagged values, so user strings starting with `!` get an extra `!`
//! prefix. [`parse`] reverses the escaping. Tagged values coming from other
//! encoders are decoded too: `!undefined` drops the entry, and the non-finite
//! numbers (`!NaN`, `!Infinity`, `!-Infinity`) become `null` since JSON
//! cannot hold them.

use crate::error::{Result, SsrError};
use serde_json::{json, Map, Value as JsonValue};

/// Payload sent for a data request when no error page exists.
pub fn page_404_does_not_exist() -> JsonValue {
    json!({ "pageContext404PageDoesNotExist": true })
}

/// Payload sent for a data request when a hook threw.
pub fn server_side_error() -> JsonValue {
    json!({ "serverSideError": true })
}

/// Serializes `value`, escaping strings that start with `!`.
pub fn stringify(value: &JsonValue) -> Result<String> {
    Ok(serde_json::to_string(&escape(value))?)
}

/// Parses a string produced by [`stringify`].
pub fn parse(input: &str) -> Result<JsonValue> {
    let value: JsonValue = serde_json::from_str(input)?;
    Ok(unescape(value).unwrap_or(JsonValue::Null))
}

/// Escapes `<` so the JSON can sit inside a `<script>` element.
pub fn escape_for_html_script(serialized: &str) -> String {
    serialized.replace('<', "\\u003c")
}

fn escape(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) if s.starts_with('!') => JsonValue::String(format!("!{}", s)),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(escape).collect()),
        JsonValue::Object(map) => {
            JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), escape(v))).collect())
        }
        other => other.clone(),
    }
}

/// Returns `None` for `!undefined`.
fn unescape(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::String(s) => match s.as_str() {
            "!undefined" => None,
            "!NaN" | "!Infinity" | "!-Infinity" => Some(JsonValue::Null),
            _ => match s.strip_prefix('!') {
                Some(rest) if rest.starts_with('!') => Some(JsonValue::String(rest.to_string())),
                _ => Some(JsonValue::String(s)),
            },
        },
        JsonValue::Array(items) => Some(JsonValue::Array(
            items.into_iter().map(|v| unescape(v).unwrap_or(JsonValue::Null)).collect(),
        )),
        JsonValue::Object(map) => Some(JsonValue::Object(
            map.into_iter()
                .filter_map(|(k, v)| unescape(v).map(|v| (k, v)))
                .collect::<Map<String, JsonValue>>(),
        )),
        other => Some(other),
    }
}

/// Builds `{"pageContext": {...}}` from the listed entries.
pub(crate) fn serialize_page_context(entries: Map<String, JsonValue>) -> Result<String> {
    stringify(&json!({ "pageContext": entries }))
}

/// Extracts the `pageContext` object of a serialized payload.
pub fn parse_page_context(input: &str) -> Result<Map<String, JsonValue>> {
    match parse(input)? {
        JsonValue::Object(mut map) => match map.remove("pageContext") {
            Some(JsonValue::Object(ctx)) => Ok(ctx),
            _ => Err(SsrError::usage("Serialized payload has no `pageContext` object.")),
        },
        _ => Err(SsrError::usage("Serialized payload is not an object.")),
    }
}
