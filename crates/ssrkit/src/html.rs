// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTML values returned by `render()` hooks.
//!
//! A [`DocumentHtml`] can only be built through [`escape_inject`] (which
//! escapes every interpolated value), [`dangerously_skip_escape`], or from a
//! byte stream. A bare `String` is never accepted as HTML.

use crate::error::BoxError;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::Sink;
use std::fmt;
use std::pin::Pin;

/// Pull-style HTML stream.
pub type HtmlStream = BoxStream<'static, Result<Vec<u8>, BoxError>>;

/// Writable end handed to a pipe-style render.
pub type BodySink = Pin<Box<dyn Sink<Vec<u8>, Error = BoxError> + Send>>;

/// Push-style render: writes the document into the given sink.
pub type PipeFn = Box<dyn FnOnce(BodySink) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// HTML document produced by a `render()` hook.
pub struct DocumentHtml(pub(crate) HtmlRender);

/// The materialized or streaming form of a document.
pub enum HtmlRender {
    /// Fully materialized HTML.
    String(String),
    /// Readable stream of HTML chunks.
    Stream(HtmlStream),
    /// Pipe writing HTML chunks into a sink.
    Pipe(PipeFn),
}

impl HtmlRender {
    /// Short name of the representation, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            HtmlRender::String(_) => "string",
            HtmlRender::Stream(_) => "readable stream",
            HtmlRender::Pipe(_) => "pipe",
        }
    }
}

impl fmt::Debug for HtmlRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HtmlRender::String(html) => f.debug_tuple("String").field(html).finish(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

impl DocumentHtml {
    /// Document streamed chunk by chunk.
    pub fn from_stream(stream: HtmlStream) -> Self {
        DocumentHtml(HtmlRender::Stream(stream))
    }

    /// Document written into a sink by `pipe`.
    pub fn from_pipe<F>(pipe: F) -> Self
    where
        F: FnOnce(BodySink) -> BoxFuture<'static, Result<(), BoxError>> + Send + 'static,
    {
        DocumentHtml(HtmlRender::Pipe(Box::new(pipe)))
    }

    /// The HTML, if materialized.
    pub fn as_str(&self) -> Option<&str> {
        match &self.0 {
            HtmlRender::String(html) => Some(html),
            _ => None,
        }
    }

    /// Whether the document is a stream or pipe.
    pub fn is_stream(&self) -> bool {
        !matches!(self.0, HtmlRender::String(_))
    }

    pub(crate) fn into_render(self) -> HtmlRender {
        self.0
    }
}

impl fmt::Debug for DocumentHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DocumentHtml").field(&self.0).finish()
    }
}

/// Marks `html` as trusted HTML. Nothing is escaped.
pub fn dangerously_skip_escape(html: impl Into<String>) -> DocumentHtml {
    DocumentHtml(HtmlRender::String(html.into()))
}

/// Starts an escaping HTML builder.
pub fn escape_inject() -> EscapeInject {
    EscapeInject::default()
}

/// Builder interleaving trusted template parts with escaped values.
///
/// Template parts must be `&'static str`: they are literals written by the
/// developer, never request data.
#[derive(Debug, Default)]
pub struct EscapeInject {
    html: String,
}

impl EscapeInject {
    /// Appends a trusted template part.
    pub fn template(mut self, part: &'static str) -> Self {
        self.html.push_str(part);
        self
    }

    /// Appends a value, escaped.
    pub fn value(mut self, value: impl fmt::Display) -> Self {
        self.html.push_str(&escape_html(&value.to_string()));
        self
    }

    /// Appends an already built document. Streams cannot be nested and are
    /// skipped with a warning.
    pub fn document(mut self, doc: &DocumentHtml) -> Self {
        match doc.as_str() {
            Some(html) => self.html.push_str(html),
            None => tracing::warn!("escape_inject(): nested HTML streams are not supported"),
        }
        self
    }

    /// Finishes the document.
    pub fn build(self) -> DocumentHtml {
        DocumentHtml(HtmlRender::String(self.html))
    }
}

/// Escapes `&`, `<`, `>`, `"` and `'`.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Inserts `head` before `</head>` and `body_end` before `</body>`.
///
/// Missing tags fall back to prepending (`head`) or appending (`body_end`).
pub fn inject_html(html: &str, head: &str, body_end: &str) -> String {
    let mut result = html.to_string();

    if !head.is_empty() {
        match result.to_ascii_lowercase().find("</head>") {
            Some(pos) => result.insert_str(pos, head),
            None => result.insert_str(0, head),
        }
    }

    if !body_end.is_empty() {
        match result.to_ascii_lowercase().rfind("</body>") {
            Some(pos) => result.insert_str(pos, body_end),
            None => result.push_str(body_end),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_escape_inject_escapes_values() {
        let doc = escape_inject()
            .template("<h1>")
            .value("<script>alert('x')</script>")
            .template("</h1>")
            .build();
        assert_eq!(
            doc.as_str(),
            Some("<h1>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;</h1>")
        );
    }

    #[test]
    fn test_nested_document() {
        let inner = dangerously_skip_escape("<b>bold</b>");
        let doc = escape_inject().template("<p>").document(&inner).template("</p>").build();
        assert_eq!(doc.as_str(), Some("<p><b>bold</b></p>"));
    }

    #[test]
    fn test_stream_document() {
        let doc = DocumentHtml::from_stream(Box::pin(stream::iter(vec![Ok(b"<p>".to_vec())])));
        assert!(doc.is_stream());
        assert!(doc.as_str().is_none());
    }

    #[test]
    fn test_inject_html() {
        let html = "<html><head><title>x</title></head><body><div></div></body></html>";
        let injected = inject_html(html, "<link>", "<script></script>");
        assert_eq!(
            injected,
            "<html><head><title>x</title><link></head><body><div></div><script></script></body></html>"
        );
    }

    #[test]
    fn test_inject_html_after_non_ascii_text() {
        let html = "<html><head><title>İstanbul İzmir</title></HEAD><body>ΣΑΣ x</BODY></html>";
        let injected = inject_html(html, "<link>", "<script></script>");
        assert_eq!(
            injected,
            "<html><head><title>İstanbul İzmir</title><link></HEAD><body>ΣΑΣ x<script></script></BODY></html>"
        );
    }

    #[test]
    fn test_inject_html_without_tags() {
        assert_eq!(inject_html("<div></div>", "<link>", "<script></script>"), "<link><div></div><script></script>");
    }
}
