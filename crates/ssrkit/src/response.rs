// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP response envelope.
//!
//! [`HttpResponse`] wraps one render result and exposes it through four
//! access modes:
//!
//! | accessor | available for |
//! |---|---|
//! | [`HttpResponse::body`] | materialized HTML and JSON |
//! | [`HttpResponse::get_body`] | everything (drains streams) |
//! | [`HttpResponse::body_stream`] | readable streams |
//! | [`HttpResponse::pipe`] | pipes |
//!
//! A mismatched accessor fails with a usage error naming the representation
//! the render actually produced. Use [`HttpResponse::body_kind`] to pick the
//! right accessor up front.
//!
//! Errors raised by a stream after the status was sent cannot change the
//! status any more: they are logged once, recorded on the envelope
//! ([`HttpResponse::stream_error`]), and the stream ends early.

use crate::env::SsrEnv;
use crate::error::{BoxError, HookError, Result, SsrError};
use crate::html::{BodySink, HtmlRender, HtmlStream};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stream handed out by [`HttpResponse::body_stream`].
pub type BodyStream = BoxStream<'static, Result<Vec<u8>>>;

/// Content type of HTML responses.
pub const CONTENT_TYPE_HTML: &str = "text/html;charset=utf-8";
/// Content type of data responses.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// How the body of a response is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Fully materialized.
    String,
    /// Pull-style stream.
    Stream,
    /// Push-style pipe.
    Pipe,
}

enum Body {
    String(String),
    Streaming {
        kind: BodyKind,
        render: Mutex<Option<HtmlRender>>,
    },
}

/// Records errors raised while streaming.
#[derive(Clone)]
pub(crate) struct StreamErrorHandler {
    slot: Arc<Mutex<Option<HookError>>>,
    env: SsrEnv,
    render_file_path: String,
}

impl StreamErrorHandler {
    pub(crate) fn new(env: SsrEnv, render_file_path: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            env,
            render_file_path: render_file_path.into(),
        }
    }

    fn report(&self, err: BoxError) -> SsrError {
        let hook_error = HookError::new(err, "render", self.render_file_path.clone());
        let message = hook_error.to_string();
        *lock(&self.slot) = Some(hook_error.clone());
        self.env.log_error(&SsrError::Hook(hook_error));
        SsrError::Stream(message)
    }

    fn recorded(&self) -> Option<HookError> {
        lock(&self.slot).clone()
    }
}

/// Status code plus body of a rendered page.
pub struct HttpResponse {
    status_code: u16,
    content_type: &'static str,
    body: Body,
    render_file_path: Option<String>,
    stream_errors: Option<StreamErrorHandler>,
}

impl HttpResponse {
    pub(crate) fn html(
        status_code: u16,
        render: HtmlRender,
        render_file_path: impl Into<String>,
        stream_errors: StreamErrorHandler,
    ) -> Self {
        let body = match render {
            HtmlRender::String(html) => Body::String(html),
            HtmlRender::Stream(stream) => Body::Streaming {
                kind: BodyKind::Stream,
                render: Mutex::new(Some(HtmlRender::Stream(stream))),
            },
            HtmlRender::Pipe(pipe) => Body::Streaming {
                kind: BodyKind::Pipe,
                render: Mutex::new(Some(HtmlRender::Pipe(pipe))),
            },
        };
        Self {
            status_code,
            content_type: CONTENT_TYPE_HTML,
            body,
            render_file_path: Some(render_file_path.into()),
            stream_errors: Some(stream_errors),
        }
    }

    pub(crate) fn json(status_code: u16, body: String) -> Self {
        Self {
            status_code,
            content_type: CONTENT_TYPE_JSON,
            body: Body::String(body),
            render_file_path: None,
            stream_errors: None,
        }
    }

    /// 200, 404 or 500.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// `text/html` for documents, `application/json` for data responses.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// File defining the `render()` hook that produced the body.
    pub fn render_file_path(&self) -> Option<&str> {
        self.render_file_path.as_deref()
    }

    /// Representation of the body.
    pub fn body_kind(&self) -> BodyKind {
        match &self.body {
            Body::String(_) => BodyKind::String,
            Body::Streaming { kind, .. } => *kind,
        }
    }

    /// Whether [`HttpResponse::body`] is available.
    pub fn can_provide_string(&self) -> bool {
        self.body_kind() == BodyKind::String
    }

    /// The materialized body.
    pub fn body(&self) -> Result<&str> {
        match &self.body {
            Body::String(body) => Ok(body),
            Body::Streaming { kind, .. } => Err(SsrError::usage(format!(
                "`http_response.body()` is not available because your `render()` hook ({}) provides an HTML {}. Use `http_response.get_body().await` instead.",
                self.render_file_path.as_deref().unwrap_or("unknown"),
                kind_name(*kind)
            ))),
        }
    }

    /// The body as a string, draining a stream or pipe if needed.
    ///
    /// A stream can be consumed once. A body that isn't valid UTF-8 is a
    /// [`SsrError::Stream`] error.
    pub async fn get_body(&self) -> Result<String> {
        if let Body::String(body) = &self.body {
            return Ok(body.clone());
        }
        let render = self.take_render()?;
        let handler = self.stream_handler();
        let bytes = match render {
            HtmlRender::String(html) => return Ok(html),
            HtmlRender::Stream(stream) => {
                let mut guarded = guard_stream(stream, handler.clone());
                let mut bytes = Vec::new();
                while let Some(chunk) = guarded.next().await {
                    bytes.extend_from_slice(&chunk?);
                }
                bytes
            }
            HtmlRender::Pipe(pipe) => {
                let buffer = Arc::new(Mutex::new(Vec::new()));
                let sink_buffer = buffer.clone();
                let sink: BodySink = Box::pin(futures_util::sink::unfold((), move |(), chunk: Vec<u8>| {
                    let buffer = sink_buffer.clone();
                    async move {
                        lock(&buffer).extend_from_slice(&chunk);
                        Ok::<_, BoxError>(())
                    }
                }));
                if let Err(err) = pipe(sink).await {
                    return Err(handler.report(err));
                }
                let bytes = std::mem::take(&mut *lock(&buffer));
                bytes
            }
        };
        String::from_utf8(bytes).map_err(|err| handler.report(Box::new(err)))
    }

    /// The body as a readable stream.
    ///
    /// The first chunk error is logged, recorded and yielded; the stream
    /// ends right after it.
    pub fn body_stream(&self) -> Result<BodyStream> {
        match self.body_kind() {
            BodyKind::Stream => {}
            other => return Err(self.unavailable("body_stream()", "a readable stream", other)),
        }
        match self.take_render()? {
            HtmlRender::Stream(stream) => Ok(guard_stream(stream, self.stream_handler())),
            other => Err(self.unavailable("body_stream()", "a readable stream", kind_of(&other))),
        }
    }

    /// Pipes the body into `sink`.
    ///
    /// An error raised by the pipe is logged, recorded and returned as
    /// [`SsrError::Stream`]; the status was already sent at that point.
    pub async fn pipe(&self, sink: BodySink) -> Result<()> {
        match self.body_kind() {
            BodyKind::Pipe => {}
            other => return Err(self.unavailable("pipe()", "a pipe", other)),
        }
        match self.take_render()? {
            HtmlRender::Pipe(pipe) => pipe(sink).await.map_err(|err| self.stream_handler().report(err)),
            other => Err(self.unavailable("pipe()", "a pipe", kind_of(&other))),
        }
    }

    /// Error raised mid-stream, if any.
    pub fn stream_error(&self) -> Option<HookError> {
        self.stream_errors.as_ref().and_then(StreamErrorHandler::recorded)
    }

    fn take_render(&self) -> Result<HtmlRender> {
        match &self.body {
            Body::String(body) => Ok(HtmlRender::String(body.clone())),
            Body::Streaming { render, .. } => lock(render).take().ok_or_else(|| {
                SsrError::usage("The HTML stream of this response was already consumed; a stream can be read only once.")
            }),
        }
    }

    fn stream_handler(&self) -> StreamErrorHandler {
        self.stream_errors
            .clone()
            .unwrap_or_else(|| StreamErrorHandler::new(SsrEnv::default(), "unknown"))
    }

    fn unavailable(&self, accessor: &str, wanted: &str, actual: BodyKind) -> SsrError {
        SsrError::usage(format!(
            "`http_response.{}` is not available: make sure your `render()` hook ({}) provides {}. It provides an HTML {}.",
            accessor,
            self.render_file_path.as_deref().unwrap_or("unknown"),
            wanted,
            kind_name(actual)
        ))
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status_code", &self.status_code)
            .field("content_type", &self.content_type)
            .field("body_kind", &self.body_kind())
            .field("render_file_path", &self.render_file_path)
            .finish()
    }
}

fn guard_stream(stream: HtmlStream, handler: StreamErrorHandler) -> BodyStream {
    stream::unfold((stream, handler, false), |(mut stream, handler, done)| async move {
        if done {
            return None;
        }
        match stream.next().await {
            Some(Ok(chunk)) => Some((Ok(chunk), (stream, handler, false))),
            Some(Err(err)) => {
                let err = handler.report(err);
                Some((Err(err), (stream, handler, true)))
            }
            None => None,
        }
    })
    .boxed()
}

fn kind_of(render: &HtmlRender) -> BodyKind {
    match render {
        HtmlRender::String(_) => BodyKind::String,
        HtmlRender::Stream(_) => BodyKind::Stream,
        HtmlRender::Pipe(_) => BodyKind::Pipe,
    }
}

fn kind_name(kind: BodyKind) -> &'static str {
    match kind {
        BodyKind::String => "string",
        BodyKind::Stream => "stream",
        BodyKind::Pipe => "pipe",
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
