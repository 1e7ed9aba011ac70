// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Turns an [`HttpResponse`] into an axum [`Response`].
//!
//! String bodies are sent as-is. Streams are forwarded chunk by chunk, and
//! pipes write into a channel drained by the response body. Once the status
//! line is out, a failing stream aborts the connection.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::stream;
use ssrkit::{BodyKind, BodySink, BoxError, HttpResponse};
use tokio::sync::mpsc;

const PIPE_BUFFER: usize = 16;

/// Converts a rendered response envelope.
pub fn into_response(http_response: HttpResponse) -> Response {
    let status = StatusCode::from_u16(http_response.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = http_response.content_type();

    let body = match http_response.body_kind() {
        BodyKind::String => match http_response.body() {
            Ok(body) => Body::from(body.to_string()),
            Err(err) => return internal_error(err),
        },
        BodyKind::Stream => match http_response.body_stream() {
            Ok(body_stream) => Body::from_stream(body_stream),
            Err(err) => return internal_error(err),
        },
        BodyKind::Pipe => pipe_body(http_response),
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response())
}

/// Runs the pipe on its own task and streams what it writes.
fn pipe_body(http_response: HttpResponse) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Vec<u8>, BoxError>>(PIPE_BUFFER);

    let sink_tx = tx.clone();
    let sink: BodySink = Box::pin(futures_util::sink::unfold(sink_tx, |tx, chunk: Vec<u8>| async move {
        tx.send(Ok(chunk)).await.map_err(|err| Box::new(err) as BoxError)?;
        Ok::<_, BoxError>(tx)
    }));

    tokio::spawn(async move {
        // Already logged by the response; the client only sees the aborted body.
        if let Err(err) = http_response.pipe(sink).await {
            let _ = tx.send(Err(Box::new(err) as BoxError)).await;
        }
    });

    Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }))
}

fn internal_error(err: ssrkit::SsrError) -> Response {
    tracing::error!("Could not send rendered page: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, FutureExt, SinkExt, StreamExt};
    use ssrkit::{
        dangerously_skip_escape, hook_fn, DocumentHtml, FileExports, HookReturn, MemoryPageFiles, PageContext,
        PageContextInit, Renderer,
    };
    use std::sync::Arc;

    async fn render(document: fn() -> DocumentHtml) -> HttpResponse {
        let render = hook_fn(move |_ctx: &PageContext| async move { Ok(HookReturn::document(document())) });
        let pages = MemoryPageFiles::new()
            .with_file("/pages/index.page", FileExports::new())
            .unwrap()
            .with_file("/pages/_default.page.client", FileExports::new())
            .unwrap()
            .with_file("/pages/_default.page.server", FileExports::new().with_hook("render", render))
            .unwrap();
        let renderer = Renderer::new(Arc::new(pages));
        renderer.render_page(PageContextInit::new("/")).await.http_response.unwrap()
    }

    async fn collect(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_string_body() {
        let response = into_response(render(|| dangerously_skip_escape("<p>hi</p>")).await);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html;charset=utf-8");
        assert!(collect(response).await.contains("<p>hi</p>"));
    }

    #[tokio::test]
    async fn test_stream_body() {
        let response = into_response(
            render(|| {
                let chunks = vec![Ok(b"<p>a</p>".to_vec()), Ok(b"<p>b</p>".to_vec())];
                DocumentHtml::from_stream(stream::iter(chunks).boxed())
            })
            .await,
        );
        assert_eq!(collect(response).await, "<p>a</p><p>b</p>");
    }

    #[tokio::test]
    async fn test_pipe_body() {
        let response = into_response(
            render(|| {
                DocumentHtml::from_pipe(|mut sink: BodySink| {
                    async move {
                        sink.send(b"<p>piped</p>".to_vec()).await?;
                        sink.close().await?;
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })
            })
            .await,
        );
        assert_eq!(collect(response).await, "<p>piped</p>");
    }
}
