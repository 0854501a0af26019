//! Pass-through body tap with bounded prefix capture.
//!
//! This module wraps an HTTP body stream so that every chunk is forwarded
//! unchanged to its real consumer while a bounded prefix is appended to a
//! [`CaptureBuffer`](crate::context::CaptureBuffer) for logging. The tap also
//! reports the stream's terminal signal (completion or error) exactly once,
//! which is what drives response-side log emission and the stopwatch stop.

use axum::body::{Body, BodyDataStream, Bytes};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::context::CaptureBuffer;

/// How an observed body stream ended.
#[derive(Debug)]
pub(crate) enum Terminal {
    /// The stream finished normally.
    Complete,
    /// The stream failed; carries the error message. The error itself is
    /// forwarded to the downstream consumer untouched.
    Error(String),
}

/// Wrap `body` so its chunks are mirrored into `capture` as they flow
/// through.
///
/// The consumer of the returned [`Body`] sees exactly the chunks, errors, and
/// end-of-stream the original body would have produced. `on_terminal` fires
/// at most once, on the first completion or error; if the body is dropped
/// before reaching a terminal state it never fires.
pub(crate) fn tap_body<F>(body: Body, capture: CaptureBuffer, on_terminal: F) -> Body
where
    F: FnMut(Terminal) + Send + Unpin + 'static,
{
    Body::from_stream(TapStream {
        inner: body.into_data_stream(),
        capture,
        on_terminal: Some(on_terminal),
    })
}

struct TapStream<F> {
    inner: BodyDataStream,
    capture: CaptureBuffer,
    on_terminal: Option<F>,
}

impl<F> Stream for TapStream<F>
where
    F: FnMut(Terminal) + Send + Unpin + 'static,
{
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.capture.push(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(error))) => {
                if let Some(mut on_terminal) = this.on_terminal.take() {
                    on_terminal(Terminal::Error(error.to_string()));
                }
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                if let Some(mut on_terminal) = this.on_terminal.take() {
                    on_terminal(Terminal::Complete);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{tap_body, Terminal};
    use crate::context::{CaptureBuffer, MAX_CAPTURED_BYTES};
    use axum::body::{Body, Bytes};
    use futures::stream;
    use http_body_util::BodyExt;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[tokio::test]
    async fn forwards_content_unchanged_while_capturing() {
        let capture = CaptureBuffer::new();
        let tapped = tap_body(Body::from("Hello, World!"), capture.clone(), |_| {});

        let collected = tapped.collect().await.unwrap().to_bytes();
        assert_eq!(collected, "Hello, World!");
        assert_eq!(capture.snapshot(), "Hello, World!");
    }

    #[tokio::test]
    async fn truncates_capture_but_not_the_stream() {
        let chunks: Vec<Result<Bytes, std::convert::Infallible>> = (0..5)
            .map(|_| Ok(Bytes::from(vec![b'x'; 2000])))
            .collect();
        let body = Body::from_stream(stream::iter(chunks));

        let capture = CaptureBuffer::new();
        let tapped = tap_body(body, capture.clone(), |_| {});

        let collected = tapped.collect().await.unwrap().to_bytes();
        assert_eq!(collected.len(), 10_000);
        assert_eq!(capture.snapshot().len(), MAX_CAPTURED_BYTES);
    }

    #[tokio::test]
    async fn terminal_fires_once_on_completion() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let tapped = tap_body(Body::from("done"), CaptureBuffer::new(), move |signal| {
            assert!(matches!(signal, Terminal::Complete));
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tapped.collect().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminal_reports_stream_errors_with_partial_capture() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from("partial ")),
            Err(std::io::Error::other("connection reset")),
        ];
        let body = Body::from_stream(stream::iter(chunks));

        let capture = CaptureBuffer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let tapped = tap_body(body, capture.clone(), move |signal| {
            seen_clone.lock().unwrap().push(signal);
        });

        let result = tapped.collect().await;
        assert!(result.is_err());

        let signals = seen.lock().unwrap();
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            Terminal::Error(message) => assert!(message.contains("connection reset")),
            other => panic!("expected error signal, got {other:?}"),
        }
        assert_eq!(capture.snapshot(), "partial ");
    }

    #[tokio::test]
    async fn empty_body_completes_with_empty_capture() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let capture = CaptureBuffer::new();
        let tapped = tap_body(Body::empty(), capture.clone(), move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let collected = tapped.collect().await.unwrap().to_bytes();
        assert!(collected.is_empty());
        assert_eq!(capture.snapshot(), "");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
