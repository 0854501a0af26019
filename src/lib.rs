//! # Wiretap
//!
//! A Tower middleware for logging outbound HTTP exchanges — request and
//! response metadata plus a bounded, truncated copy of each body — with full
//! streaming support and without altering what the caller sends or receives.
//!
//! ## Features
//!
//! - **Stream-aware**: taps request and response bodies as they flow through,
//!   never buffering a full payload
//! - **Bounded capture**: at most [`MAX_CAPTURED_BYTES`] of each body are
//!   retained for the log; the real consumer always sees the complete body
//! - **Exactly-once**: each exchange produces one request event and at most
//!   one response event, even when completion and error signals race
//! - **Zero overhead when quiet**: if debug logging is disabled the layer is
//!   a pure pass-through — no allocation, no body wrapping
//! - **Pluggable sinks**: implement [`ExchangeSink`] to route records
//!   anywhere; the default [`TracingSink`] emits structured `tracing` events
//!
//! ## Quick Start
//!
//! Compose the layer in front of whatever service plays the part of the HTTP
//! transport. Every call through the layered service becomes one logged
//! exchange:
//!
//! ```rust
//! use axum::{body::Body, extract::Request, response::Response};
//! use tower::{Service, ServiceBuilder, ServiceExt};
//! use wiretap::ExchangeLoggerLayer;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let transport = tower::service_fn(|_request: Request| async {
//!     Ok::<_, std::io::Error>(Response::new(Body::from(r#"{"status":"ok"}"#)))
//! });
//!
//! let mut client = ServiceBuilder::new()
//!     .layer(ExchangeLoggerLayer::new("billing-api"))
//!     .service(transport);
//!
//! let request = Request::builder()
//!     .method("POST")
//!     .uri("https://billing.internal/v1/charge")
//!     .body(Body::from(r#"{"amount":42}"#))
//!     .unwrap();
//!
//! let response = client.ready().await.unwrap().call(request).await.unwrap();
//! assert_eq!(response.status(), 200);
//! # }
//! ```
//!
//! ## Verbosity gate
//!
//! By default exchanges are only captured when a `tracing` subscriber is
//! interested in debug events for the `wiretap` target. The check is
//! injectable via [`ExchangeLoggerLayer::with_enabled`], which keeps the
//! middleware testable and lets callers wire it to their own configuration
//! instead of a global.
//!
//! ## Custom sinks
//!
//! Implement the [`ExchangeSink`] trait to process [`RequestRecord`] and
//! [`ResponseRecord`] values yourself — ship them to a log aggregator, count
//! them, or assert on them in tests.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, Method, Uri},
    response::Response,
};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

mod context;
use context::ExchangeContext;
pub use context::MAX_CAPTURED_BYTES;

mod tap;
use tap::{tap_body, Terminal};

pub mod record;
pub use record::{RequestRecord, ResponseRecord};

pub mod tracing_sink;
pub use tracing_sink::TracingSink;

/// Destination for exchange log records.
///
/// Implement this trait to receive the captured data for each exchange. The
/// middleware guarantees `log_request` is called exactly once per exchange
/// and `log_response` at most once (never, if the exchange is abandoned
/// before the response body reaches a terminal state).
///
/// Calls happen inline on whatever task is driving the body stream, so
/// implementations should be cheap; hand off to a channel if real work is
/// needed.
///
/// # Examples
///
/// ```rust
/// use wiretap::{ExchangeSink, RequestRecord, ResponseRecord};
///
/// #[derive(Debug)]
/// struct StdoutSink;
///
/// impl ExchangeSink for StdoutSink {
///     fn log_request(&self, record: RequestRecord) {
///         println!("[{}] {} {}", record.correlation_id, record.method, record.uri);
///     }
///
///     fn log_response(&self, record: ResponseRecord) {
///         println!(
///             "[{}] {} in {}ms",
///             record.correlation_id,
///             record.status,
///             record.elapsed.as_millis()
///         );
///     }
/// }
/// ```
pub trait ExchangeSink: Send + Sync + 'static {
    /// Called once per exchange, on the first response value or the first
    /// error from the continuation.
    fn log_request(&self, record: RequestRecord);

    /// Called at most once per exchange, when the response body completes or
    /// fails.
    fn log_response(&self, record: ResponseRecord);
}

type EnabledFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Tower layer that logs outbound HTTP exchanges.
///
/// This is the main entry point. Construct it with the name of the external
/// system being called (attached verbatim to every record), optionally swap
/// the sink or the enabled-check, and layer it over the transport service.
///
/// # Examples
///
/// ```rust,no_run
/// use tower::ServiceBuilder;
/// use wiretap::{ExchangeLoggerLayer, TracingSink};
///
/// let layer = ExchangeLoggerLayer::new("payments-gateway").with_sink(TracingSink);
/// # let _ = ServiceBuilder::new().layer(layer);
/// ```
#[derive(Clone)]
pub struct ExchangeLoggerLayer {
    external_system: Arc<str>,
    sink: Arc<dyn ExchangeSink>,
    enabled: EnabledFn,
}

impl ExchangeLoggerLayer {
    /// Create a layer that logs exchanges with `external_system` via the
    /// default [`TracingSink`], gated on debug-level interest in the
    /// `wiretap` tracing target.
    pub fn new(external_system: impl Into<Arc<str>>) -> Self {
        Self {
            external_system: external_system.into(),
            sink: Arc::new(TracingSink),
            enabled: Arc::new(|| tracing::enabled!(target: "wiretap", tracing::Level::DEBUG)),
        }
    }

    /// Replace the sink that receives exchange records.
    pub fn with_sink<K: ExchangeSink>(mut self, sink: K) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Replace the fast-skip check. When the predicate returns `false` the
    /// service forwards requests untouched: no context is allocated and no
    /// body is wrapped.
    pub fn with_enabled<F>(mut self, enabled: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.enabled = Arc::new(enabled);
        self
    }
}

impl<S> Layer<S> for ExchangeLoggerLayer {
    type Service = ExchangeLoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ExchangeLoggerService {
            inner,
            external_system: self.external_system.clone(),
            sink: self.sink.clone(),
            enabled: self.enabled.clone(),
        }
    }
}

/// Tower service produced by [`ExchangeLoggerLayer`].
///
/// Wraps the inner service (the "continuation" that actually performs the
/// exchange) and observes one request/response pair per call. The response
/// returned to the caller is behaviorally identical to the inner service's:
/// same status, headers, body content, and errors. Only the logged copies
/// are truncated.
#[derive(Clone)]
pub struct ExchangeLoggerService<S> {
    inner: S,
    external_system: Arc<str>,
    sink: Arc<dyn ExchangeSink>,
    enabled: EnabledFn,
}

impl<S> Service<Request> for ExchangeLoggerService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        if !(self.enabled)() {
            // Hot path: nothing allocated, nothing wrapped.
            return Box::pin(self.inner.call(request));
        }

        let ctx = Arc::new(ExchangeContext::new(self.external_system.clone()));

        let method = request.method().clone();
        let uri = request.uri().clone();
        let headers = request.headers().clone();

        let body = std::mem::replace(request.body_mut(), Body::empty());
        *request.body_mut() = tap_body(body, ctx.request_capture(), |_| {});

        let sink = self.sink.clone();
        let future = self.inner.call(request);

        Box::pin(async move {
            match future.await {
                Ok(mut response) => {
                    emit_request(&sink, &ctx, method, uri, headers, None);

                    let status = response.status();
                    let response_headers = response.headers().clone();
                    let body = std::mem::replace(response.body_mut(), Body::empty());
                    let tap_ctx = ctx.clone();
                    *response.body_mut() = tap_body(body, ctx.response_capture(), move |signal| {
                        tap_ctx.stopwatch().stop();
                        if !tap_ctx.mark_response_logged() {
                            return;
                        }
                        let error = match signal {
                            Terminal::Complete => None,
                            Terminal::Error(message) => Some(message),
                        };
                        sink.log_response(ResponseRecord {
                            external_system: tap_ctx.external_system(),
                            correlation_id: tap_ctx.correlation_id(),
                            elapsed: tap_ctx.stopwatch().elapsed(),
                            status,
                            headers: response_headers.clone(),
                            body: tap_ctx.response_snapshot(),
                            error,
                        });
                    });

                    Ok(response)
                }
                Err(error) => {
                    emit_request(&sink, &ctx, method, uri, headers, Some(error.to_string()));
                    Err(error)
                }
            }
        })
    }
}

/// Emit the request-side record if this exchange has not logged one yet.
fn emit_request(
    sink: &Arc<dyn ExchangeSink>,
    ctx: &ExchangeContext,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    error: Option<String>,
) {
    if !ctx.mark_request_logged() {
        return;
    }
    sink.log_request(RequestRecord {
        external_system: ctx.external_system(),
        correlation_id: ctx.correlation_id(),
        method,
        uri,
        headers,
        body: ctx.request_snapshot(),
        error,
    });
}
