//! Log event payloads for captured HTTP exchanges.
//!
//! One [`RequestRecord`] and at most one [`ResponseRecord`] are produced per
//! exchange and handed to the configured [`ExchangeSink`](crate::ExchangeSink).
//! Bodies are snapshots: the bounded prefix observed on the wire, decoded
//! lossily as UTF-8, never the full payload.

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// The request side of an exchange, emitted once per exchange.
///
/// Headers are passed through verbatim; redacting sensitive values is the
/// sink's (or its collaborators') responsibility.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    /// Name of the external system this request was sent to, as supplied to
    /// [`ExchangeLoggerLayer::new`](crate::ExchangeLoggerLayer::new).
    pub external_system: Arc<str>,
    /// Unique identifier correlating this record with its response record.
    pub correlation_id: Uuid,
    /// HTTP method of the outgoing request.
    pub method: Method,
    /// Full request URI.
    pub uri: Uri,
    /// Request headers, unredacted.
    pub headers: HeaderMap,
    /// Captured request body prefix (at most 4096 bytes worth). Empty if the
    /// body was never consumed or the request failed before it was sent.
    pub body: String,
    /// Set when the continuation failed before producing a response; carries
    /// the error message. The error itself still propagates to the caller.
    pub error: Option<String>,
}

/// The response side of an exchange, emitted once per exchange when the
/// response body reaches a terminal state.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    /// Name of the external system the response came from.
    pub external_system: Arc<str>,
    /// Matches the [`RequestRecord::correlation_id`] of the same exchange.
    pub correlation_id: Uuid,
    /// Round-trip time from exchange start to the response body's first
    /// terminal signal. Stopped exactly once per exchange.
    pub elapsed: Duration,
    /// Response status; [`StatusCode::canonical_reason`] supplies the reason
    /// phrase for display.
    pub status: StatusCode,
    /// Response headers, unredacted.
    pub headers: HeaderMap,
    /// Captured response body prefix. On a mid-stream error this holds
    /// whatever was observed before the failure.
    pub body: String,
    /// Set when the response body stream failed; carries the error message.
    pub error: Option<String>,
}
