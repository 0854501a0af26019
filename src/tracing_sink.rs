//! Default sink that emits exchange records as `tracing` debug events.

use tracing::debug;

use crate::{ExchangeSink, RequestRecord, ResponseRecord};

/// [`ExchangeSink`] implementation that logs exchanges through the `tracing`
/// crate at debug level.
///
/// This is the sink installed by [`ExchangeLoggerLayer::new`] and pairs with
/// the layer's default enabled-check, so exchanges are only captured when a
/// subscriber actually listens for these events.
///
/// Two event shapes are emitted per exchange: one for the outgoing request
/// (method, URI, headers, captured body) and one for the response (status,
/// reason phrase, headers, captured body, elapsed milliseconds). On failure
/// the corresponding event carries the error message instead.
///
/// [`ExchangeLoggerLayer::new`]: crate::ExchangeLoggerLayer::new
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl ExchangeSink for TracingSink {
    fn log_request(&self, record: RequestRecord) {
        match record.error {
            None => debug!(
                target: "wiretap",
                external_system = %record.external_system,
                correlation_id = %record.correlation_id,
                method = %record.method,
                uri = %record.uri,
                headers = ?record.headers,
                body = %record.body,
                "outgoing request"
            ),
            Some(ref error) => debug!(
                target: "wiretap",
                external_system = %record.external_system,
                correlation_id = %record.correlation_id,
                method = %record.method,
                uri = %record.uri,
                headers = ?record.headers,
                error = %error,
                "outgoing request failed"
            ),
        }
    }

    fn log_response(&self, record: ResponseRecord) {
        let elapsed_ms = record.elapsed.as_millis() as u64;
        match record.error {
            None => debug!(
                target: "wiretap",
                external_system = %record.external_system,
                correlation_id = %record.correlation_id,
                elapsed_ms,
                status = record.status.as_u16(),
                reason = record.status.canonical_reason().unwrap_or(""),
                headers = ?record.headers,
                body = %record.body,
                "response for outgoing request"
            ),
            Some(ref error) => debug!(
                target: "wiretap",
                external_system = %record.external_system,
                correlation_id = %record.correlation_id,
                elapsed_ms,
                error = %error,
                body = %record.body,
                "error reading response for outgoing request"
            ),
        }
    }
}
