//! Per-exchange bookkeeping: correlation id, stopwatch, emission guards, and
//! the bounded capture buffers shared with the body taps.

use bytes::BytesMut;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, OnceLock, PoisonError,
};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Maximum number of body bytes retained per side for logging.
///
/// Bodies larger than this flow through untouched; only the logged copy is
/// truncated.
pub const MAX_CAPTURED_BYTES: usize = 4096;

/// Bounded accumulator for a body prefix.
///
/// Cheaply cloneable handle; all clones append into the same buffer. Chunk
/// delivery for a single stream is serialized by the transport, so the mutex
/// is only ever contended with the snapshot reader at emission time.
#[derive(Clone, Debug)]
pub(crate) struct CaptureBuffer {
    buf: Arc<Mutex<BytesMut>>,
}

impl CaptureBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(BytesMut::new())),
        }
    }

    /// Append a prefix of `chunk`, never exceeding [`MAX_CAPTURED_BYTES`]
    /// across the whole stream. A no-op once the cap is reached.
    pub(crate) fn push(&self, chunk: &[u8]) {
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        let remaining = MAX_CAPTURED_BYTES - buf.len();
        if remaining == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
    }

    /// Decode the accumulated prefix for logging.
    ///
    /// Truncation happens at a byte boundary, so the tail of the snapshot may
    /// hold a replacement character where a multi-byte sequence was cut.
    /// Tolerated for diagnostic output.
    pub(crate) fn snapshot(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Monotonic stopwatch with an idempotent stop.
#[derive(Debug)]
pub(crate) struct Stopwatch {
    start: Instant,
    stopped: OnceLock<Duration>,
}

impl Stopwatch {
    fn start_new() -> Self {
        Self {
            start: Instant::now(),
            stopped: OnceLock::new(),
        }
    }

    /// Record the elapsed time. Stopping an already-stopped stopwatch is a
    /// no-op; the first stop wins.
    pub(crate) fn stop(&self) {
        let _ = self.stopped.set(self.start.elapsed());
    }

    /// Elapsed time at the moment of stop, or time-so-far if still running.
    pub(crate) fn elapsed(&self) -> Duration {
        self.stopped
            .get()
            .copied()
            .unwrap_or_else(|| self.start.elapsed())
    }
}

/// State owned by a single outbound exchange.
///
/// Created when an enabled exchange starts and shared (via `Arc`) with the
/// two body taps. The atomic flags implement the exactly-once emission
/// guarantee: whichever terminal signal wins the swap performs the log call,
/// every later signal for that side is dropped.
#[derive(Debug)]
pub(crate) struct ExchangeContext {
    correlation_id: Uuid,
    external_system: Arc<str>,
    stopwatch: Stopwatch,
    request_logged: AtomicBool,
    response_logged: AtomicBool,
    request_capture: CaptureBuffer,
    response_capture: CaptureBuffer,
}

impl ExchangeContext {
    /// Build a fresh context; the stopwatch starts immediately.
    pub(crate) fn new(external_system: Arc<str>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            external_system,
            stopwatch: Stopwatch::start_new(),
            request_logged: AtomicBool::new(false),
            response_logged: AtomicBool::new(false),
            request_capture: CaptureBuffer::new(),
            response_capture: CaptureBuffer::new(),
        }
    }

    pub(crate) fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub(crate) fn external_system(&self) -> Arc<str> {
        self.external_system.clone()
    }

    pub(crate) fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub(crate) fn request_capture(&self) -> CaptureBuffer {
        self.request_capture.clone()
    }

    pub(crate) fn response_capture(&self) -> CaptureBuffer {
        self.response_capture.clone()
    }

    pub(crate) fn request_snapshot(&self) -> String {
        self.request_capture.snapshot()
    }

    pub(crate) fn response_snapshot(&self) -> String {
        self.response_capture.snapshot()
    }

    /// Claim the request-side emission. Returns `true` for the first caller
    /// only; concurrent terminal signals race on the atomic swap.
    pub(crate) fn mark_request_logged(&self) -> bool {
        !self.request_logged.swap(true, Ordering::AcqRel)
    }

    /// Claim the response-side emission. Same semantics as
    /// [`mark_request_logged`](Self::mark_request_logged).
    pub(crate) fn mark_response_logged(&self) -> bool {
        !self.response_logged.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_stops_at_the_cap() {
        let capture = CaptureBuffer::new();
        capture.push(&vec![b'a'; 3000]);
        capture.push(&vec![b'b'; 3000]);
        capture.push(&vec![b'c'; 3000]);

        let snapshot = capture.snapshot();
        assert_eq!(snapshot.len(), MAX_CAPTURED_BYTES);
        assert!(snapshot.starts_with(&"a".repeat(3000)));
        assert!(snapshot.ends_with(&"b".repeat(1096)));
    }

    #[test]
    fn capture_keeps_short_bodies_whole() {
        let capture = CaptureBuffer::new();
        capture.push(b"hello ");
        capture.push(b"world");
        assert_eq!(capture.snapshot(), "hello world");
    }

    #[test]
    fn capture_tolerates_split_multibyte_sequences() {
        let capture = CaptureBuffer::new();
        let e_acute = "é".as_bytes(); // two bytes
        capture.push(&e_acute[..1]);
        // lossy decoding yields a replacement character, not a panic
        assert_eq!(capture.snapshot(), "\u{FFFD}");
    }

    #[test]
    fn emission_guards_fire_once_per_side() {
        let ctx = ExchangeContext::new(Arc::from("test-system"));

        assert!(ctx.mark_request_logged());
        assert!(!ctx.mark_request_logged());
        assert!(!ctx.mark_request_logged());

        // the response-side guard is independent
        assert!(ctx.mark_response_logged());
        assert!(!ctx.mark_response_logged());
    }

    #[test]
    fn emission_guards_allow_exactly_one_winner_across_threads() {
        let ctx = Arc::new(ExchangeContext::new(Arc::from("test-system")));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ctx = ctx.clone();
            handles.push(std::thread::spawn(move || ctx.mark_response_logged()));
        }
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn stopwatch_stop_is_idempotent() {
        let stopwatch = Stopwatch::start_new();
        std::thread::sleep(Duration::from_millis(10));
        stopwatch.stop();
        let first = stopwatch.elapsed();

        std::thread::sleep(Duration::from_millis(10));
        stopwatch.stop();
        assert_eq!(stopwatch.elapsed(), first);
        assert!(first >= Duration::from_millis(10));
    }
}
