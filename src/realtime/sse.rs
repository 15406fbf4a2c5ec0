use actix_web::http::header::{CacheControl, CacheDirective, ContentEncoding};
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::clock::Clock;
use crate::realtime::stream::{StreamDriver, StreamEvent, StreamTimers, Watcher};

/// Header advertising the client's fallback re-fetch interval, in seconds
pub const FALLBACK_HEADER: &str = "X-Fallback-Poll-Interval";

/// Frames buffered between the driver and the socket
const CHANNEL_CAPACITY: usize = 16;

/// Encode an event as an SSE frame
pub fn encode_event(event: &StreamEvent) -> Bytes {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("event: {}\ndata: {}\n\n", event.name(), data))
}

/// First frame of every stream: sets the client's reconnection delay
pub fn retry_frame(fallback: Duration) -> Bytes {
    Bytes::from(format!("retry: {}\n\n", fallback.as_millis()))
}

/// Response body for one SSE connection
///
/// Owns the drop guard of the connection's cancellation token: when actix drops the body
/// on disconnect, the driver task is cancelled.
pub struct SseBody {
    preamble: Option<Bytes>,
    events: ReceiverStream<StreamEvent>,
    _guard: DropGuard,
}

impl SseBody {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>, cancel: CancellationToken, fallback: Duration) -> Self {
        Self {
            preamble: Some(retry_frame(fallback)),
            events: ReceiverStream::new(receiver),
            _guard: cancel.drop_guard(),
        }
    }
}

impl Stream for SseBody {
    type Item = Result<Bytes, actix_web::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(preamble) = this.preamble.take() {
            return Poll::Ready(Some(Ok(preamble)));
        }
        Pin::new(&mut this.events)
            .poll_next(cx)
            .map(|event| event.map(|e| Ok(encode_event(&e))))
    }
}

/// Spawn a driver for `watcher` and return the streaming response wired to it
pub fn sse_response(
    watcher: Box<dyn Watcher>,
    clock: Arc<dyn Clock>,
    timers: StreamTimers,
    fallback: Duration,
) -> HttpResponse {
    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    let driver = StreamDriver::new(watcher, clock, timers, sender, cancel.clone());
    tokio::spawn(driver.run());

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(CacheControl(vec![CacheDirective::NoCache]))
        .insert_header(ContentEncoding::Identity)
        .insert_header((FALLBACK_HEADER, fallback.as_secs().to_string()))
        .streaming(SseBody::new(receiver, cancel, fallback))
}
