//! Instrumenting wrapper around an outbound [`Transport`]
//!
//! The interceptor observes calls without changing them. The caller's target,
//! headers, body bytes and response reach the transport and come back exactly
//! as they would without it; the interceptor only keeps a side record.
//!
//! # Call Lifecycle
//!
//! ```text
//!  http()/https()/request()          resolve metadata (never fails), start clock
//!        │
//!  write(chunk)* ─────────────────── gate open? → request BodyCapture
//!        │
//!  end() / end_with(cb) ──────────── transport.send()
//!        │                             ├─ Err  → finish_err  (status -1)
//!        ▼                             └─ Ok   → response head observed
//!  ObservedBody chunks* ──────────── gate open? → response BodyCapture
//!        │
//!  end of body ───────────────────── finish_ok → hub.record()
//! ```
//!
//! Each call owns one `CallTracker`. Its finish methods consume it, so the
//! success and failure paths are exclusive. A tracker dropped before either
//! ran finalizes on drop, so every observed call yields exactly one record:
//!
//! - response head received, body not read to the end: a record with the real
//!   status and whatever body was read
//! - request sent, call future dropped before a response: a failure record
//! - request never sent: no record
//!
//! Bodies and headers are captured only while the capture gate is open. A call
//! that never saw the gate open produces no record and allocates no capture
//! buffers.

use crate::body_capture::BodyCapture;
use crate::call_record::{CallRecord, HeaderMap};
use crate::hub::ObservabilityHub;
use crate::request_target::{CallTarget, RequestDescriptor, Scheme};
use crate::transport::{BodyStream, OutboundRequest, Transport, TransportError};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Instant;

/// Error recorded when a sent call is cancelled before any response arrived
pub const CANCELLED_MESSAGE: &str = "call cancelled before a response arrived";

/// Observing client: a [`Transport`] with the hub attached
pub struct Interceptor<T> {
    transport: Arc<T>,
    hub: Arc<ObservabilityHub>,
}

impl<T> Clone for Interceptor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<T: Transport> Interceptor<T> {
    pub fn new(transport: T, hub: Arc<ObservabilityHub>) -> Self {
        Self {
            transport: Arc::new(transport),
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<ObservabilityHub> {
        &self.hub
    }

    /// Plain-transport entry point
    pub fn http(&self, target: impl Into<CallTarget>) -> PendingCall<T> {
        self.start(Scheme::Http, target.into())
    }

    /// Encrypted-transport entry point
    pub fn https(&self, target: impl Into<CallTarget>) -> PendingCall<T> {
        self.start(Scheme::Https, target.into())
    }

    /// Entry point chosen from the target's own scheme (plain when it has none)
    pub fn request(&self, target: impl Into<CallTarget>) -> PendingCall<T> {
        let target = target.into();
        let scheme = target.scheme_hint().unwrap_or(Scheme::Http);
        self.start(scheme, target)
    }

    /// Send a body-less request immediately
    pub async fn get(&self, target: impl Into<CallTarget>) -> Result<ObservedResponse, TransportError> {
        self.request(target).end().await
    }

    fn start(&self, scheme: Scheme, target: CallTarget) -> PendingCall<T> {
        let descriptor = target.resolve_lossy(scheme);
        PendingCall {
            transport: Arc::clone(&self.transport),
            scheme,
            target,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            tracker: CallTracker::start(Arc::clone(&self.hub), descriptor),
        }
    }
}

/// A call whose request is still being written
pub struct PendingCall<T> {
    transport: Arc<T>,
    scheme: Scheme,
    target: CallTarget,
    headers: HeaderMap,
    body: BytesMut,
    tracker: CallTracker,
}

impl<T: Transport> PendingCall<T> {
    /// Metadata resolved for this call
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.tracker.descriptor
    }

    /// True if the capture gate has been open at any point of this call
    pub fn capture_seen(&self) -> bool {
        self.tracker.capture_seen
    }

    /// Request body bytes held for the record so far
    pub fn captured_request_bytes(&self) -> usize {
        self.tracker
            .request_body
            .as_ref()
            .map_or(0, BodyCapture::retained_len)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Append request body bytes
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        let chunk = chunk.as_ref();
        self.tracker.observe_request_chunk(chunk);
        self.body.extend_from_slice(chunk);
        self
    }

    /// Finish the request and wait for the response head
    pub async fn end(self) -> Result<ObservedResponse, TransportError> {
        let PendingCall {
            transport,
            scheme,
            target,
            headers,
            body,
            mut tracker,
        } = self;

        tracker.observe_request_headers(&headers);
        tracker.sent = true;
        let request = OutboundRequest {
            scheme,
            target,
            headers,
            body: body.freeze(),
        };

        match transport.send(request).await {
            Ok(response) => {
                tracker.observe_response_head(response.status, &response.headers);
                Ok(ObservedResponse {
                    status: response.status,
                    headers: response.headers,
                    body: ObservedBody {
                        inner: response.body,
                        tracker: Some(tracker),
                    },
                })
            }
            Err(e) => {
                tracker.finish_err(e.to_string());
                Err(e)
            }
        }
    }

    /// Finish the request and hand the response to `on_response`
    ///
    /// The callback runs exactly once, after the response head has been
    /// observed. A panic inside it is caught and logged; it never reaches the
    /// transport. Transport failures are returned without calling it.
    pub async fn end_with<F>(self, on_response: F) -> Result<(), TransportError>
    where
        F: FnOnce(ObservedResponse),
    {
        let response = self.end().await?;
        let url = response.url().to_string();
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(move || on_response(response))) {
            tracing::error!(
                "Completion callback for {} panicked: {}",
                url,
                panic_message(payload.as_ref())
            );
        }
        Ok(())
    }
}

/// Response head plus an observed body
pub struct ObservedResponse {
    status: u16,
    headers: HeaderMap,
    body: ObservedBody,
}

impl std::fmt::Debug for ObservedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl ObservedResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// True if the capture gate has been open at any point of this call
    pub fn capture_seen(&self) -> bool {
        self.body.tracker.as_ref().is_some_and(|t| t.capture_seen)
    }

    /// URL recorded for this call
    pub fn url(&self) -> String {
        self.body
            .tracker
            .as_ref()
            .map(|t| t.descriptor.url())
            .unwrap_or_default()
    }

    /// Body as a chunk stream
    pub fn into_body(self) -> ObservedBody {
        self.body
    }

    /// Drain the body
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Drain the body as text (lossy UTF-8)
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Response chunk stream that records the call when it ends
pub struct ObservedBody {
    inner: BodyStream,
    tracker: Option<CallTracker>,
}

impl Stream for ObservedBody {
    type Item = Result<Bytes, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = ready!(this.inner.as_mut().poll_next(cx));
        match &item {
            Some(Ok(chunk)) => {
                if let Some(tracker) = this.tracker.as_mut() {
                    tracker.observe_response_chunk(chunk);
                }
            }
            Some(Err(e)) => {
                if let Some(tracker) = this.tracker.take() {
                    tracker.finish_err(e.to_string());
                }
            }
            None => {
                if let Some(tracker) = this.tracker.take() {
                    tracker.finish_ok();
                }
            }
        }
        Poll::Ready(item)
    }
}

/// Per-call capture state
struct CallTracker {
    hub: Arc<ObservabilityHub>,
    descriptor: RequestDescriptor,
    started: Instant,
    capture_seen: bool,
    /// Set once the request was handed to the transport
    sent: bool,
    status: Option<u16>,
    request_headers: Option<HeaderMap>,
    response_headers: Option<HeaderMap>,
    request_body: Option<BodyCapture>,
    response_body: Option<BodyCapture>,
    finalized: bool,
}

impl CallTracker {
    fn start(hub: Arc<ObservabilityHub>, descriptor: RequestDescriptor) -> Self {
        let mut tracker = Self {
            hub,
            descriptor,
            started: Instant::now(),
            capture_seen: false,
            sent: false,
            status: None,
            request_headers: None,
            response_headers: None,
            request_body: None,
            response_body: None,
            finalized: false,
        };
        tracker.gate_open();
        tracker
    }

    /// Read the gate, remembering whether it was ever open for this call
    fn gate_open(&mut self) -> bool {
        let open = self.hub.capture_active();
        self.capture_seen |= open;
        open
    }

    fn observe_request_chunk(&mut self, chunk: &[u8]) {
        if chunk.is_empty() || !self.gate_open() {
            return;
        }
        let max = self.hub.max_body_bytes();
        self.request_body
            .get_or_insert_with(|| BodyCapture::new(max))
            .push(chunk);
    }

    fn observe_request_headers(&mut self, extra: &HeaderMap) {
        if !self.gate_open() {
            return;
        }
        let mut headers = self.descriptor.headers.clone();
        headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.request_headers = Some(headers);
    }

    fn observe_response_head(&mut self, status: u16, headers: &HeaderMap) {
        self.status = Some(status);
        if self.gate_open() {
            self.response_headers = Some(headers.clone());
        }
    }

    fn observe_response_chunk(&mut self, chunk: &[u8]) {
        if chunk.is_empty() || !self.gate_open() {
            return;
        }
        let max = self.hub.max_body_bytes();
        self.response_body
            .get_or_insert_with(|| BodyCapture::new(max))
            .push(chunk);
    }

    fn finish_ok(mut self) {
        self.finalize(None);
    }

    fn finish_err(mut self, message: String) {
        self.finalize(Some(message));
    }

    fn finalize(&mut self, error: Option<String>) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        self.gate_open();

        let url = self.descriptor.url();
        if !self.capture_seen {
            tracing::trace!("{} {} completed with capture closed; not recorded", self.descriptor.method, url);
            return;
        }

        let duration_ms = self.started.elapsed().as_millis() as u64;
        let builder = CallRecord::builder(self.descriptor.method.clone(), url)
            .duration_ms(duration_ms)
            .request_headers(self.request_headers.take())
            .response_headers(self.response_headers.take())
            .request_body(render(self.request_body.take()));

        let record = match error {
            None => builder
                .status(self.status.map(i32::from).unwrap_or(0))
                .response_body(render(self.response_body.take()))
                .build(),
            Some(message) => builder.failure(message).build(),
        };
        self.hub.record(record);
    }
}

impl Drop for CallTracker {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        if self.status.is_some() {
            tracing::debug!("{} response body dropped before its end", self.descriptor.url());
            self.finalize(None);
        } else if self.sent {
            self.finalize(Some(CANCELLED_MESSAGE.to_string()));
        } else {
            self.finalized = true;
        }
    }
}

fn render(capture: Option<BodyCapture>) -> String {
    capture.map(|c| c.render()).unwrap_or_default()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
