//! Observability hub: the single owner of shared recorder state
//!
//! The hub owns the record buffer, the observer registry, and the capture
//! gate. It is created once at startup, shared as `Arc<ObservabilityHub>` with
//! the interceptor and the HTTP handlers, and shut down explicitly.
//!
//! # Design
//!
//! ```text
//!  Interceptor ──record()──▶ ┌──────────── Mutex<HubState> ────────────┐
//!                            │  RingBuffer<Arc<CallRecord>>             │
//!  /sse ───subscribe()─────▶ │  Broadcaster (observers + heartbeats)    │
//!  stream drop ─unsubscribe─▶│                                          │
//!  /logs /status /clear ───▶ └──────────────────────────────────────────┘
//!                                          │
//!                               CaptureGate (atomic count, read lock-free)
//! ```
//!
//! Appending a record and publishing it happen in one critical section, so
//! buffer order and broadcast order are both completion order. Serialization
//! happens before that section so large bodies never hold the lock.

use crate::broadcaster::{
    Broadcaster, ObserverId, StreamFrame, DEFAULT_QUEUE_CAPACITY, HEARTBEAT_INTERVAL,
};
use crate::call_record::CallRecord;
use crate::capture_gate::CaptureGate;
use crate::ring_buffer::{BufferStats, RingBuffer};
use bytes::Bytes;
use futures::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// Default number of retained records
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default captured body limit (16 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Hub tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Maximum retained records
    pub capacity: usize,
    /// Maximum captured bytes per body
    pub max_body_bytes: usize,
    /// Frames buffered per observer
    pub observer_queue_capacity: usize,
    pub heartbeat_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            observer_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }
}

pub(crate) struct HubState {
    pub(crate) buffer: RingBuffer<Arc<CallRecord>>,
    pub(crate) broadcaster: Broadcaster,
}

/// Process-wide recorder state
pub struct ObservabilityHub {
    gate: CaptureGate,
    max_body_bytes: usize,
    state: Mutex<HubState>,
}

impl ObservabilityHub {
    pub fn new(config: HubConfig) -> Arc<Self> {
        tracing::info!(
            "Observability hub ready (capacity {}, body limit {} bytes)",
            config.capacity,
            config.max_body_bytes
        );
        Arc::new(Self {
            gate: CaptureGate::new(),
            max_body_bytes: config.max_body_bytes,
            state: Mutex::new(HubState {
                buffer: RingBuffer::new(config.capacity),
                broadcaster: Broadcaster::new(
                    config.observer_queue_capacity,
                    config.heartbeat_interval,
                ),
            }),
        })
    }

    /// True while at least one observer is connected
    pub fn capture_active(&self) -> bool {
        self.gate.is_active()
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn observer_count(&self) -> usize {
        self.gate.observer_count()
    }

    /// Append a finalized record and publish it to every observer
    ///
    /// The frame is serialized before the lock is taken. If an observer joined
    /// after the gate was read, the frame is built under the lock instead so
    /// that observer still receives it.
    pub fn record(&self, record: CallRecord) -> Arc<CallRecord> {
        let record = Arc::new(record);
        let mut frame = self.encode_for_observers(&record);

        let mut state = self.lock();
        state.buffer.append(Arc::clone(&record));
        if frame.is_none() && state.broadcaster.observer_count() > 0 {
            frame = StreamFrame::encode_record(&record);
        }
        let delivered = match &frame {
            Some(frame) => state.broadcaster.publish(frame),
            None => 0,
        };
        drop(state);

        tracing::trace!(
            "Recorded {} {} -> {} ({} ms, {} observer(s))",
            record.method,
            record.url,
            record.status_code,
            record.duration_ms,
            delivered
        );
        record
    }

    /// Serialized frame for the current observers, without taking the lock
    fn encode_for_observers(&self, record: &CallRecord) -> Option<Bytes> {
        if self.gate.is_active() {
            StreamFrame::encode_record(record)
        } else {
            None
        }
    }

    /// Register a live observer
    ///
    /// The returned stream yields wire frames. Dropping it is the
    /// connection's close signal and unsubscribes the observer.
    pub fn subscribe(self: &Arc<Self>) -> ObserverStream {
        let (id, receiver) = self.lock().broadcaster.subscribe(&self.gate);
        ObserverStream {
            id,
            frames: Box::pin(BroadcastStream::new(receiver)),
            hub: Arc::downgrade(self),
        }
    }

    /// Deregister an observer. Returns false for unknown ids.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.lock().broadcaster.unsubscribe(id, &self.gate)
    }

    /// Change the retained-record bound, evicting oldest records if needed
    pub fn set_capacity(&self, capacity: usize) {
        self.lock().buffer.set_capacity(capacity);
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.lock().buffer.stats()
    }

    /// Force-close every observer; the buffer is left intact
    pub fn shutdown(&self) -> usize {
        let closed = self.lock().broadcaster.close_all(&self.gate);
        tracing::info!("Observability hub shut down");
        closed
    }

    /// Lock the shared state, recovering from a poisoned mutex
    pub(crate) fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wire frames for one observer
///
/// Ends when the hub force-closes the observer. Dropping it unsubscribes.
pub struct ObserverStream {
    id: ObserverId,
    frames: Pin<Box<BroadcastStream<Bytes>>>,
    hub: Weak<ObservabilityHub>,
}

impl ObserverStream {
    pub fn id(&self) -> ObserverId {
        self.id
    }
}

impl Stream for ObserverStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.frames.as_mut().poll_next(cx)) {
                Some(Ok(frame)) => return Poll::Ready(Some(Ok(frame))),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!("{} fell behind; dropped {} oldest frame(s)", this.id, skipped);
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for ObserverStream {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
