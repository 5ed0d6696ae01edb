//! Live fan-out of completed calls to connected observers
//!
//! Each observer owns a bounded queue. A record is serialized once, outside the
//! hub lock, and `publish` queues the same frame for every observer. A
//! heartbeat task per observer queues a ping every 15 seconds so idle
//! connections survive intermediaries that cut quiet streams.
//!
//! # Wire Frames
//!
//! ```text
//! :\n                                   sent once, on subscribe
//! data: {"time":...,"ms":...}\n\n       one per completed call
//! event: ping\ndata: {"ts":<ms>}\n\n    heartbeat
//! ```
//!
//! # Backpressure
//!
//! Queues drop the *oldest* undelivered frames when a reader falls behind.
//! The reader learns how many frames it skipped and resumes with the newest
//! ones; the server never buffers without bound for a slow observer.
//!
//! The registry is not synchronized on its own. The hub mutates it inside the
//! same critical section as the record buffer, and the capture gate count only
//! changes there.

use crate::call_record::CallRecord;
use crate::capture_gate::CaptureGate;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Heartbeat period for live connections
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Default per-observer queue depth, in frames
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Largest accepted per-observer queue depth, in frames
///
/// Queues are preallocated and their depth is rounded up to a power of two.
pub const MAX_QUEUE_CAPACITY: usize = 65_536;

/// Identity of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// One event on the live stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Leading comment that defeats proxy buffering
    Open,
    /// Serialized call record
    Record(String),
    /// Heartbeat carrying epoch milliseconds
    Ping { ts: i64 },
}

impl StreamFrame {
    pub fn record(record: &CallRecord) -> Result<Self, serde_json::Error> {
        serde_json::to_string(record).map(StreamFrame::Record)
    }

    /// Encoded `data:` frame for a record, or `None` if it cannot be serialized
    pub fn encode_record(record: &CallRecord) -> Option<Bytes> {
        match Self::record(record) {
            Ok(frame) => Some(frame.encode()),
            Err(e) => {
                tracing::error!("Failed to serialize call record for {}: {}", record.url, e);
                None
            }
        }
    }

    pub fn ping_now() -> Self {
        StreamFrame::Ping {
            ts: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Exact bytes written to the connection
    pub fn encode(&self) -> Bytes {
        match self {
            StreamFrame::Open => Bytes::from_static(b":\n"),
            StreamFrame::Record(json) => Bytes::from(format!("data: {}\n\n", json)),
            StreamFrame::Ping { ts } => {
                Bytes::from(format!("event: ping\ndata: {{\"ts\":{}}}\n\n", ts))
            }
        }
    }
}

struct ObserverSlot {
    queue: broadcast::Sender<Bytes>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Drop for ObserverSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }
}

/// Registry of live observers
pub struct Broadcaster {
    observers: HashMap<ObserverId, ObserverSlot>,
    next_id: u64,
    queue_capacity: usize,
    heartbeat_interval: Duration,

    /// Frames that could not be queued because the connection was gone
    failed_deliveries: u64,
}

impl Broadcaster {
    /// # Arguments
    ///
    /// * `queue_capacity` - Frames buffered per observer before the oldest are
    ///   dropped, clamped to `1..=MAX_QUEUE_CAPACITY` and rounded up to a power of two
    /// * `heartbeat_interval` - Period between pings on each connection
    pub fn new(queue_capacity: usize, heartbeat_interval: Duration) -> Self {
        Self {
            observers: HashMap::new(),
            next_id: 1,
            queue_capacity: queue_capacity.clamp(1, MAX_QUEUE_CAPACITY).next_power_of_two(),
            heartbeat_interval,
            failed_deliveries: 0,
        }
    }

    /// Register a connection and open the gate for it
    ///
    /// The opening comment is already queued on the returned receiver. The
    /// heartbeat task needs a tokio runtime; outside one the observer still
    /// receives records, just no pings.
    pub fn subscribe(&mut self, gate: &CaptureGate) -> (ObserverId, broadcast::Receiver<Bytes>) {
        let id = ObserverId(self.next_id);
        self.next_id += 1;

        let (queue, receiver) = broadcast::channel(self.queue_capacity);
        // The receiver is alive, so this cannot fail
        let _ = queue.send(StreamFrame::Open.encode());

        let heartbeat = spawn_heartbeat(id, queue.clone(), self.heartbeat_interval);
        self.observers.insert(id, ObserverSlot { queue, heartbeat });
        gate.observer_joined();

        tracing::info!(
            "{} subscribed ({} connected)",
            id,
            self.observers.len()
        );
        (id, receiver)
    }

    /// Stop the heartbeat, deregister, and let the gate know
    ///
    /// Unknown ids are ignored and leave the gate untouched, so a connection
    /// that was already force-closed can report its own close safely.
    pub fn unsubscribe(&mut self, id: ObserverId, gate: &CaptureGate) -> bool {
        if self.observers.remove(&id).is_none() {
            return false;
        }
        gate.observer_left();
        tracing::info!(
            "{} unsubscribed ({} connected)",
            id,
            self.observers.len()
        );
        true
    }

    /// Queue an encoded record frame for every registered observer
    ///
    /// Returns how many observers accepted the frame. Delivery failures are
    /// logged and never surface to the caller; an observer whose connection is
    /// gone stays registered until its own close arrives.
    pub fn publish(&mut self, frame: &Bytes) -> usize {
        let mut delivered = 0;
        for (id, slot) in &self.observers {
            match slot.queue.send(frame.clone()) {
                Ok(_) => delivered += 1,
                Err(_) => {
                    self.failed_deliveries += 1;
                    tracing::debug!("{} queue is closed; waiting for its disconnect", id);
                }
            }
        }
        delivered
    }

    /// Force-close every observer. Their streams end once drained.
    pub fn close_all(&mut self, gate: &CaptureGate) -> usize {
        let closed = self.observers.len();
        for _ in self.observers.drain() {
            gate.observer_left();
        }
        if closed > 0 {
            tracing::info!("Closed {} observer connection(s)", closed);
        }
        closed
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Effective per-observer queue depth
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn failed_deliveries(&self) -> u64 {
        self.failed_deliveries
    }
}

fn spawn_heartbeat(
    id: ObserverId,
    queue: broadcast::Sender<Bytes>,
    period: Duration,
) -> Option<JoinHandle<()>> {
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(runtime) => runtime,
        Err(_) => {
            tracing::warn!("No tokio runtime; {} will not receive heartbeats", id);
            return None;
        }
    };

    Some(runtime.spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        loop {
            ticker.tick().await;
            if queue.send(StreamFrame::ping_now().encode()).is_err() {
                tracing::trace!("{} heartbeat stopped: receiver gone", id);
                break;
            }
        }
    }))
}
