//! http-observe - Transparent outbound HTTP call recorder
//!
//! This library observes calls made through an instrumented HTTP transport,
//! keeps the most recent ones in a bounded in-memory log, and streams each
//! completed call live to connected observers. Bodies are captured only while
//! at least one observer is watching.

pub mod body_capture;
pub mod broadcaster;
pub mod call_record;
pub mod capture_gate;
pub mod cli;
pub mod config;
pub mod hub;
pub mod interceptor;
pub mod request_target;
pub mod ring_buffer;
pub mod server;
pub mod snapshot;
pub mod transport;

pub use call_record::{CallRecord, TRANSPORT_FAILURE_STATUS};
pub use hub::{HubConfig, ObservabilityHub};
pub use interceptor::{Interceptor, ObservedResponse};
pub use request_target::{CallTarget, RequestOptions, Scheme};
pub use transport::{ReqwestTransport, Transport, TransportError};
