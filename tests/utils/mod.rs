// Shared helpers for the integration tests
//
// `ScriptedTransport` stands in for the network: it answers every request with
// a fixed script and keeps what it was sent so tests can check the interceptor
// forwarded the call untouched.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http_observe::call_record::HeaderMap;
use http_observe::hub::{HubConfig, ObservabilityHub};
use http_observe::transport::{InboundResponse, OutboundRequest, Transport, TransportError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the transport does with each request
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply with a status, headers and body chunks
    Respond {
        status: u16,
        headers: HeaderMap,
        chunks: Vec<Bytes>,
    },
    /// Fail before any response head
    FailConnect(String),
    /// Send the head and some chunks, then fail
    FailMidBody {
        status: u16,
        chunks: Vec<Bytes>,
        error: String,
    },
}

pub struct ScriptedTransport {
    script: Script,
    delay: Option<Duration>,
    sent: Arc<Mutex<Vec<OutboundRequest>>>,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: None,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 200 with a single-chunk body
    pub fn ok(body: &str) -> Self {
        Self::new(Script::Respond {
            status: 200,
            headers: HeaderMap::new(),
            chunks: vec![Bytes::copy_from_slice(body.as_bytes())],
        })
    }

    /// Wait before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle on the requests this transport received
    pub fn sent(&self) -> Arc<Mutex<Vec<OutboundRequest>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        self.sent.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.script.clone() {
            Script::Respond {
                status,
                headers,
                chunks,
            } => Ok(InboundResponse::from_chunks(status, headers, chunks)),
            Script::FailConnect(message) => Err(TransportError::Connect(message)),
            Script::FailMidBody {
                status,
                chunks,
                error,
            } => {
                let body = futures::stream::iter(chunks.into_iter().map(Ok))
                    .chain(futures::stream::once(async move { Err(TransportError::Body(error)) }));
                Ok(InboundResponse {
                    status,
                    headers: HeaderMap::new(),
                    body: Box::pin(body),
                })
            }
        }
    }
}

/// Hub with a small buffer and body limit
pub fn test_hub(capacity: usize, max_body_bytes: usize) -> Arc<ObservabilityHub> {
    ObservabilityHub::new(HubConfig {
        capacity,
        max_body_bytes,
        ..HubConfig::default()
    })
}

/// Strip the `data: ` framing from a record frame
pub fn frame_payload(frame: &[u8]) -> String {
    let text = std::str::from_utf8(frame).expect("frame is UTF-8");
    text.strip_prefix("data: ")
        .expect("record frame")
        .trim_end_matches('\n')
        .to_string()
}
