//! Outbound transport seam
//!
//! [`Transport`] is the interface the interceptor wraps. Any HTTP client can be
//! observed by implementing it; [`ReqwestTransport`] is the implementation the
//! binary uses.
//!
//! A transport hands back the response head as soon as it is available and the
//! body as a chunk stream, so the interceptor can observe chunks as the caller
//! consumes them without changing when the caller sees them.

use crate::call_record::HeaderMap;
use crate::request_target::{CallTarget, Scheme, TargetError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use thiserror::Error;

/// Response body as a stream of chunks
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid call target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Response body failed: {0}")]
    Body(String),
}

/// One outbound call as handed to the transport
///
/// `target` is the caller's original target, untouched by the interceptor.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Entry point the call was made through
    pub scheme: Scheme,
    pub target: CallTarget,
    /// Headers set on the call after the target was given (lower-cased names)
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Response head plus body stream
pub struct InboundResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl InboundResponse {
    /// Response with a body made of fixed chunks
    pub fn from_chunks(status: u16, headers: HeaderMap, chunks: Vec<Bytes>) -> Self {
        let body = futures::stream::iter(chunks.into_iter().map(Ok));
        Self {
            status,
            headers,
            body: Box::pin(body),
        }
    }
}

impl std::fmt::Debug for InboundResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// An outbound HTTP transport
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send the request and resolve once the response head has arrived
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("http-observe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        let descriptor = request.target.resolve(request.scheme)?;
        let method = reqwest::Method::from_bytes(descriptor.method.as_bytes())
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let mut builder = self.client.request(method, descriptor.url());
        for (name, value) in descriptor.headers.iter().chain(request.headers.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())));

        Ok(InboundResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

/// Flatten a header map, joining repeated names with `", "`
pub fn collect_headers(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}
