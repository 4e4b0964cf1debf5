//! Transport layer
//!
//! The engine talks to the backend only through the [`Transport`] trait so
//! tests can substitute a recording stub for the HTTP client.

mod error;
mod http;

pub use error::TransportError;
pub use http::HttpTransport;

use crate::domain::catalog::EndpointDescriptor;
use crate::domain::types::Params;
use crate::infrastructure::sse::{StreamFrame, StreamOutcome};
use async_trait::async_trait;
use serde_json::Value;

/// One resolved call: the endpoint, its rendered path and the parameters.
#[derive(Debug, Clone, Copy)]
pub struct OutboundCall<'a> {
    pub endpoint: &'a EndpointDescriptor,
    pub path: &'a str,
    pub params: &'a Params,
}

impl OutboundCall<'_> {
    pub fn body(&self) -> Value {
        self.endpoint.build_body(self.params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutcome {
    /// Single-shot reply after the endpoint's response transform.
    Reply(Value),
    /// Streaming reply; frames were delivered through the sink.
    Stream(StreamOutcome),
}

/// Receives decoded frames of a streaming reply.
pub type FrameSink<'a> = &'a mut (dyn FnMut(StreamFrame) + Send);

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        call: OutboundCall<'_>,
        on_frame: FrameSink<'_>,
    ) -> Result<TransportOutcome, TransportError>;
}
