//! Network transport seam
//!
//! The SDK never opens sockets itself. A `Transport` takes an encoded request
//! for one node endpoint and returns the encoded response; connection pooling
//! and reconnects are its own business.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::wire::Operation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Endpoint unreachable or connection dropped.
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    /// Node is shedding load.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Anything else; not retried.
    #[error("transport failed: {0}")]
    Failed(String),
}

impl TransportError {
    /// Node-local failures that another node (or the same node later) may not hit.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send `request` for `operation` to the node at `endpoint`.
    async fn call(
        &self,
        endpoint: &str,
        operation: Operation,
        request: Vec<u8>,
        deadline: Duration,
    ) -> Result<Vec<u8>, TransportError>;
}
