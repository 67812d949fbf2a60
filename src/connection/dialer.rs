use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Byte-stream transport to the gateway. Implemented by the TLS stream in
/// production and by in-memory duplex streams in tests.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

pub type BoxedTransport = Box<dyn Transport>;

/// Produces a connected transport for a gateway endpoint.
///
/// A dialer returns only once the transport is fully established; for TLS
/// that means the handshake has completed. The dial future must be safe to
/// cancel: dropping it must not leak a live transport.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, endpoint: &str) -> Result<BoxedTransport>;
}
