//! Listener abstraction for the hub's accept loop.
//!
//! The hub's logic is identical whether connections arrive over real TCP
//! or over a simulated network, so the accept side is a trait:
//!
//! - **tokio** (production): implemented for `tokio::net::TcpListener`
//!   below
//! - **turmoil** (testing): implemented in `netspan-harness`, giving the
//!   integration tests deterministic scheduling and fault injection
//!   without touching hub code
//!
//! Accepted streams only need `AsyncRead + AsyncWrite`; the hub splits
//! them and never looks at the concrete type again.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A source of inbound connections.
#[async_trait]
pub trait Accept: Send + Sync + 'static {
    /// Accepted connection type.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Wait for the next inbound connection.
    ///
    /// # Errors
    ///
    /// Propagates transport-level accept failures. The hub treats these
    /// as transient and keeps accepting.
    async fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)>;
}

#[async_trait]
impl Accept for tokio::net::TcpListener {
    type Stream = tokio::net::TcpStream;

    async fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)> {
        tokio::net::TcpListener::accept(self).await
    }
}
