//! The network leg: turns a [`Request`] into a [`RawResponse`].
//!
//! The client depends only on the [`Transport`] trait. [`TcpTransport`] is the
//! built-in HTTP/1.1 implementation; tests and embedders supply their own.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::http::{HeadError, RawResponse, Request};

mod tcp;

pub use tcp::TcpTransport;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced while performing a network exchange.
///
/// Transport errors are terminal: nothing in this crate retries.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported URL scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("request URL has no host")]
    MissingHost,

    #[error("malformed response head: {0}")]
    Malformed(#[from] HeadError),

    #[error("invalid Content-Length {0:?}")]
    InvalidContentLength(String),

    #[error("malformed chunked body")]
    InvalidChunk,

    #[error("response body truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    #[error("connection closed before the response was complete")]
    UnexpectedEof,

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Performs HTTP exchanges.
///
/// Implementations must be `Send + Sync`; a client shares one transport across
/// tasks. Cancellation and timeouts are the transport's responsibility.
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the complete response.
    fn send<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>>;
}
