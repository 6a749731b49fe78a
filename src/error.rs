//! The terminal error recorded on a [`Response`](crate::http::Response).
//!
//! Every variant is cheap to clone: a response hands its recorded error back
//! on each repeated [`decode`](crate::http::Response::decode) call.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::CodecError;
use crate::http::RequestError;
use crate::mediatype::MediaTypeError;
use crate::transport::TransportError;

/// Errors surfaced through a response or an adapter.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Nothing is stored in the cache for this request.
    #[error("no response")]
    NoResponse,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("media type error: {0}")]
    MediaType(#[from] MediaTypeError),

    #[error("no media type for this response")]
    NoMediaType,

    #[error("failed to decode body: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    #[error("failed to encode resource: {0}")]
    Encode(#[source] Arc<serde_json::Error>),

    /// A cached record exists but could not be written or read back.
    #[error("cache record error: {0}")]
    Codec(#[from] CodecError),

    #[error("request error: {0}")]
    Request(#[from] RequestError),
}

impl Error {
    /// Returns `true` for a cache miss.
    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
