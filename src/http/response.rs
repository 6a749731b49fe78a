//! The response produced by every client and cache operation.
//!
//! A [`Response`] folds three outcomes into one queryable value:
//!
//! - a transport-level failure ([`Response::is_error`]),
//! - an API-level failure signalled by the status code ([`Response::is_api_error`]),
//! - success, with a body that can be decoded at most once.

use bytes::Bytes;
use tracing::trace;

use super::{Headers, StatusCode};
use crate::error::Error;
use crate::hypermedia::{MediaHeader, Relations};
use crate::mediatype::{Decodable, MediaType};
use crate::transport::TransportError;

/// Status, headers, and body exactly as a transport (or a cache record) supplied them.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A single-consumer body.
///
/// The bytes are reference-counted, so the cache can take a snapshot without
/// consuming the body.
#[derive(Debug)]
struct Body {
    data: Bytes,
    consumed: bool,
}

impl Body {
    fn new(data: Bytes) -> Self {
        Self {
            data,
            consumed: false,
        }
    }

    fn closed() -> Self {
        Self {
            data: Bytes::new(),
            consumed: true,
        }
    }

    fn tee(&self) -> Option<Bytes> {
        (!self.consumed).then(|| self.data.clone())
    }

    // Callers check `consumed` first.
    fn acquire(&mut self) -> BodyGuard<'_> {
        BodyGuard { body: self }
    }

    fn close(&mut self) {
        self.consumed = true;
        self.data = Bytes::new();
    }
}

/// Scoped access to a body; closes it when dropped, on every exit path.
struct BodyGuard<'a> {
    body: &'a mut Body,
}

impl BodyGuard<'_> {
    fn bytes(&self) -> &Bytes {
        &self.body.data
    }
}

impl Drop for BodyGuard<'_> {
    fn drop(&mut self) {
        self.body.close();
    }
}

/// The outcome of one request/response exchange.
///
/// # Examples
///
/// ```
/// use serde::Deserialize;
/// use tether::http::{RawResponse, Response, StatusCode};
///
/// #[derive(Default, Deserialize)]
/// struct User {
///     login: String,
/// }
///
/// let raw = RawResponse::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(r#"{"login":"octocat"}"#);
/// let mut response = Response::from_raw(raw);
/// assert!(!response.any_error());
///
/// let mut user = User::default();
/// response.decode(Some(&mut user)).unwrap();
/// assert_eq!(user.login, "octocat");
///
/// // The body is gone; decoding again is a no-op.
/// assert!(response.decode(Some(&mut user)).is_ok());
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
    error: Option<Error>,
    media_type: Option<MediaType>,
    media_header: MediaHeader,
    api_error: bool,
}

impl Response {
    /// Builds a response from a transport result.
    pub fn build(result: Result<RawResponse, TransportError>) -> Self {
        match result {
            Ok(raw) => Self::from_raw(raw),
            Err(err) => Self::from_error(err.into()),
        }
    }

    /// Builds a response from a completed exchange.
    ///
    /// An unparsable `Content-Type` discards the body and yields an error
    /// response; nothing partially valid is returned.
    pub fn from_raw(raw: RawResponse) -> Self {
        let RawResponse {
            status,
            mut headers,
            body,
        } = raw;
        // Parsed messages never carry padded values; keep built ones alike.
        headers.trim_values();

        let media_type = match headers.get("content-type") {
            Some(value) if !value.trim().is_empty() => match MediaType::parse(value) {
                Ok(media_type) => Some(media_type),
                Err(err) => {
                    trace!(content_type = value, error = %err, "unparsable content type");
                    return Self::from_error(err.into());
                }
            },
            _ => None,
        };

        let media_header = MediaHeader::decode(&headers);

        Self {
            status,
            api_error: status.is_api_error(),
            headers,
            body: Body::new(body),
            error: None,
            media_type,
            media_header,
        }
    }

    /// A response that failed before any status was available.
    ///
    /// It has no media type, no relations, and a closed body.
    pub fn from_error(error: Error) -> Self {
        Self {
            status: StatusCode::NONE,
            headers: Headers::new(),
            body: Body::closed(),
            error: Some(error),
            media_type: None,
            media_header: MediaHeader::default(),
            api_error: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn media_type(&self) -> Option<&MediaType> {
        self.media_type.as_ref()
    }

    pub fn media_header(&self) -> &MediaHeader {
        &self.media_header
    }

    /// Shorthand for `media_header().relations`.
    pub fn relations(&self) -> &Relations {
        &self.media_header.relations
    }

    /// The terminal error recorded for this exchange, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// `true` when the exchange failed in transport, media type, decode, or cache.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// `true` when the status code signals an application-level failure.
    pub fn is_api_error(&self) -> bool {
        self.api_error
    }

    pub fn any_error(&self) -> bool {
        self.is_error() || self.is_api_error()
    }

    pub fn is_body_consumed(&self) -> bool {
        self.body.consumed
    }

    /// The recorded error as a `Result`.
    pub fn result(&self) -> Result<(), Error> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Decodes the body into `target`, at most once.
    ///
    /// - Fails with [`Error::NoMediaType`] when no media type is known.
    /// - Returns the recorded outcome without touching the body when `target`
    ///   is `None`, an error is already recorded, or the body was consumed.
    /// - Otherwise reads the body, closes it, and records the decode outcome
    ///   as this response's terminal error.
    pub fn decode(&mut self, target: Option<&mut dyn Decodable>) -> Result<(), Error> {
        let Some(media_type) = self.media_type.as_ref() else {
            return Err(Error::NoMediaType);
        };

        let Some(target) = target else {
            return self.result();
        };
        if self.error.is_some() || self.body.consumed {
            return self.result();
        }

        let body = self.body.acquire();
        let outcome = media_type
            .decoder(body.bytes())
            .map_err(Error::from)
            .and_then(|decoder| target.decode_from(&decoder));
        drop(body);

        self.error = outcome.err();
        self.result()
    }

    /// Like [`decode`](Self::decode), but leaves API-error responses untouched.
    pub fn decode_success(&mut self, target: &mut dyn Decodable) -> Result<(), Error> {
        if self.api_error {
            return self.result();
        }
        self.decode(Some(target))
    }

    /// Reads the raw body directly, consuming it.
    ///
    /// Returns `None` for error responses and already-consumed bodies.
    pub fn read_body(&mut self) -> Option<Bytes> {
        if self.error.is_some() || self.body.consumed {
            return None;
        }
        let body = self.body.acquire();
        Some(body.bytes().clone())
    }

    /// Records `error` as the terminal outcome unless one is already set.
    pub(crate) fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// A shared view of the unread body, for storage alongside the caller's read.
    pub(crate) fn body_snapshot(&self) -> Option<Bytes> {
        self.body.tee()
    }
}
