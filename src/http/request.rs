//! Outgoing HTTP requests.

use bytes::Bytes;
use thiserror::Error;
use url::Url;

use super::{Headers, Method};

/// Errors that can occur while building a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("endpoint {0} cannot be a base for relative references")]
    CannotBeABase(Url),
}

/// A request ready to be handed to a transport.
///
/// The URL is always absolute; relative references are resolved by
/// [`Client::resolve_reference`](crate::client::Client::resolve_reference)
/// before a `Request` exists.
///
/// # Examples
///
/// ```
/// use tether::http::{Method, Request};
///
/// let url = "https://api.example.com/users/1".parse().unwrap();
/// let request = Request::new(Method::Get, url).header("Accept", "application/json");
///
/// assert_eq!(request.accept(), Some("application/json"));
/// assert_eq!(request.url().path(), "/users/1");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a `GET` request for `url`.
    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    /// Sets a header, replacing any existing values for the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the absolute request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request headers for in-place modification.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the request body bytes.
    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Returns the negotiation header (`Accept`), if set.
    pub fn accept(&self) -> Option<&str> {
        self.headers.get("accept")
    }
}
