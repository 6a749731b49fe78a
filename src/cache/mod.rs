//! Response cache: key derivation, the storage [`Adapter`] contract, and the
//! reference [`MemoryAdapter`].
//!
//! Responses are cached per *representation* of a resource: the key is the
//! request's `Accept` value and its resolved URL, nothing else. Method, body,
//! and every other header are ignored.
//!
//! ```
//! use tether::cache::{request_digest, request_key};
//! use tether::http::{Method, Request};
//!
//! let url: url::Url = "https://api.example.com/users/1".parse().unwrap();
//! let get = Request::get(url.clone()).header("Accept", "application/json");
//! let post = Request::new(Method::Post, url)
//!     .header("Accept", "application/json")
//!     .header("Authorization", "token abc")
//!     .body("{}");
//!
//! assert_eq!(request_key(&get), "application/json:https://api.example.com/users/1");
//! assert_eq!(request_digest(&get), request_digest(&post));
//! ```
//!
//! Backends other than memory store the bytes produced by [`codec::encode`]
//! under [`request_digest`]; that record format is their whole contract.

use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::http::{Request, Response};
use crate::hypermedia::Relations;
use crate::mediatype::{Decodable, Encodable};

pub mod codec;
mod memory;

pub use codec::CodecError;
pub use memory::MemoryAdapter;

/// Request header whose value scopes the cache key.
pub const KEY_HEADER: &str = "Accept";

/// Separator between the negotiation header and the URL in a cache key.
pub const KEY_SEPARATOR: &str = ":";

/// A response cache backend.
///
/// Every operation derives its key from the request; callers never build keys
/// themselves. Implementations must be safe to share across threads.
pub trait Adapter: Send + Sync {
    /// Looks up the cached response for `request`.
    ///
    /// A miss returns [`empty_response`]. A hit returns a reconstructed response
    /// that has not been read; when `target` is given it is decoded into, and a
    /// decode failure is recorded on the returned response.
    fn get(&self, request: &Request, target: Option<&mut dyn Decodable>) -> Response;

    /// Stores a snapshot of `response` for `request`, replacing any previous one.
    ///
    /// `original` is the already-decoded resource. Adapters may store it
    /// directly, or re-encode it when the response body has been consumed; in
    /// every case [`get`](Self::get) must yield a response that decodes as if it
    /// came fresh from the transport.
    fn set(
        &self,
        request: &Request,
        response: &Response,
        original: Option<&dyn Encodable>,
    ) -> Result<(), Error>;

    /// Hypermedia relations for the resource `request` addresses.
    ///
    /// Relations do not expire: servers are expected to redirect when
    /// resources move.
    fn rels(&self, request: &Request) -> Relations;
}

/// Human-readable cache key: `Accept` value, [`KEY_SEPARATOR`], resolved URL.
pub fn request_key(request: &Request) -> String {
    format!(
        "{}{}{}",
        request.headers().get(KEY_HEADER).unwrap_or_default(),
        KEY_SEPARATOR,
        request.url()
    )
}

/// Fixed-length cache key: lowercase hex SHA-256 of [`request_key`].
pub fn request_digest(request: &Request) -> String {
    hex::encode(Sha256::digest(request_key(request).as_bytes()))
}

/// The response every adapter returns on a miss.
pub fn empty_response() -> Response {
    Response::from_error(Error::NoResponse)
}

static DEFAULT_ADAPTER: OnceLock<Arc<dyn Adapter>> = OnceLock::new();

/// Installs the process-wide default adapter.
///
/// Succeeds once; later calls hand the rejected adapter back.
pub fn install_default_adapter(adapter: Arc<dyn Adapter>) -> Result<(), Arc<dyn Adapter>> {
    DEFAULT_ADAPTER.set(adapter)
}

/// The adapter installed by [`install_default_adapter`], if any.
pub fn default_adapter() -> Option<Arc<dyn Adapter>> {
    DEFAULT_ADAPTER.get().cloned()
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::http::Method;

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    #[test]
    fn key_without_accept() {
        let req = Request::get(url("http://example.com/a?b=1"));
        assert_eq!(request_key(&req), ":http://example.com/a?b=1");
    }

    #[test]
    fn key_ignores_method_body_and_other_headers() {
        let a = Request::get(url("http://example.com/x")).header("Accept", "text/html");
        let b = Request::new(Method::Delete, url("http://example.com/x"))
            .header("Accept", "text/html")
            .header("If-None-Match", "\"abc\"")
            .body("payload");
        assert_eq!(request_key(&a), request_key(&b));
        assert_eq!(request_digest(&a), request_digest(&b));
    }

    #[test]
    fn key_scoped_by_accept_and_url() {
        let base = Request::get(url("http://example.com/x")).header("Accept", "a/b");
        let other_accept = Request::get(url("http://example.com/x")).header("Accept", "a/c");
        let other_url = Request::get(url("http://example.com/y")).header("Accept", "a/b");
        assert_ne!(request_key(&base), request_key(&other_accept));
        assert_ne!(request_key(&base), request_key(&other_url));
        assert_ne!(request_digest(&base), request_digest(&other_url));
    }

    #[test]
    fn digest_is_hex_sha256() {
        let req = Request::get(url("http://example.com/"));
        let digest = request_digest(&req);
        assert_eq!(digest.len(), 64);
        assert!(digest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn empty_response_is_a_miss() {
        let res = empty_response();
        assert!(res.is_error());
        assert!(res.error().is_some_and(Error::is_no_response));
    }

    #[test]
    fn default_adapter_installs_once() {
        let first: Arc<dyn Adapter> = Arc::new(MemoryAdapter::new());
        install_default_adapter(Arc::clone(&first)).ok();
        let installed = default_adapter().expect("installed");

        let second: Arc<dyn Adapter> = Arc::new(MemoryAdapter::new());
        assert!(install_default_adapter(second).is_err());
        assert!(Arc::ptr_eq(&installed, &default_adapter().unwrap()));
    }
}
