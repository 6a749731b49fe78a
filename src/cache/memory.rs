//! In-memory [`Adapter`], the default backend.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::trace;

use super::codec::{self, CodecError};
use super::{Adapter, empty_response, request_digest};
use crate::error::Error;
use crate::http::{Request, Response};
use crate::hypermedia::Relations;
use crate::mediatype::{Decodable, Encodable};

/// Map-backed response cache, safe to share between threads.
///
/// Entries are complete codec records keyed by [`request_digest`]. A record is
/// fully encoded before the write lock is taken, so readers observe either the
/// previous record or the new one. There is no expiry or eviction.
///
/// # Examples
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tether::cache::{Adapter, MemoryAdapter};
/// use tether::http::{RawResponse, Request, Response, StatusCode};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Repo {
///     stars: u32,
/// }
///
/// let cache = MemoryAdapter::new();
/// let request = Request::get("https://api.example.com/repo".parse().unwrap())
///     .header("Accept", "application/json");
///
/// let live = Response::from_raw(
///     RawResponse::new(StatusCode::OK)
///         .header("Content-Type", "application/json")
///         .body(r#"{"stars":42}"#),
/// );
/// cache.set(&request, &live, None).unwrap();
///
/// let mut repo = Repo::default();
/// let hit = cache.get(&request, Some(&mut repo));
/// assert!(!hit.is_error());
/// assert_eq!(repo.stars, 42);
/// ```
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    records: RwLock<HashMap<String, Bytes>>,
    relations: RwLock<HashMap<String, Relations>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored responses.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drops every stored response and relation.
    pub fn clear(&self) {
        self.records.write().clear();
        self.relations.write().clear();
    }
}

/// Encodes the record to store for `response`.
///
/// A consumed body is rebuilt from `original` using the response's media type.
fn snapshot(response: &Response, original: Option<&dyn Encodable>) -> Result<Bytes, Error> {
    match codec::encode_record(response) {
        Ok(record) => Ok(record),
        Err(CodecError::BodyConsumed) => {
            let (Some(original), Some(media_type)) = (original, response.media_type()) else {
                return Err(CodecError::BodyConsumed.into());
            };
            let body = original.encode_as(media_type)?;
            Ok(codec::encode_parts(
                response.status(),
                response.headers(),
                &body,
            )?)
        }
        Err(err) => Err(err.into()),
    }
}

impl Adapter for MemoryAdapter {
    fn get(&self, request: &Request, target: Option<&mut dyn Decodable>) -> Response {
        let key = request_digest(request);
        let record = self.records.read().get(&key).cloned();

        let Some(record) = record else {
            trace!(url = %request.url(), "cache miss");
            return empty_response();
        };

        trace!(url = %request.url(), bytes = record.len(), "cache hit");
        let mut response = codec::decode_record(&record);
        if let Some(target) = target {
            // Decode records its own failures, except a missing media type.
            if let Err(Error::NoMediaType) = response.decode(Some(target)) {
                response.fail(Error::NoMediaType);
            }
        }
        response
    }

    fn set(
        &self,
        request: &Request,
        response: &Response,
        original: Option<&dyn Encodable>,
    ) -> Result<(), Error> {
        let record = snapshot(response, original)?;
        let key = request_digest(request);
        trace!(url = %request.url(), bytes = record.len(), "cache store");

        self.records.write().insert(key, record);

        let relations = response.relations();
        if !relations.is_empty() {
            self.relations
                .write()
                .insert(request.url().to_string(), relations.clone());
        }
        Ok(())
    }

    fn rels(&self, request: &Request) -> Relations {
        self.relations
            .read()
            .get(request.url().as_str())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use url::Url;

    use super::*;
    use crate::http::{RawResponse, StatusCode};
    use crate::mediatype::MediaType;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct TestResource {
        a: i64,
    }

    fn request(path: &str) -> Request {
        let url: Url = format!("http://example.com/{path}").parse().unwrap();
        Request::get(url).header("Accept", "application/json")
    }

    fn json_response(status: u16, value: &TestResource) -> Response {
        let mt = MediaType::parse("application/json").unwrap();
        Response::from_raw(
            RawResponse::new(StatusCode::from_u16(status))
                .header("Content-Type", "application/json")
                .body(mt.encode(value).unwrap()),
        )
    }

    #[test]
    fn get_missing_cache() {
        let cache = MemoryAdapter::new();
        let mut target = TestResource::default();
        let res = cache.get(&request("abc"), Some(&mut target));
        assert!(res.is_error());
        assert!(matches!(res.error(), Some(Error::NoResponse)));
        assert_eq!(target, TestResource::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn get_cache_without_value() {
        let cache = MemoryAdapter::new();
        let orig = Response::from_raw(RawResponse::new(StatusCode::from_u16(1)));
        cache.set(&request("abc"), &orig, None).unwrap();

        let res = cache.get(&request("abc"), None);
        assert!(!res.is_error());
        assert_eq!(res.status().as_u16(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_and_get_cache() {
        let cache = MemoryAdapter::new();
        let value = TestResource { a: 2 };
        let orig = json_response(200, &value);
        cache.set(&request("abc"), &orig, Some(&value)).unwrap();

        let mut test = TestResource::default();
        let res = cache.get(&request("abc"), Some(&mut test));
        assert!(!res.is_error());
        assert!(res.is_body_consumed());
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test.a, 2);
    }

    #[test]
    fn consumed_body_is_rebuilt_from_original() {
        let cache = MemoryAdapter::new();
        let value = TestResource { a: 11 };
        let mut orig = json_response(200, &value);
        let mut decoded = TestResource::default();
        orig.decode(Some(&mut decoded)).unwrap();

        assert!(matches!(
            cache.set(&request("x"), &orig, None),
            Err(Error::Codec(CodecError::BodyConsumed))
        ));

        cache.set(&request("x"), &orig, Some(&decoded)).unwrap();
        let mut test = TestResource::default();
        let res = cache.get(&request("x"), Some(&mut test));
        assert!(!res.is_error());
        assert_eq!(test, value);
    }

    #[test]
    fn decode_failure_is_recorded_on_hit() {
        let cache = MemoryAdapter::new();
        let orig = Response::from_raw(
            RawResponse::new(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body("not json"),
        );
        cache.set(&request("bad"), &orig, None).unwrap();

        let mut test = TestResource::default();
        let res = cache.get(&request("bad"), Some(&mut test));
        assert!(matches!(res.error(), Some(Error::Decode(_))));
    }

    #[test]
    fn hit_without_media_type_fails_decode() {
        let cache = MemoryAdapter::new();
        let orig = Response::from_raw(RawResponse::new(StatusCode::OK).body(r#"{"a":5}"#));
        cache.set(&request("untyped"), &orig, None).unwrap();

        let mut test = TestResource::default();
        let res = cache.get(&request("untyped"), Some(&mut test));
        assert!(res.is_error());
        assert!(matches!(res.error(), Some(Error::NoMediaType)));
        assert_eq!(test, TestResource::default());

        assert!(!cache.get(&request("untyped"), None).is_error());
    }

    #[test]
    fn unstorable_headers_are_rejected_at_set() {
        let cache = MemoryAdapter::new();
        let orig = Response::from_raw(RawResponse::new(StatusCode::OK).header("Bad Name", "v"));
        assert!(matches!(
            cache.set(&request("h"), &orig, None),
            Err(Error::Codec(CodecError::InvalidHeader { .. }))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn error_responses_are_rejected() {
        let cache = MemoryAdapter::new();
        let failed = empty_response();
        assert!(matches!(
            cache.set(&request("e"), &failed, None),
            Err(Error::Codec(CodecError::ErrorResponse))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn set_overwrites() {
        let cache = MemoryAdapter::new();
        cache
            .set(&request("k"), &json_response(200, &TestResource { a: 1 }), None)
            .unwrap();
        cache
            .set(&request("k"), &json_response(200, &TestResource { a: 2 }), None)
            .unwrap();

        let mut test = TestResource::default();
        cache.get(&request("k"), Some(&mut test));
        assert_eq!(test.a, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn accept_scopes_entries() {
        let cache = MemoryAdapter::new();
        cache
            .set(&request("k"), &json_response(200, &TestResource { a: 1 }), None)
            .unwrap();

        let other = request("k").header("Accept", "application/vnd.v2+json");
        assert!(cache.get(&other, None).is_error());
        assert!(!cache.get(&request("k"), None).is_error());
    }

    #[test]
    fn relations_persist_until_superseded() {
        let cache = MemoryAdapter::new();
        let linked = Response::from_raw(
            RawResponse::new(StatusCode::OK).header("Link", "</p2>; rel=\"next\""),
        );
        cache.set(&request("list"), &linked, None).unwrap();

        let bare = Response::from_raw(RawResponse::new(StatusCode::OK));
        cache.set(&request("list"), &bare, None).unwrap();

        // Relations are per resource, not per representation.
        let other_accept = request("list").header("Accept", "text/html");
        let rels = cache.rels(&other_accept);
        assert_eq!(rels.get("next").map(|l| l.as_str()), Some("/p2"));
        assert!(cache.rels(&request("missing")).is_empty());

        cache.clear();
        assert!(cache.rels(&request("list")).is_empty());
        assert!(cache.is_empty());
    }
}
