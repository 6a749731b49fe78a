//! Byte-level record format for cached responses.
//!
//! A record is an ordinary HTTP/1.1 response message:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: application/json\r\n     <- stored headers, in order, minus Accept
//! Content-Length: 2\r\n                  <- framing, always the last header
//! \r\n
//! {}
//! ```
//!
//! The trailing `Content-Length` belongs to the record, not the response: it is
//! stripped on decode so the stored headers come back verbatim, including any
//! `Content-Length` the server sent.

use std::io::{self, Read, Write};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tracing::debug;

use super::KEY_HEADER;
use crate::http::head::{MAX_HEADERS, ResponseHead, is_field_value, is_token, write_head};
use crate::http::{HeadError, Headers, RawResponse, Response, StatusCode};

const FRAMING_HEADER: &str = "Content-Length";

/// Errors writing or reading a cache record.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("cannot store an error response")]
    ErrorResponse,

    #[error("response body was already consumed")]
    BodyConsumed,

    #[error("status {0} does not fit in a status line")]
    StatusOutOfRange(u16),

    #[error("header {name:?} cannot be stored verbatim")]
    InvalidHeader { name: String },

    #[error("too many header fields: {count} (max: {max})")]
    TooManyHeaders { count: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    #[error("malformed record head: {0}")]
    Head(#[from] HeadError),

    #[error("record has no Content-Length framing header")]
    MissingLength,

    #[error("invalid record length {0:?}")]
    InvalidLength(String),

    #[error("record body length mismatch: declared {declared} bytes, found {found}")]
    LengthMismatch { declared: usize, found: usize },
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Writes `response` as a record into `sink`.
///
/// The body is shared, not consumed: the caller can still decode `response`
/// afterwards. Fails for error responses, consumed bodies, and header fields
/// that would not parse back verbatim.
pub fn encode<W: Write + ?Sized>(response: &Response, sink: &mut W) -> Result<(), CodecError> {
    let record = encode_record(response)?;
    sink.write_all(&record)?;
    Ok(())
}

/// Reads a record from `source` and reconstructs the response.
///
/// Malformed or truncated input yields an error response carrying
/// [`Error::Codec`](crate::Error::Codec).
pub fn decode<R: Read + ?Sized>(source: &mut R) -> Response {
    let mut record = Vec::new();
    match source.read_to_end(&mut record) {
        Ok(_) => decode_record(&Bytes::from(record)),
        Err(err) => Response::from_error(CodecError::from(err).into()),
    }
}

pub(crate) fn encode_record(response: &Response) -> Result<Bytes, CodecError> {
    if response.is_error() {
        return Err(CodecError::ErrorResponse);
    }
    let body = response.body_snapshot().ok_or(CodecError::BodyConsumed)?;
    encode_parts(response.status(), response.headers(), &body)
}

pub(crate) fn encode_parts(
    status: StatusCode,
    headers: &Headers,
    body: &[u8],
) -> Result<Bytes, CodecError> {
    if status.as_u16() > 999 {
        return Err(CodecError::StatusOutOfRange(status.as_u16()));
    }

    let stored: Vec<_> = headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(KEY_HEADER))
        .collect();
    if let Some((name, _)) = stored
        .iter()
        .find(|(name, value)| !is_token(name) || !is_field_value(value))
    {
        return Err(CodecError::InvalidHeader {
            name: (*name).to_owned(),
        });
    }

    let max = MAX_HEADERS - 1;
    if stored.len() > max {
        return Err(CodecError::TooManyHeaders {
            count: stored.len(),
            max,
        });
    }

    let mut buf = BytesMut::with_capacity(128 + stored.len() * 64 + body.len());
    write_head(status, stored.into_iter(), &mut buf);
    buf.put(format!("{FRAMING_HEADER}: {}\r\n\r\n", body.len()).as_bytes());
    buf.put(body);
    Ok(buf.freeze())
}

pub(crate) fn decode_record(record: &Bytes) -> Response {
    match parse_record(record) {
        Ok(raw) => Response::from_raw(raw),
        Err(err) => {
            debug!(error = %err, "unreadable cache record");
            Response::from_error(err.into())
        }
    }
}

fn parse_record(record: &Bytes) -> Result<RawResponse, CodecError> {
    let (head, body_offset) = ResponseHead::parse(record)?;
    let ResponseHead {
        status,
        mut headers,
    } = head;

    let declared = match headers.pop() {
        Some((name, value)) if name.eq_ignore_ascii_case(FRAMING_HEADER) => {
            match value.trim().parse::<usize>() {
                Ok(declared) => declared,
                Err(_) => return Err(CodecError::InvalidLength(value)),
            }
        }
        _ => return Err(CodecError::MissingLength),
    };

    let found = record.len() - body_offset;
    if found != declared {
        return Err(CodecError::LengthMismatch { declared, found });
    }

    Ok(RawResponse {
        status,
        headers,
        body: record.slice(body_offset..),
    })
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::error::Error;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Resource {
        a: i64,
    }

    fn live(status: u16, headers: &[(&str, &str)], body: &'static str) -> Response {
        let mut raw = RawResponse::new(StatusCode::from_u16(status)).body(body);
        for (name, value) in headers {
            raw = raw.header(*name, *value);
        }
        Response::from_raw(raw)
    }

    fn round_trip(response: &Response) -> Response {
        let mut buf = Vec::new();
        encode(response, &mut buf).unwrap();
        decode(&mut buf.as_slice())
    }

    #[test]
    fn record_is_an_http_message() {
        let res = live(200, &[("Content-Type", "application/json")], "{}");
        let record = encode_record(&res).unwrap();
        assert_eq!(
            &record[..],
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}"
        );
    }

    #[test]
    fn round_trip_restores_status_headers_and_body() {
        let headers = [
            ("Content-Type", "application/json"),
            ("Accept", "application/json"),
            ("Link", "</next>; rel=\"next\""),
            ("Content-Length", "8"),
            ("X-Rate", "1"),
            ("X-Rate", "2"),
        ];
        let mut original = live(203, &headers, r#"{"a": 5}"#);
        let mut cached = round_trip(&original);

        assert!(!cached.is_error());
        assert_eq!(cached.status().as_u16(), 203);
        assert_eq!(cached.headers().get("accept"), None);
        let expected: Headers = headers
            .iter()
            .copied()
            .filter(|(name, _)| *name != "Accept")
            .collect();
        assert_eq!(cached.headers(), &expected);
        assert_eq!(cached.media_type(), original.media_type());
        assert_eq!(cached.relations(), original.relations());

        let (mut from_live, mut from_cache) = (Resource::default(), Resource::default());
        original.decode(Some(&mut from_live)).unwrap();
        cached.decode(Some(&mut from_cache)).unwrap();
        assert_eq!(from_cache, Resource { a: 5 });
        assert_eq!(from_cache, from_live);
    }

    #[test]
    fn encoding_does_not_consume_the_body() {
        let mut res = live(200, &[("Content-Type", "application/json")], r#"{"a": 1}"#);
        encode(&res, &mut Vec::new()).unwrap();
        assert!(!res.is_body_consumed());

        let mut value = Resource::default();
        res.decode(Some(&mut value)).unwrap();
        assert!(matches!(
            encode(&res, &mut Vec::new()),
            Err(CodecError::BodyConsumed)
        ));
    }

    #[test]
    fn error_responses_are_not_encoded() {
        let res = Response::from_error(Error::NoResponse);
        assert!(matches!(
            encode(&res, &mut Vec::new()),
            Err(CodecError::ErrorResponse)
        ));
    }

    #[test]
    fn status_without_reason_or_media_type() {
        let cached = round_trip(&live(1, &[], ""));
        assert!(!cached.is_error());
        assert_eq!(cached.status().as_u16(), 1);
        assert!(cached.media_type().is_none());
        assert!(cached.headers().is_empty());
    }

    #[test]
    fn oversized_status_is_rejected() {
        let res = live(1000, &[], "");
        assert!(matches!(
            encode(&res, &mut Vec::new()),
            Err(CodecError::StatusOutOfRange(1000))
        ));
    }

    #[test]
    fn truncated_and_malformed_records_are_codec_errors() {
        let res = live(200, &[("Content-Type", "application/json")], r#"{"a": 1}"#);
        let record = encode_record(&res).unwrap();

        let truncated = decode(&mut &record[..record.len() - 3]);
        assert!(matches!(
            truncated.error(),
            Some(Error::Codec(CodecError::LengthMismatch {
                declared: 8,
                found: 5
            }))
        ));

        let mut padded = record.to_vec();
        padded.extend_from_slice(b"junk");
        assert!(matches!(
            decode(&mut padded.as_slice()).error(),
            Some(Error::Codec(CodecError::LengthMismatch { .. }))
        ));

        let head_only = decode(&mut &record[..20]);
        assert!(matches!(
            head_only.error(),
            Some(Error::Codec(CodecError::Head(HeadError::Incomplete)))
        ));

        let garbage = decode(&mut &b"\x00\x01garbage"[..]);
        assert!(matches!(
            garbage.error(),
            Some(Error::Codec(CodecError::Head(HeadError::Parse(_))))
        ));

        let empty = decode(&mut &b""[..]);
        assert!(matches!(empty.error(), Some(Error::Codec(_))));
        assert!(!empty.error().unwrap().is_no_response());
    }

    #[test]
    fn header_values_cannot_smuggle_fields() {
        let res = live(
            200,
            &[("Content-Type", "application/json"), ("X-Note", "hi\r\nAccept: leaked")],
            "{}",
        );
        assert!(matches!(
            encode(&res, &mut Vec::new()),
            Err(CodecError::InvalidHeader { name }) if name == "X-Note"
        ));

        let nul = live(200, &[("X-Nul", "a\0b")], "");
        assert!(matches!(
            encode(&nul, &mut Vec::new()),
            Err(CodecError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn header_names_must_be_tokens() {
        let res = live(200, &[("Bad Name", "v")], "");
        assert!(matches!(
            encode(&res, &mut Vec::new()),
            Err(CodecError::InvalidHeader { name }) if name == "Bad Name"
        ));
    }

    #[test]
    fn padded_values_round_trip_as_seen_live() {
        let res = live(200, &[("X-Pad", "  v  "), ("X-Tab", "\tw x\t")], "");
        assert_eq!(res.headers().get("x-pad"), Some("v"));

        let cached = round_trip(&res);
        assert!(!cached.is_error());
        assert_eq!(cached.headers(), res.headers());
        assert_eq!(cached.headers().get("x-tab"), Some("w x"));
    }

    #[test]
    fn missing_or_bad_framing_header() {
        let unframed = decode(&mut &b"HTTP/1.1 200 OK\r\nX-A: b\r\n\r\n"[..]);
        assert!(matches!(
            unframed.error(),
            Some(Error::Codec(CodecError::MissingLength))
        ));

        let bad = decode(&mut &b"HTTP/1.1 200 OK\r\nContent-Length: two\r\n\r\n"[..]);
        assert!(matches!(
            bad.error(),
            Some(Error::Codec(CodecError::InvalidLength(_)))
        ));
    }
}
