//! HTTP/1.1 response heads: written in wire format, parsed with [`httparse`].
//!
//! Both the TCP transport and the cache codec speak this format, so a cached
//! record is an ordinary HTTP/1.1 response message.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::{Headers, StatusCode};

/// Maximum number of header fields accepted in a single response head.
pub(crate) const MAX_HEADERS: usize = 64;

/// Errors that can occur while parsing a response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeadError {
    #[error("response head is incomplete")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),
}

/// Status line and header fields of a parsed response.
#[derive(Debug, Clone)]
pub(crate) struct ResponseHead {
    pub status: StatusCode,
    pub headers: Headers,
}

impl ResponseHead {
    /// Parses a response head from the start of `buf`.
    ///
    /// Returns the head and the offset at which the body begins. Header values
    /// that are not valid UTF-8 are skipped.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), HeadError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(HeadError::Incomplete),
        };

        let status = StatusCode::from_u16(raw.code.unwrap_or(0));

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        Ok((
            Self {
                status,
                headers: header_map,
            },
            body_offset,
        ))
    }
}

/// RFC 9110 §5.6.2 token: header names, media type parts.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// A field value that survives a write/parse cycle unchanged: no control
/// bytes other than HTAB, and no surrounding whitespace.
pub(crate) fn is_field_value(s: &str) -> bool {
    s.bytes().all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f)) && s == trim_field_value(s)
}

/// Strips the optional whitespace HTTP allows around a field value.
pub(crate) fn trim_field_value(s: &str) -> &str {
    s.trim_matches([' ', '\t'])
}

/// Writes an HTTP/1.1 status line and header block, without the terminating
/// blank line, into `buf`.
///
/// The caller guarantees `status` fits in three digits.
pub(crate) fn write_head<'a>(
    status: StatusCode,
    headers: impl Iterator<Item = (&'a str, &'a str)>,
    buf: &mut BytesMut,
) {
    match status.canonical_reason() {
        Some(reason) => buf.put(format!("HTTP/1.1 {:03} {reason}\r\n", status.as_u16()).as_bytes()),
        None => buf.put(format!("HTTP/1.1 {:03}\r\n", status.as_u16()).as_bytes()),
    }

    for (name, value) in headers {
        buf.put(format!("{name}: {value}\r\n").as_bytes());
    }
}
