//! Media types and the body codecs they select.
//!
//! A [`MediaType`] is parsed from a `Content-Type` value and picks the
//! [`Decoder`] used to read a response body, or the encoder used to turn a
//! resource back into body bytes. JSON (`application/json` and any `+json`
//! structured-syntax suffix) is the supported format.
//!
//! Resources cross the dyn-compatible [`Adapter`](crate::cache::Adapter)
//! boundary as [`Decodable`] targets and [`Encodable`] sources, both of which
//! are implemented for every serde type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::Error;
use crate::http::head::is_token;

/// Errors produced while parsing a media type or selecting its codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaTypeError {
    #[error("empty media type")]
    Empty,

    #[error("invalid media type {0:?}")]
    Invalid(String),

    #[error("invalid media type parameter {0:?}")]
    InvalidParameter(String),

    #[error("no codec for media type {0}")]
    Unsupported(String),
}

/// Body serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Format {
    Json,
}

/// A parsed `type/subtype[+suffix]; key=value` media type.
///
/// Type, subtype, suffix and parameter names are case-insensitive and stored
/// lowercased.
///
/// # Examples
///
/// ```
/// use tether::mediatype::{Format, MediaType};
///
/// let mt = MediaType::parse("application/vnd.github.v3+json; charset=utf-8").unwrap();
/// assert_eq!(mt.subtype(), "vnd.github.v3");
/// assert_eq!(mt.suffix(), Some("json"));
/// assert_eq!(mt.param("charset"), Some("utf-8"));
/// assert_eq!(mt.format(), Some(Format::Json));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    kind: String,
    subtype: String,
    suffix: Option<String>,
    params: BTreeMap<String, String>,
}

impl MediaType {
    /// Parses a `Content-Type` style value.
    pub fn parse(value: &str) -> Result<Self, MediaTypeError> {
        let mut parts = value.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        if essence.is_empty() {
            return Err(MediaTypeError::Empty);
        }

        let (kind, full_subtype) = essence
            .split_once('/')
            .filter(|(kind, subtype)| is_token(kind) && is_token(subtype))
            .ok_or_else(|| MediaTypeError::Invalid(value.to_owned()))?;

        let full_subtype = full_subtype.to_ascii_lowercase();
        let (subtype, suffix) = match full_subtype.rsplit_once('+') {
            Some((subtype, suffix)) if !subtype.is_empty() && !suffix.is_empty() => {
                (subtype.to_owned(), Some(suffix.to_owned()))
            }
            _ => (full_subtype.clone(), None),
        };

        let mut params = BTreeMap::new();
        for param in parts.map(str::trim).filter(|p| !p.is_empty()) {
            let (name, val) = param
                .split_once('=')
                .filter(|(name, _)| is_token(name.trim()))
                .ok_or_else(|| MediaTypeError::InvalidParameter(param.to_owned()))?;
            params.insert(
                name.trim().to_ascii_lowercase(),
                val.trim().trim_matches('"').to_owned(),
            );
        }

        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            subtype,
            suffix,
            params,
        })
    }

    /// Top-level type, e.g. `application`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Subtype without any structured-syntax suffix.
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Structured-syntax suffix, e.g. `json` for `vnd.api+json`.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// `type/subtype[+suffix]` without parameters.
    pub fn essence(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}/{}+{}", self.kind, self.subtype, suffix),
            None => format!("{}/{}", self.kind, self.subtype),
        }
    }

    /// The body format this media type selects, if any.
    pub fn format(&self) -> Option<Format> {
        if self.subtype == "json" || self.suffix.as_deref() == Some("json") {
            Some(Format::Json)
        } else {
            None
        }
    }

    /// Returns a decoder reading `body` in this media type's format.
    pub fn decoder<'a>(&self, body: &'a [u8]) -> Result<Decoder<'a>, MediaTypeError> {
        let format = self
            .format()
            .ok_or_else(|| MediaTypeError::Unsupported(self.essence()))?;
        Ok(Decoder { format, body })
    }

    /// Encodes `value` as body bytes in this media type's format.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, Error> {
        match self.format() {
            Some(Format::Json) => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|e| Error::Encode(Arc::new(e))),
            None => Err(MediaTypeError::Unsupported(self.essence()).into()),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence())?;
        for (name, value) in &self.params {
            write!(f, "; {name}={value}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Reads one body in a fixed format.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    format: Format,
    body: &'a [u8],
}

impl Decoder<'_> {
    pub fn format(&self) -> Format {
        self.format
    }

    /// Deserializes the body into a new `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match self.format {
            Format::Json => {
                serde_json::from_slice(self.body).map_err(|e| Error::Decode(Arc::new(e)))
            }
        }
    }
}

/// A value a response body can be decoded into.
///
/// Implemented for every `DeserializeOwned` type; a successful decode replaces
/// the value in place.
pub trait Decodable {
    fn decode_from(&mut self, decoder: &Decoder<'_>) -> Result<(), Error>;
}

impl<T: DeserializeOwned> Decodable for T {
    fn decode_from(&mut self, decoder: &Decoder<'_>) -> Result<(), Error> {
        *self = decoder.decode()?;
        Ok(())
    }
}

/// A resource that can be re-encoded into a body for a given media type.
pub trait Encodable {
    fn encode_as(&self, media_type: &MediaType) -> Result<Bytes, Error>;
}

impl<T: Serialize + ?Sized> Encodable for T {
    fn encode_as(&self, media_type: &MediaType) -> Result<Bytes, Error> {
        media_type.encode(self)
    }
}
