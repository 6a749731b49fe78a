//! Hypermedia relations carried in `Link` response headers (RFC 8288).
//!
//! ```text
//! Link: <https://api.example.com/repos?page=2>; rel="next", <...?page=9>; rel="last"
//! ```
//!
//! [`MediaHeader::decode`] turns every `Link` field of a header set into a
//! [`Relations`] map from relation name to [`Hyperlink`], which lets callers
//! follow links instead of hardcoding URLs.

use std::collections::BTreeMap;
use std::fmt;

use url::Url;

use crate::http::Headers;

/// A link target as written by the server; may be relative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hyperlink(String);

impl Hyperlink {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves the link against `base`, the URL of the response it came from.
    pub fn resolve(&self, base: &Url) -> Result<Url, url::ParseError> {
        base.join(&self.0)
    }
}

impl fmt::Display for Hyperlink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Hyperlink {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}

/// Relation name → link target. Names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations {
    inner: BTreeMap<String, Hyperlink>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a relation; a later link for the same name replaces the earlier one.
    pub fn insert(&mut self, rel: &str, link: impl Into<Hyperlink>) {
        self.inner.insert(rel.to_ascii_lowercase(), link.into());
    }

    pub fn get(&self, rel: &str) -> Option<&Hyperlink> {
        self.inner.get(&rel.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates relations in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Hyperlink)> {
        self.inner.iter().map(|(rel, link)| (rel.as_str(), link))
    }
}

/// Hypermedia decoded from a response's headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaHeader {
    pub relations: Relations,
}

impl MediaHeader {
    /// Extracts relations from every `Link` header in `headers`.
    pub fn decode(headers: &Headers) -> Self {
        let mut relations = Relations::new();
        for value in headers.get_all("link") {
            parse_link_value(value, &mut relations);
        }
        Self { relations }
    }
}

// Malformed link-values are skipped rather than failing the whole header.
fn parse_link_value(value: &str, relations: &mut Relations) {
    let mut rest = value;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            break;
        };
        let target = after[..end].trim();
        let params = &after[end + 1..];
        let (own, next) = params.split_at(link_boundary(params));

        for param in own.split(';') {
            let Some((name, rels)) = param.split_once('=') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("rel") {
                for rel in rels.trim().trim_matches('"').split_whitespace() {
                    relations.insert(rel, target);
                }
            }
        }

        rest = next;
    }
}

// Index of the comma ending the current link-value, ignoring quoted commas.
fn link_boundary(params: &str) -> usize {
    let mut quoted = false;
    for (i, c) in params.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => return i,
            _ => {}
        }
    }
    params.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(values: &[&str]) -> Relations {
        let headers: Headers = values.iter().map(|v| ("Link", *v)).collect();
        MediaHeader::decode(&headers).relations
    }

    #[test]
    fn pagination_links() {
        let rels = decode(&[
            "<https://api.example.com/r?page=2>; rel=\"next\", <https://api.example.com/r?page=5>; rel=\"last\"",
        ]);
        assert_eq!(rels.len(), 2);
        assert_eq!(
            rels.get("next").map(Hyperlink::as_str),
            Some("https://api.example.com/r?page=2")
        );
        assert_eq!(
            rels.get("LAST").map(Hyperlink::as_str),
            Some("https://api.example.com/r?page=5")
        );
    }

    #[test]
    fn multiple_rels_quoted_commas_and_fields() {
        let rels = decode(&[
            "</a>; title=\"x, y\"; rel=\"self canonical\"",
            "</b>; rel=up",
        ]);
        let names: Vec<_> = rels.iter().map(|(rel, _)| rel).collect();
        assert_eq!(names, vec!["canonical", "self", "up"]);
        assert_eq!(rels.get("up").unwrap().as_str(), "/b");
    }

    #[test]
    fn malformed_values_are_skipped() {
        assert!(decode(&["no brackets; rel=next", "<unterminated; rel=next"]).is_empty());
        assert!(MediaHeader::decode(&Headers::new()).relations.is_empty());
    }

    #[test]
    fn resolve_relative_link() {
        let base: Url = "https://api.example.com/users/1".parse().unwrap();
        let link = Hyperlink::from("repos?page=2");
        assert_eq!(
            link.resolve(&base).unwrap().as_str(),
            "https://api.example.com/users/repos?page=2"
        );
    }
}
