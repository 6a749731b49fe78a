//! HTTP/1.1 over a plain Tokio TCP connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Host;

use super::{BoxFuture, Transport, TransportError};
use crate::config::TransportConfig;
use crate::http::head::ResponseHead;
use crate::http::{HeadError, Method, RawResponse, Request, StatusCode};

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// One-connection-per-request HTTP/1.1 transport for `http://` URLs.
///
/// Requests are sent with `Connection: close`. Response bodies are framed by
/// `Content-Length`, `Transfer-Encoding: chunked`, or the end of the stream.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tether::{Client, transport::TcpTransport};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::parse("http://127.0.0.1:8080/api", Arc::new(TcpTransport::new()))?;
/// let request = client.new_request("users/1")?;
/// let response = client.send(&request).await;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn round_trip(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let url = request.url();
        if url.scheme() != "http" {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_owned()));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_owned(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(TransportError::MissingHost),
        };
        let port = url.port_or_known_default().unwrap_or(80);

        let mut stream = TcpStream::connect((host.as_str(), port)).await?;
        stream.write_all(&encode_request(request)).await?;
        stream.flush().await?;
        debug!(method = %request.method(), url = %url, "request sent");

        self.read_response(&mut stream, request.method()).await
    }

    // Mirrors an HTTP/1.1 server read loop: buffer, re-parse, stop once framed.
    async fn read_response(
        &self,
        stream: &mut TcpStream,
        method: &Method,
    ) -> Result<RawResponse, TransportError> {
        let max_bytes = self.config.max_response_size;
        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

        loop {
            let eof = stream.read_buf(&mut buf).await? == 0;

            if buf.len() > max_bytes {
                return Err(TransportError::TooLarge { max_bytes });
            }

            let (head, body_offset) = match ResponseHead::parse(&buf) {
                Ok(pair) => pair,
                Err(HeadError::Incomplete) if !eof => continue,
                Err(HeadError::Incomplete) => return Err(TransportError::UnexpectedEof),
                Err(e) => return Err(e.into()),
            };

            if let Some(body) = frame_body(&head, method, &buf[body_offset..], eof)? {
                debug!(status = %head.status, bytes = body.len(), "response received");
                return Ok(RawResponse {
                    status: head.status,
                    headers: head.headers,
                    body,
                });
            }

            if eof {
                return Err(TransportError::UnexpectedEof);
            }
        }
    }
}

impl Transport for TcpTransport {
    fn send<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            let timeout = self.config.timeout();
            match tokio::time::timeout(timeout, self.round_trip(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout)),
            }
        })
    }
}

/// Serializes the request line, headers, and body.
fn encode_request(request: &Request) -> BytesMut {
    let url = request.url();
    let body = request.body_bytes();

    let mut target = url.path().to_owned();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let host = url.host_str().unwrap_or_default();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };

    let mut buf = BytesMut::with_capacity(128 + request.headers().len() * 64 + body.len());
    buf.put(format!("{} {target} HTTP/1.1\r\n", request.method()).as_bytes());
    buf.put(format!("Host: {authority}\r\n").as_bytes());

    for (name, value) in request.headers().iter() {
        if ["host", "connection", "content-length"]
            .iter()
            .any(|skip| name.eq_ignore_ascii_case(skip))
        {
            continue;
        }
        buf.put(format!("{name}: {value}\r\n").as_bytes());
    }

    if !body.is_empty() || matches!(request.method(), Method::Post | Method::Put | Method::Patch)
    {
        buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    buf.put(&b"Connection: close\r\n\r\n"[..]);
    buf.put(body.as_ref());
    buf
}

/// Extracts the body once enough bytes have arrived; `Ok(None)` means read more.
fn frame_body(
    head: &ResponseHead,
    method: &Method,
    body: &[u8],
    eof: bool,
) -> Result<Option<Bytes>, TransportError> {
    let status = head.status.as_u16();
    if *method == Method::Head
        || (100..200).contains(&status)
        || head.status == StatusCode::NO_CONTENT
        || head.status == StatusCode::NOT_MODIFIED
    {
        return Ok(Some(Bytes::new()));
    }

    let chunked = head
        .headers
        .get_all("transfer-encoding")
        .any(|v| v.to_ascii_lowercase().contains("chunked"));
    if chunked {
        return match decode_chunked(body)? {
            Some(decoded) => Ok(Some(decoded)),
            None if eof => Err(TransportError::UnexpectedEof),
            None => Ok(None),
        };
    }

    if let Some(value) = head.headers.get("content-length") {
        let expected: usize = value
            .trim()
            .parse()
            .map_err(|_| TransportError::InvalidContentLength(value.to_owned()))?;
        return if body.len() >= expected {
            Ok(Some(Bytes::copy_from_slice(&body[..expected])))
        } else if eof {
            Err(TransportError::Truncated {
                expected,
                received: body.len(),
            })
        } else {
            Ok(None)
        };
    }

    Ok(eof.then(|| Bytes::copy_from_slice(body)))
}

/// Decodes a complete chunked body; `Ok(None)` when more input is needed.
/// Trailer fields after the last chunk are ignored.
fn decode_chunked(mut buf: &[u8]) -> Result<Option<Bytes>, TransportError> {
    let mut out = BytesMut::new();
    loop {
        let (offset, size) = match httparse::parse_chunk_size(buf) {
            Ok(httparse::Status::Complete(pair)) => pair,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(_) => return Err(TransportError::InvalidChunk),
        };
        buf.advance(offset);

        if size == 0 {
            return Ok(Some(out.freeze()));
        }

        let size = usize::try_from(size).map_err(|_| TransportError::InvalidChunk)?;
        let framed = size.checked_add(2).ok_or(TransportError::InvalidChunk)?;
        if buf.len() < framed {
            return Ok(None);
        }
        if &buf[size..framed] != b"\r\n" {
            return Err(TransportError::InvalidChunk);
        }
        out.put_slice(&buf[..size]);
        buf.advance(framed);
    }
}
