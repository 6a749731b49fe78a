//! The request-building, cache-aware HTTP client.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::cache::Adapter;
use crate::config::ClientConfig;
use crate::http::{Method, Request, RequestError, Response};
use crate::hypermedia::Relations;
use crate::mediatype::Decodable;
use crate::transport::Transport;

/// An API client rooted at an endpoint URL.
///
/// Requests are built relative to the endpoint, sent through a [`Transport`],
/// and optionally served from and stored into a cache [`Adapter`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use tether::cache::MemoryAdapter;
/// use tether::client::Client;
/// use tether::transport::TcpTransport;
///
/// let client = Client::parse("http://api.example.com/v3", Arc::new(TcpTransport::new()))
///     .unwrap()
///     .with_cache(Arc::new(MemoryAdapter::new()));
///
/// let request = client.new_request("users/octocat").unwrap();
/// assert_eq!(request.url().as_str(), "http://api.example.com/v3/users/octocat");
/// assert_eq!(request.accept(), Some("application/json"));
/// ```
#[derive(Clone)]
pub struct Client {
    endpoint: Url,
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn Adapter>>,
    config: ClientConfig,
}

impl Client {
    /// Creates a client for `endpoint`.
    ///
    /// The endpoint path always ends in `/`, so relative references resolve
    /// beneath it rather than replacing its last segment.
    pub fn new(mut endpoint: Url, transport: Arc<dyn Transport>) -> Self {
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Self {
            endpoint,
            transport,
            cache: None,
            config: ClientConfig::default(),
        }
    }

    /// Parses `endpoint` and creates a client for it.
    pub fn parse(endpoint: &str, transport: Arc<dyn Transport>) -> Result<Self, RequestError> {
        let url = Url::parse(endpoint).map_err(|source| RequestError::InvalidUrl {
            url: endpoint.to_owned(),
            source,
        })?;
        if url.cannot_be_a_base() {
            return Err(RequestError::CannotBeABase(url));
        }
        Ok(Self::new(url, transport))
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn Adapter>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<dyn Adapter>> {
        self.cache.as_ref()
    }

    /// Resolves `reference` against the endpoint.
    ///
    /// Absolute URLs pass through unchanged; a leading `/` replaces the
    /// endpoint path.
    pub fn resolve_reference(&self, reference: &str) -> Result<Url, RequestError> {
        self.endpoint
            .join(reference)
            .map_err(|source| RequestError::InvalidUrl {
                url: reference.to_owned(),
                source,
            })
    }

    /// Builds a `GET` request for `reference` with the configured
    /// `Accept` and `User-Agent` headers.
    pub fn new_request(&self, reference: &str) -> Result<Request, RequestError> {
        let url = self.resolve_reference(reference)?;
        let mut request = Request::get(url).header("Accept", self.config.accept.as_str());
        if let Some(agent) = &self.config.user_agent {
            request = request.header("User-Agent", agent.as_str());
        }
        Ok(request)
    }

    /// Sends `request` over the transport, bypassing the cache.
    pub async fn send(&self, request: &Request) -> Response {
        debug!(method = %request.method(), url = %request.url(), "sending request");
        let response = Response::build(self.transport.send(request).await);
        match response.error() {
            Some(err) => debug!(url = %request.url(), error = %err, "request failed"),
            None => debug!(url = %request.url(), status = %response.status(), "response received"),
        }
        response
    }

    /// Sends `request`, serving it from the cache when possible.
    ///
    /// `GET` and `HEAD` consult the cache first. On a miss the response is
    /// fetched, and a `GET` response is stored when it is not an error and,
    /// unless [`ClientConfig::cache_api_errors`] is set, not an API error.
    /// An unreadable entry is logged and treated as a miss.
    pub async fn get(&self, request: &Request) -> Response {
        let cache = match &self.cache {
            Some(cache) if request.method().is_cacheable() => cache,
            _ => return self.send(request).await,
        };

        let cached = cache.get(request, None);
        match cached.error() {
            None => {
                debug!(url = %request.url(), status = %cached.status(), "served from cache");
                return cached;
            }
            Some(err) if !err.is_no_response() => {
                warn!(url = %request.url(), error = %err, "discarding unreadable cache entry");
            }
            Some(_) => {}
        }

        let response = self.send(request).await;
        if self.should_store(request, &response) {
            if let Err(err) = cache.set(request, &response, None) {
                warn!(url = %request.url(), error = %err, "failed to cache response");
            }
        }
        response
    }

    /// Like [`get`](Self::get), then decodes the body.
    ///
    /// A successful response is decoded into `resource`. An API-error response
    /// is decoded into `api_error` when one is given, and left unread
    /// otherwise. Decode failures are recorded on the returned response.
    pub async fn fetch(
        &self,
        request: &Request,
        resource: &mut (dyn Decodable + Send),
        api_error: Option<&mut (dyn Decodable + Send)>,
    ) -> Response {
        let mut response = self.get(request).await;
        if response.is_error() || response.media_type().is_none() {
            return response;
        }

        let target: &mut dyn Decodable = if response.is_api_error() {
            match api_error {
                Some(target) => target,
                None => return response,
            }
        } else {
            resource
        };
        if let Err(err) = response.decode(Some(target)) {
            debug!(url = %request.url(), error = %err, "decode failed");
        }
        response
    }

    /// Hypermedia relations the cache holds for the resource `request` addresses.
    pub fn rels(&self, request: &Request) -> Relations {
        self.cache
            .as_ref()
            .map(|cache| cache.rels(request))
            .unwrap_or_default()
    }

    fn should_store(&self, request: &Request, response: &Response) -> bool {
        *request.method() == Method::Get
            && !response.is_error()
            && (self.config.cache_api_errors || !response.is_api_error())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint.as_str())
            .field("cached", &self.cache.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
