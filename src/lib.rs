//! # tether
//!
//! An async hypermedia HTTP client with a pluggable response cache.
//!
//! Every exchange yields a [`Response`] that separates transport failures from
//! API failures and decodes its body at most once. Responses can be cached per
//! `Accept` value and URL through any [`Adapter`]; [`MemoryAdapter`] is built in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde::Deserialize;
//! use tether::{Client, MemoryAdapter};
//! use tether::transport::TcpTransport;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct User {
//!     login: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::parse("http://api.example.com/", Arc::new(TcpTransport::new()))?
//!         .with_cache(Arc::new(MemoryAdapter::new()));
//!
//!     let request = client.new_request("users/octocat")?;
//!     let mut user = User::default();
//!     let response = client.fetch(&request, &mut user, None).await;
//!     response.result()?;
//!
//!     println!("{} ({})", user.login, response.status());
//!     for (rel, link) in client.rels(&request).iter() {
//!         println!("  {rel}: {link}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod hypermedia;
pub mod mediatype;
pub mod transport;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{Adapter, MemoryAdapter};
pub use client::Client;
pub use error::{Error, Result};
pub use http::{Headers, Method, RawResponse, Request, Response, StatusCode};
