//! Boundary to an HTTP client.
//!
//! This crate ships no HTTP client of its own. Implement [`Networking`] over whichever client the
//! application already uses, then call it from inside the work function of a
//! [`Future`](crate::Future), [`Deferred`](crate::Deferred) or [`Stream`](crate::Stream). Its
//! failures then flow through them like any other work failure.
//!
//! [`MockNetwork`] and [`Api::mock`] stand in for a real client in tests.

mod api;
mod method;
mod mock;

pub use self::{
    api::{Api, Endpoint},
    method::{HttpMethod, UnknownMethodError},
    mock::MockNetwork,
};

use bytes::Bytes;
use futures::future::BoxFuture;


/// Request or response header fields, in order
pub type Headers = Vec<(String, String)>;

/// Headers sent by the convenience methods of [`Networking`] when none are given
pub fn default_headers() -> Headers {
    vec![
        ("Content-Type".to_owned(), "application/json; charset=utf-8".to_owned()),
        ("Accept".to_owned(), "application/json".to_owned()),
    ]
}

/// What the server said about a response, beyond its body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseMetadata {
    /// HTTP status code
    pub status: u16,
    /// URL the response was ultimately served from
    pub url: String,
    /// Response header fields
    pub headers: Headers,
}

/// Body and metadata of a response, either of which may be absent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataResponse {
    /// Response body
    pub data: Option<Bytes>,
    /// Response metadata
    pub response: Option<ResponseMetadata>,
}

impl DataResponse {
    /// Construct from parts
    pub fn new(data: Option<Bytes>, response: Option<ResponseMetadata>) -> Self {
        DataResponse { data, response }
    }
}

/// An HTTP client
///
/// Only [`request`](Self::request) is required. The per-method helpers fill in
/// [`default_headers`] when `headers` is `None`.
pub trait Networking: Send + Sync {
    /// Send a request
    fn request(
        &self,
        url: String,
        method: HttpMethod,
        headers: Headers,
        body: Option<Bytes>,
    ) -> BoxFuture<'_, anyhow::Result<DataResponse>>;

    /// Send a GET request
    fn get(&self, url: &str, headers: Option<Headers>) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Get, headers.unwrap_or_else(default_headers), None)
    }

    /// Send a HEAD request
    fn head(&self, url: &str, headers: Option<Headers>) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Head, headers.unwrap_or_else(default_headers), None)
    }

    /// Send a CONNECT request
    fn connect(&self, url: &str, headers: Option<Headers>) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Connect, headers.unwrap_or_else(default_headers), None)
    }

    /// Send an OPTIONS request
    fn options(&self, url: &str, headers: Option<Headers>) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Options, headers.unwrap_or_else(default_headers), None)
    }

    /// Send a TRACE request
    fn trace(&self, url: &str, headers: Option<Headers>) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Trace, headers.unwrap_or_else(default_headers), None)
    }

    /// Send a POST request
    fn post(
        &self,
        url: &str,
        body: Option<Bytes>,
        headers: Option<Headers>,
    ) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Post, headers.unwrap_or_else(default_headers), body)
    }

    /// Send a PUT request
    fn put(
        &self,
        url: &str,
        body: Option<Bytes>,
        headers: Option<Headers>,
    ) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Put, headers.unwrap_or_else(default_headers), body)
    }

    /// Send a PATCH request
    fn patch(
        &self,
        url: &str,
        body: Option<Bytes>,
        headers: Option<Headers>,
    ) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Patch, headers.unwrap_or_else(default_headers), body)
    }

    /// Send a DELETE request
    fn delete(
        &self,
        url: &str,
        body: Option<Bytes>,
        headers: Option<Headers>,
    ) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        self.request(url.to_owned(), HttpMethod::Delete, headers.unwrap_or_else(default_headers), body)
    }
}

impl<N: Networking + ?Sized> Networking for Box<N> {
    fn request(
        &self,
        url: String,
        method: HttpMethod,
        headers: Headers,
        body: Option<Bytes>,
    ) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        (**self).request(url, method, headers, body)
    }
}

impl<N: Networking + ?Sized> Networking for std::sync::Arc<N> {
    fn request(
        &self,
        url: String,
        method: HttpMethod,
        headers: Headers,
        body: Option<Bytes>,
    ) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        (**self).request(url, method, headers, body)
    }
}
