// typed endpoints over a `Networking` implementation.

use super::{DataResponse, Headers, HttpMethod, MockNetwork, Networking};
use bytes::Bytes;
use std::marker::PhantomData;


/// Description of one HTTP endpoint of a service
pub trait Endpoint {
    /// The service's base URL, shared by all its endpoints
    fn base_url() -> &'static str;

    /// Request method
    fn method(&self) -> HttpMethod;

    /// Path, relative to [`base_url`](Self::base_url)
    fn path(&self) -> String;

    /// Request header fields
    fn headers(&self) -> Headers {
        Headers::new()
    }

    /// Request body
    fn body(&self) -> Option<Bytes> {
        None
    }
}

/// Client for a family of [`Endpoint`]s
pub struct Api<E, N> {
    network: N,
    _endpoint: PhantomData<fn(&E)>,
}

impl<E: Endpoint, N: Networking> Api<E, N> {
    /// Send requests through `network`
    pub fn new(network: N) -> Self {
        Api { network, _endpoint: PhantomData }
    }

    /// Send `endpoint`'s request
    pub async fn request(&self, endpoint: &E) -> anyhow::Result<DataResponse> {
        let url = join_url(E::base_url(), &endpoint.path());
        self.network
            .request(url, endpoint.method(), endpoint.headers(), endpoint.body())
            .await
    }
}

impl<E: Endpoint> Api<E, MockNetwork> {
    /// An API whose responses echo each endpoint's body, with no metadata
    pub fn mock() -> Self {
        Api::new(MockNetwork::echo())
    }
}

// join with exactly one slash between base and path.
fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{path}")
    }
}
