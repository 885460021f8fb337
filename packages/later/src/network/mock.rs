// stand-in network for tests.

use super::{DataResponse, Headers, HttpMethod, Networking};
use bytes::Bytes;
use futures::future::{self, BoxFuture, FutureExt};


/// A [`Networking`] implementation that never touches the network
#[derive(Debug, Clone)]
pub enum MockNetwork {
    /// Answer every request with this response
    Fixed(DataResponse),
    /// Answer every request with its own body and no metadata
    Echo,
}

impl MockNetwork {
    /// Answer every request with `response`
    pub fn new(response: DataResponse) -> Self {
        MockNetwork::Fixed(response)
    }

    /// Answer every request with its own body
    pub fn echo() -> Self {
        MockNetwork::Echo
    }
}

impl Networking for MockNetwork {
    fn request(
        &self,
        url: String,
        method: HttpMethod,
        _headers: Headers,
        body: Option<Bytes>,
    ) -> BoxFuture<'_, anyhow::Result<DataResponse>> {
        trace!(%url, %method, "mock request");
        let response = match self {
            MockNetwork::Fixed(response) => response.clone(),
            MockNetwork::Echo => DataResponse::new(body, None),
        };
        future::ready(Ok(response)).boxed()
    }
}
