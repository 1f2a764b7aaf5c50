use std::sync::Arc;

use url::Url;

use crate::{Error, ReporterOptions, TransportError};

/// A fully built POST request to the ingestion API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
    /// The absolute url including the API route.
    pub url: Url,
    /// Request headers, in the order they are set.
    pub headers: Vec<(&'static str, String)>,
    /// The (possibly compressed) body.
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Returns the value of the first header named `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The response of the server to an [`ApiRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The fully read response body.
    pub body: String,
}

impl ApiResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The trait for transports.
///
/// A transport performs exactly one HTTP exchange per call and reports back
/// what the server said. Classifying the response is left to the caller; an
/// `Err` means that no response was received at all.
///
/// Calls are blocking and happen on the reporter's background threads.
pub trait Transport: Send + Sync + 'static {
    /// Sends the request and returns the response with its body fully read.
    fn post(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// A factory creating transport instances.
///
/// This is implemented for closures taking the options and for any
/// `Arc<Transport>`, which makes it easy to hand in a shared transport such as
/// [`TestTransport`](crate::test::TestTransport).
pub trait TransportFactory: Send + Sync {
    /// Given some options, creates a transport.
    fn create_transport(&self, options: &ReporterOptions) -> Result<Arc<dyn Transport>, Error>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ReporterOptions) -> Result<Arc<dyn Transport>, Error> + Clone + Send + Sync + 'static,
{
    fn create_transport(&self, options: &ReporterOptions) -> Result<Arc<dyn Transport>, Error> {
        (*self)(options)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(&self, _options: &ReporterOptions) -> Result<Arc<dyn Transport>, Error> {
        Ok(self.clone())
    }
}
