use reqwest::blocking::Client as ReqwestClient;
use reqwest::Proxy;

use crate::{ApiRequest, ApiResponse, Error, ReporterOptions, Transport, TransportError};

/// A [`Transport`] that posts via the blocking [`reqwest`] client.
///
/// When the `transport` feature is enabled this is the default transport.
///
/// [`reqwest`]: https://crates.io/crates/reqwest
#[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
#[derive(Debug)]
pub struct ReqwestHttpTransport {
    client: ReqwestClient,
}

#[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
impl ReqwestHttpTransport {
    /// Creates a new transport honouring the proxy, timeout and user agent options.
    pub fn new(options: &ReporterOptions) -> Result<Self, Error> {
        let mut builder = ReqwestClient::builder()
            .timeout(options.timeout)
            .user_agent(&*options.user_agent);
        if let Some(url) = options.http_proxy.as_ref() {
            let proxy = Proxy::all(&**url).map_err(|e| Error::TransportSetup(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::TransportSetup(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Creates a new transport that uses the specified [`ReqwestClient`].
    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestHttpTransport {
    fn post(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let ApiRequest { url, headers, body } = request;
        let mut builder = self.client.post(url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).send().map_err(TransportError::new)?;
        let status = response.status().as_u16();
        let body = match response.text() {
            Ok(text) => text,
            Err(err) => {
                bosun_debug!("failed to read api response: {}", err);
                String::new()
            }
        };
        bosun_debug!("got response {}: `{}`", status, body);
        Ok(ApiResponse { status, body })
    }
}
