//! Builds API requests and classifies their responses.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use url::Url;

use crate::metadata::MetaData;
use crate::options::{ReporterOptions, TokenResolver, UrlResolver};
use crate::transport::{ApiRequest, Transport};
use crate::{Error, TransmissionError};

const PUT_ROUTE: &str = "api/put";
const METADATA_ROUTE: &str = "api/metadata/put";

/// The outcome of a successful call to the transmitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The server accepted the payload.
    Sent,
    /// No destination was configured, nothing was sent.
    NoDestination,
}

/// Posts payloads to the resolved destination.
pub(crate) struct Transmitter {
    transport: Arc<dyn Transport>,
    api_url: Option<Url>,
    api_url_resolver: Option<UrlResolver>,
    access_token: Option<String>,
    access_token_resolver: Option<TokenResolver>,
    gzip: bool,
    user_agent: String,
}

impl Transmitter {
    pub fn new(transport: Arc<dyn Transport>, options: &ReporterOptions) -> Self {
        Self {
            transport,
            api_url: options.api_url.clone(),
            api_url_resolver: options.api_url_resolver.clone(),
            access_token: options.access_token.clone(),
            access_token_resolver: options.access_token_resolver.clone(),
            gzip: options.gzip,
            user_agent: options.user_agent.to_string(),
        }
    }

    /// Resolves the current destination; the resolver takes precedence.
    pub fn resolve_destination(&self) -> Option<Url> {
        match self.api_url_resolver {
            Some(ref resolver) => resolver(),
            None => self.api_url.clone(),
        }
    }

    fn resolve_token(&self) -> Option<String> {
        let token = match self.access_token_resolver {
            Some(ref resolver) => resolver(),
            None => self.access_token.clone(),
        };
        token.filter(|t| !t.is_empty())
    }

    /// Posts a batch of serialized samples to `/api/put`.
    pub fn post_batch(&self, batch: &[String]) -> Result<Delivery, Error> {
        let Some(base) = self.resolve_destination() else {
            return Ok(Delivery::NoDestination);
        };

        let mut payload = Vec::with_capacity(batch.iter().map(|s| s.len() + 1).sum::<usize>() + 2);
        payload.push(b'[');
        for (idx, sample) in batch.iter().enumerate() {
            if idx > 0 {
                payload.push(b',');
            }
            payload.extend_from_slice(sample.as_bytes());
        }
        payload.push(b']');

        let body = if self.gzip { gzip(&payload)? } else { payload };
        self.post(&base, PUT_ROUTE, body, self.gzip)?;
        Ok(Delivery::Sent)
    }

    /// Posts metadata descriptors to `/api/metadata/put`, uncompressed.
    pub fn post_metadata(&self, metadata: &[MetaData]) -> Result<Delivery, Error> {
        let Some(base) = self.resolve_destination() else {
            return Ok(Delivery::NoDestination);
        };
        let body = serde_json::to_vec(metadata)?;
        self.post(&base, METADATA_ROUTE, body, false)?;
        Ok(Delivery::Sent)
    }

    fn post(&self, base: &Url, route: &str, body: Vec<u8>, compressed: bool) -> Result<(), Error> {
        let url = api_url(base, route)?;
        let mut headers = vec![
            ("Content-Type", "application/json".to_owned()),
            ("User-Agent", self.user_agent.clone()),
        ];
        if compressed {
            headers.push(("Content-Encoding", "gzip".to_owned()));
        }
        if let Some(token) = self.resolve_token() {
            headers.push(("X-Access-Token", token));
        }

        bosun_debug!("posting {} bytes to {}", body.len(), url);
        let response = self
            .transport
            .post(ApiRequest { url, headers, body })
            .map_err(TransmissionError::from_transport)?;
        if !response.is_success() {
            return Err(TransmissionError::from_response(response.status, response.body).into());
        }
        Ok(())
    }
}

impl fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transmitter")
            .field("api_url", &self.api_url)
            .field("api_url_resolver", &self.api_url_resolver.is_some())
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("gzip", &self.gzip)
            .finish()
    }
}

/// Joins `route` onto `base`, treating `base` as a directory even without a
/// trailing slash so that path prefixes such as `/bosun` are kept.
fn api_url(base: &Url, route: &str) -> Result<Url, Error> {
    if base.path().ends_with('/') {
        return Ok(base.join(route)?);
    }
    let mut base = base.clone();
    let path = format!("{}/", base.path());
    base.set_path(&path);
    Ok(base.join(route)?)
}

fn gzip(payload: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(payload.len() / 4), Compression::default());
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}
