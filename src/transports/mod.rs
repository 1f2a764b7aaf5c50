//! The provided transports.
//!
//! The `reqwest` feature (enabled by default through `transport`) turns on the
//! blocking [`ReqwestHttpTransport`].

use std::sync::Arc;

use crate::{Error, ReporterOptions, Transport, TransportFactory};

#[cfg(feature = "reqwest")]
mod reqwest;
#[cfg(feature = "reqwest")]
pub use self::reqwest::ReqwestHttpTransport;

/// Creates the default HTTP transport.
///
/// This is the transport used when [`ReporterOptions::transport`] is not set.
/// If no HTTP transport was compiled into the library, creating it fails.
#[derive(Clone, Debug)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn create_transport(&self, options: &ReporterOptions) -> Result<Arc<dyn Transport>, Error> {
        #[cfg(feature = "reqwest")]
        {
            Ok(Arc::new(ReqwestHttpTransport::new(options)?))
        }
        #[cfg(not(feature = "reqwest"))]
        {
            let _ = options;
            Err(Error::TransportSetup(
                "bosun-metrics was compiled without a transport".into(),
            ))
        }
    }
}
