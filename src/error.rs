use std::error::Error as StdError;
use std::fmt;

/// Type alias for the handler receiving errors raised on background tickers.
pub type ExceptionHandler = std::sync::Arc<dyn Fn(&Error) + Send + Sync>;

/// The error type of this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A metric name or prefix does not match the metric name grammar.
    #[error("\"{name}\" is not a valid metric name")]
    InvalidName {
        /// The offending name.
        name: String,
    },
    /// A tag name or value does not match the tag grammar.
    #[error("invalid tag {name}={value:?}")]
    InvalidTag {
        /// The tag name after conversion.
        name: String,
        /// The tag value after conversion.
        value: String,
    },
    /// The root name is already claimed by a different metric type.
    #[error(
        "attempted to create metric name \"{name}\" with type {requested}. \
         This metric name has already been assigned to type {existing}"
    )]
    NameConflict {
        /// The contested root name.
        name: String,
        /// The type that owns the name.
        existing: &'static str,
        /// The type that tried to claim it.
        requested: &'static str,
    },
    /// A name or one of its suffixed names is already claimed by another root.
    #[error(
        "attempted to create metric name \"{name}\" with type {requested}. \
         This metric name is already in use as a suffix of \"{root}\" ({existing})"
    )]
    SuffixConflict {
        /// The contested name including its suffix.
        name: String,
        /// The root that owns the name.
        root: String,
        /// The type of that root.
        existing: &'static str,
        /// The type that tried to claim it.
        requested: &'static str,
    },
    /// The pending queue reached its capacity; further samples are dropped.
    #[error("the pending metrics queue is full ({capacity} samples); data is being dropped")]
    QueueFull {
        /// The configured capacity.
        capacity: usize,
    },
    /// A metric produced a sample that cannot be sent.
    #[error("metric \"{name}\" produced an invalid sample: {reason}")]
    InvalidSample {
        /// The full metric name of the sample.
        name: String,
        /// Why the sample was rejected.
        reason: &'static str,
    },
    /// Posting to the API failed.
    #[error(transparent)]
    Transmission(#[from] TransmissionError),
    /// The API url could not be built.
    #[error("invalid api url")]
    Url(#[from] url::ParseError),
    /// A payload could not be serialized.
    #[error("failed to serialize payload")]
    Json(#[from] serde_json::Error),
    /// A payload could not be compressed.
    #[error("failed to write payload")]
    Io(#[from] std::io::Error),
    /// A reporter option has an unusable value.
    #[error("invalid option {name}: {reason}")]
    InvalidOption {
        /// The name of the option.
        name: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
    /// The transport could not be created.
    #[error("failed to create transport: {0}")]
    TransportSetup(String),
}

/// An opaque error raised by a [`Transport`](crate::Transport) when no response was received.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct TransportError(Box<dyn StdError + Send + Sync>);

impl TransportError {
    /// Wraps an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self(error.into())
    }
}

/// A failed post to the API.
///
/// If the server responded, the status code and the full response body are
/// attached. Otherwise the underlying [`TransportError`] is the source.
#[derive(Debug)]
pub struct TransmissionError {
    status: Option<u16>,
    body: Option<String>,
    source: Option<TransportError>,
}

impl TransmissionError {
    pub(crate) fn from_transport(error: TransportError) -> Self {
        Self {
            status: None,
            body: None,
            source: Some(error),
        }
    }

    pub(crate) fn from_response(status: u16, body: String) -> Self {
        Self {
            status: Some(status),
            body: Some(body),
            source: None,
        }
    }

    /// The HTTP status code, if the server responded.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// The response body, if the server responded.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl fmt::Display for TransmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "posting to the api failed with status {status}")?,
            None => write!(f, "posting to the api failed without a response")?,
        }
        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            write!(f, ": {body}")?;
        }
        Ok(())
    }
}

impl StdError for TransmissionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmission_error_display() {
        let err = TransmissionError::from_response(500, "boom".into());
        assert_eq!(err.to_string(), "posting to the api failed with status 500: boom");
        assert_eq!(err.status(), Some(500));
        assert!(err.source().is_none());

        let err = TransmissionError::from_transport(TransportError::new("connection refused"));
        assert_eq!(err.to_string(), "posting to the api failed without a response");
        assert_eq!(err.body(), None);
        assert_eq!(err.source().unwrap().to_string(), "connection refused");
    }
}
