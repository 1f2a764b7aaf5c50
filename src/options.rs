use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::tags::{PropertyToTagName, TagMap, TagValueConverter};
use crate::{ExceptionHandler, TransportFactory};

/// The user agent sent with every request.
pub const USER_AGENT: &str = concat!("bosun-metrics/", env!("CARGO_PKG_VERSION"));

/// Type alias for a function resolving the API url at call time.
///
/// Returning `None` means there is no destination for this cycle.
pub type UrlResolver = Arc<dyn Fn() -> Option<Url> + Send + Sync>;

/// Type alias for a function resolving the access token at call time.
///
/// Returning `None` or an empty string omits the `X-Access-Token` header.
pub type TokenResolver = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Configuration settings for the reporter.
///
/// The options are moved into the [`MetricsReporter`](crate::MetricsReporter)
/// and cannot be changed afterwards.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let mut options = bosun_metrics::ReporterOptions::new(Arc::new(|err| {
///     eprintln!("metrics error: {err}");
/// }));
/// options.name_prefix = "app.".into();
/// options.api_url = Some("http://bosun:8070".parse().unwrap());
/// options.snapshot_interval = Duration::from_secs(10);
/// ```
#[derive(Clone)]
pub struct ReporterOptions {
    /// Receives every error raised on the background tickers.
    pub exception_handler: ExceptionHandler,
    /// Prepended to every metric name.
    pub name_prefix: String,
    /// The base url of the Bosun API. If neither this nor a resolver is set,
    /// collected samples are dropped.
    pub api_url: Option<Url>,
    /// Resolves the base url on every tick. Takes precedence over `api_url`.
    pub api_url_resolver: Option<UrlResolver>,
    /// Maximum number of samples per POST. (defaults to 50)
    pub batch_size: usize,
    /// Maximum number of samples waiting to be sent. (defaults to 12 000)
    pub max_queue_length: usize,
    /// Report failed posts to the exception handler.
    pub throw_on_post_fail: bool,
    /// Report a full pending queue to the exception handler.
    pub throw_on_queue_full: bool,
    /// How often metric values are captured. (defaults to 30s)
    pub snapshot_interval: Duration,
    /// How often the pending queue is drained. (defaults to 1s)
    pub flush_interval: Duration,
    /// The number of flush ticks skipped after a failed post. (defaults to 4)
    pub flush_backoff_ticks: usize,
    /// How often metadata is posted. `None` or zero disables it. (defaults to 24h)
    pub metadata_interval: Option<Duration>,
    /// The delay before metadata is posted the first time. (defaults to 30s)
    pub metadata_initial_delay: Duration,
    /// Compress sample payloads with gzip.
    pub gzip: bool,
    /// Derives tag names from property names declared with [`Tags::with_property`](crate::Tags::with_property).
    pub property_to_tag_name: Option<PropertyToTagName>,
    /// Converts every tag value before it is validated.
    pub tag_value_converter: Option<TagValueConverter>,
    /// Tags added to every metric type that does not opt out.
    pub default_tags: TagMap,
    /// Sent as the `X-Access-Token` header.
    pub access_token: Option<String>,
    /// Resolves the access token on every post. Takes precedence over `access_token`.
    pub access_token_resolver: Option<TokenResolver>,
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the reporter options by
    /// reference and returning a `Transport`, or an `Arc<Transport>`. If not
    /// set, the default HTTP transport is used.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// An optional HTTP proxy to use.
    pub http_proxy: Option<Cow<'static, str>>,
    /// The timeout of a single request. (defaults to 30s)
    pub timeout: Duration,
    /// The user agent that should be reported.
    pub user_agent: Cow<'static, str>,
    /// Post samples that are still queued when the reporter shuts down.
    pub flush_on_shutdown: bool,
}

impl ReporterOptions {
    /// Creates options with the default settings. Every background error is
    /// passed to `exception_handler`.
    pub fn new(exception_handler: ExceptionHandler) -> Self {
        Self {
            exception_handler,
            name_prefix: String::new(),
            api_url: None,
            api_url_resolver: None,
            batch_size: 50,
            max_queue_length: 12_000,
            throw_on_post_fail: false,
            throw_on_queue_full: true,
            snapshot_interval: Duration::from_secs(30),
            flush_interval: Duration::from_secs(1),
            flush_backoff_ticks: 4,
            metadata_interval: Some(Duration::from_secs(24 * 60 * 60)),
            metadata_initial_delay: Duration::from_secs(30),
            gzip: true,
            property_to_tag_name: None,
            tag_value_converter: None,
            default_tags: TagMap::new(),
            access_token: None,
            access_token_resolver: None,
            transport: None,
            http_proxy: None,
            timeout: Duration::from_secs(30),
            user_agent: Cow::Borrowed(USER_AGENT),
            flush_on_shutdown: true,
        }
    }
}

impl fmt::Debug for ReporterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct Resolver;
        #[derive(Debug)]
        struct Converter;
        #[derive(Debug)]
        struct TransportFactory;

        f.debug_struct("ReporterOptions")
            .field("name_prefix", &self.name_prefix)
            .field("api_url", &self.api_url)
            .field("api_url_resolver", &self.api_url_resolver.as_ref().map(|_| Resolver))
            .field("batch_size", &self.batch_size)
            .field("max_queue_length", &self.max_queue_length)
            .field("throw_on_post_fail", &self.throw_on_post_fail)
            .field("throw_on_queue_full", &self.throw_on_queue_full)
            .field("snapshot_interval", &self.snapshot_interval)
            .field("flush_interval", &self.flush_interval)
            .field("flush_backoff_ticks", &self.flush_backoff_ticks)
            .field("metadata_interval", &self.metadata_interval)
            .field("metadata_initial_delay", &self.metadata_initial_delay)
            .field("gzip", &self.gzip)
            .field("property_to_tag_name", &self.property_to_tag_name.as_ref().map(|_| Converter))
            .field("tag_value_converter", &self.tag_value_converter.as_ref().map(|_| Converter))
            .field("default_tags", &self.default_tags)
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("access_token_resolver", &self.access_token_resolver.as_ref().map(|_| Resolver))
            .field("transport", &self.transport.as_ref().map(|_| TransportFactory))
            .field("http_proxy", &self.http_proxy)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("flush_on_shutdown", &self.flush_on_shutdown)
            .finish()
    }
}
