#![cfg(feature = "transport")]

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bosun_metrics::metrics::Counter;
use bosun_metrics::{Error, MetricsReporter, ReporterOptions, Tags};
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(api_url: &str) -> ReporterOptions {
    let _ = pretty_env_logger::try_init();
    let mut options = ReporterOptions::new(Arc::new(|_| {}));
    options.api_url = Some(api_url.parse().unwrap());
    options.snapshot_interval = Duration::from_secs(3600);
    options.flush_interval = Duration::from_secs(3600);
    options.metadata_interval = None;
    options.flush_on_shutdown = false;
    options.throw_on_post_fail = true;
    options.timeout = Duration::from_secs(5);
    options
}

fn snapshot_and_flush(mut options: ReporterOptions, access_token: Option<&str>) -> Result<(), Error> {
    options.access_token = access_token.map(str::to_owned);
    let reporter = MetricsReporter::new(options)?;
    let counter = reporter.get_default_metric::<Counter>("jobs", Tags::new().with_tag("queue", "mail"))?;
    counter.increment_by(2);
    reporter.snapshot()?;
    reporter.flush()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_posts_gzipped_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/put"))
        .and(header("content-type", "application/json"))
        .and(header("content-encoding", "gzip"))
        .and(header("x-access-token", "secret"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let options = options(&server.uri());
    tokio::task::spawn_blocking(move || snapshot_and_flush(options, Some("secret")))
        .await
        .unwrap()
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let mut body = String::new();
    GzDecoder::new(&requests[0].body[..])
        .read_to_string(&mut body)
        .unwrap();
    let samples: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0]["metric"], "jobs");
    assert_eq!(samples[0]["value"], 2);
    assert_eq!(samples[0]["tags"], json!({"queue": "mail"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_response_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/put"))
        .respond_with(ResponseTemplate::new(500).set_body_string("tsdb unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let options = options(&server.uri());
    let result = tokio::task::spawn_blocking(move || snapshot_and_flush(options, None))
        .await
        .unwrap();
    match result {
        Err(Error::Transmission(err)) => {
            assert_eq!(err.status(), Some(500));
            assert_eq!(err.body(), Some("tsdb unavailable"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_failure_is_reported() {
    // nothing listens on the port once the listener is dropped
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let options = options(&format!("http://127.0.0.1:{port}"));
    let result = tokio::task::spawn_blocking(move || snapshot_and_flush(options, None))
        .await
        .unwrap();
    match result {
        Err(Error::Transmission(err)) => {
            assert_eq!(err.status(), None);
            assert!(std::error::Error::source(&err).is_some());
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
