//! HTTP fetcher behaviour against a local origin.

mod common;

use common::{init_tracing, local_http_config};
use reelcap_engine::{AcquireError, HttpConfig, HttpFetcher, ResourceFetcher, StatusPolicy};
use reqwest::StatusCode;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn origin_with(route: &str, template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_fetch_returns_full_body() {
    init_tracing();
    let server = origin_with(
        "/media/clip.cmfv",
        ResponseTemplate::new(200).set_body_bytes(b"video-bytes".to_vec()),
    )
    .await;

    let fetcher = HttpFetcher::new(&local_http_config()).expect("client");
    let body = fetcher
        .fetch(&format!("{}/media/clip.cmfv", server.uri()))
        .await
        .expect("fetch failed");

    assert_eq!(&body[..], b"video-bytes");
}

#[tokio::test]
async fn test_strict_policy_rejects_error_status() {
    init_tracing();
    let server = origin_with(
        "/media/missing.cmfa",
        ResponseTemplate::new(404).set_body_string("<html>not found</html>"),
    )
    .await;

    let fetcher = HttpFetcher::new(&local_http_config()).expect("client");
    let err = fetcher
        .fetch(&format!("{}/media/missing.cmfa", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AcquireError::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND
    ));
    assert!(err.is_network());
}

#[tokio::test]
async fn test_lenient_policy_keeps_error_body() {
    init_tracing();
    let server = origin_with(
        "/media/missing.cmfa",
        ResponseTemplate::new(404).set_body_string("<html>not found</html>"),
    )
    .await;

    let config = HttpConfig {
        status_policy: StatusPolicy::Lenient,
        ..local_http_config()
    };
    let fetcher = HttpFetcher::new(&config).expect("client");
    let body = fetcher
        .fetch(&format!("{}/media/missing.cmfa", server.uri()))
        .await
        .expect("lenient fetch should succeed");

    assert_eq!(&body[..], b"<html>not found</html>");
}

#[tokio::test]
async fn test_fetch_to_file_streams_body() {
    init_tracing();
    let payload = vec![7u8; 256 * 1024];
    let server = origin_with(
        "/media/clip.cmfv",
        ResponseTemplate::new(200).set_body_bytes(payload.clone()),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("clip.cmfv");

    let fetcher = HttpFetcher::new(&local_http_config()).expect("client");
    let written = fetcher
        .fetch_to_file(&format!("{}/media/clip.cmfv", server.uri()), &dest)
        .await
        .expect("fetch failed");

    assert_eq!(written, payload.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}

#[tokio::test]
async fn test_custom_headers_are_sent() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.m3u8"))
        .and(header("referer", "https://www.example.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::REFERER,
        reqwest::header::HeaderValue::from_static("https://www.example.com/"),
    );
    let config = local_http_config().with_headers(headers);
    let fetcher = HttpFetcher::new(&config).expect("client");

    fetcher
        .fetch(&format!("{}/index.m3u8", server.uri()))
        .await
        .expect("fetch failed");
}

#[tokio::test]
async fn test_unreachable_origin_is_network_error() {
    init_tracing();
    // grab a free port, then release it so nothing is listening there
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = format!("http://127.0.0.1:{port}");

    let fetcher = HttpFetcher::new(&local_http_config()).expect("client");
    let err = fetcher
        .fetch(&format!("{uri}/gone.ts"))
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::Network { .. }));
    assert!(err.is_retryable());
}
