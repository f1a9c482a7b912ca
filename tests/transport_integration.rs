//! Integration tests for the HTTP transport against a mock remote.

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use magnet_relay::{HttpTransport, MagnetLink, Transport, TransportError};

const HASH: &str = "c12fe1c06bba254a9dc9f519b335aa7c1367a88a";

fn link() -> MagnetLink {
    MagnetLink::parse(&format!(
        "magnet:?xt=urn:btih:{HASH}&dn=Some.File&utm_source=feed&tr=udp://t.example"
    ))
    .expect("valid link")
}

fn success_body() -> serde_json::Value {
    serde_json::json!({
        "transfer": { "id": 42, "name": "Some.File", "status": "IN_QUEUE" },
        "status": "OK"
    })
}

#[tokio::test]
async fn test_submit_sends_canonical_form_with_bearer_token() {
    let server = MockServer::start().await;

    // The canonical URI keeps dn/tr but drops utm_source
    Mock::given(method("POST"))
        .and(path("/transfers/add"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_string_contains("save_parent_id=0"))
        .and(body_string_contains(HASH))
        .and(body_string_contains("dn%3DSome.File"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::with_base("test-token", &server.uri()).expect("transport");
    let receipt = transport.submit(&link()).await.expect("submission succeeds");

    assert_eq!(receipt.transfer.id, 42);
    assert_eq!(receipt.transfer.status.as_deref(), Some("IN_QUEUE"));
}

#[tokio::test]
async fn test_submit_does_not_send_tracking_params() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transfers/add"))
        .and(body_string_contains("utm_source"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/transfers/add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&server)
        .await;

    let transport = HttpTransport::with_base("test-token", &server.uri()).expect("transport");
    transport.submit(&link()).await.expect("submission succeeds");
}

#[tokio::test]
async fn test_submit_classifies_401_as_invalid_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let transport = HttpTransport::with_base("bad-token", &server.uri()).expect("transport");
    let err = transport.submit(&link()).await.expect_err("must fail");

    assert!(matches!(err, TransportError::InvalidCredential));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_submit_classifies_429_as_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let transport = HttpTransport::with_base("test-token", &server.uri()).expect("transport");
    let err = transport.submit(&link()).await.expect_err("must fail");

    assert!(matches!(err, TransportError::RateLimited));
}

#[tokio::test]
async fn test_submit_classifies_5xx_as_remote_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let transport = HttpTransport::with_base("test-token", &server.uri()).expect("transport");
    let err = transport.submit(&link()).await.expect_err("must fail");

    assert!(matches!(err, TransportError::RemoteServer { status: 503 }));
}

#[tokio::test]
async fn test_submit_uses_remote_error_message_for_other_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({ "error_message": "invalid transfer url" })),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::with_base("test-token", &server.uri()).expect("transport");
    let err = transport.submit(&link()).await.expect_err("must fail");

    match err {
        TransportError::Http { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid transfer url");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_page_fetcher_rejects_oversized_body() {
    let server = MockServer::start().await;
    // One byte over the 3 MiB bound
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 3 * 1024 * 1024 + 1]))
        .mount(&server)
        .await;

    let fetcher = magnet_relay::PageFetcher::new().expect("fetcher");
    let url = url::Url::parse(&format!("{}/big", server.uri())).expect("url");
    let err = fetcher.fetch(&url).await.expect_err("must fail");

    assert!(matches!(err, TransportError::PageTooLarge { .. }));
}

#[tokio::test]
async fn test_page_fetcher_returns_body_and_classifies_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<a href="magnet:?xt=urn:btih:{HASH}">dl</a>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = magnet_relay::PageFetcher::new().expect("fetcher");

    let page = url::Url::parse(&format!("{}/page", server.uri())).expect("url");
    let body = fetcher.fetch(&page).await.expect("fetch succeeds");
    assert!(body.contains(HASH));

    let missing = url::Url::parse(&format!("{}/missing", server.uri())).expect("url");
    let err = fetcher.fetch(&missing).await.expect_err("must fail");
    assert!(matches!(err, TransportError::Http { status: 404, .. }));
}
