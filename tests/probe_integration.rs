//! Integration tests for the remote-size probe chain.
//!
//! Each test shapes a mock server to answer only one technique in the
//! fallback chain and verifies the chain settles on the right answer.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use nightly_fetch_core::{HttpClient, RetryPolicy, RunConfig, probe_size};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client() -> HttpClient {
    HttpClient::from_config(&RunConfig::default()).unwrap()
}

/// Policy with millisecond delays so error-path tests stay fast.
fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(
        2,
        Duration::from_millis(5),
        Duration::from_millis(20),
        Duration::from_millis(1),
    )
}

#[tokio::test]
async fn test_probe_head_discloses_length() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/a.whl"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
        .mount(&mock_server)
        .await;

    let cancel = AtomicBool::new(false);
    let url = format!("{}/a.whl", mock_server.uri());
    let size = probe_size(&test_client(), &url, &fast_policy(), &cancel).await;

    assert_eq!(size, Some(2048));
}

#[tokio::test]
async fn test_probe_falls_back_to_content_range_total() {
    let mock_server = MockServer::start().await;

    // HEAD is refused; the single-byte range request reports the total.
    Mock::given(method("HEAD"))
        .and(path("/a.whl"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.whl"))
        .and(header("Range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 0-0/4096")
                .set_body_bytes(vec![0u8; 1]),
        )
        .mount(&mock_server)
        .await;

    let cancel = AtomicBool::new(false);
    let url = format!("{}/a.whl", mock_server.uri());
    let size = probe_size(&test_client(), &url, &fast_policy(), &cancel).await;

    assert_eq!(size, Some(4096));
}

#[tokio::test]
async fn test_probe_star_total_falls_through_to_streaming_get() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/a.whl"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&mock_server)
        .await;
    // A `*` total means the server will not disclose the size here.
    Mock::given(method("GET"))
        .and(path("/a.whl"))
        .and(header("Range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 0-0/*")
                .set_body_bytes(vec![0u8; 1]),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.whl"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1234]))
        .mount(&mock_server)
        .await;

    let cancel = AtomicBool::new(false);
    let url = format!("{}/a.whl", mock_server.uri());
    let size = probe_size(&test_client(), &url, &fast_policy(), &cancel).await;

    assert_eq!(size, Some(1234));
}

#[tokio::test]
async fn test_probe_exhausted_chain_is_unknown() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/a.whl"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.whl"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let cancel = AtomicBool::new(false);
    let url = format!("{}/a.whl", mock_server.uri());
    let size = probe_size(&test_client(), &url, &fast_policy(), &cancel).await;

    assert_eq!(size, None);
}

#[tokio::test]
async fn test_probe_connection_failure_retries_then_unknown() {
    // Nothing listens on the discard port; every technique errors and
    // burns its retry budget before the chain gives up.
    let cancel = AtomicBool::new(false);
    let size = probe_size(
        &test_client(),
        "http://127.0.0.1:9/a.whl",
        &fast_policy(),
        &cancel,
    )
    .await;

    assert_eq!(size, None);
}

#[tokio::test]
async fn test_probe_preset_cancel_makes_no_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let cancel = AtomicBool::new(true);
    let url = format!("{}/a.whl", mock_server.uri());
    let size = probe_size(&test_client(), &url, &fast_policy(), &cancel).await;

    assert_eq!(size, None);
}
