//! Fetch client tests
//!
//! Retry budget, backoff exhaustion and request headers against a mock server.

use renzoku::prelude::*;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{fast_retry, test_client};

#[cfg(test)]
mod fetch_tests {
    use super::*;

    #[tokio::test]
    async fn test_succeeds_on_last_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(4);
        let body = client
            .get_text(&format!("{}/flaky", server.uri()), None)
            .await
            .unwrap();
        assert_eq!(body, "finally");
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let client = test_client(4);
        let result = client.fetch(&format!("{}/down", server.uri()), None).await;
        match result {
            Err(Error::BadStatus { status, url }) => {
                assert_eq!(status, 503);
                assert!(url.ends_with("/down"));
            }
            other => panic!("expected BadStatus, got {:?}", other.map(|r| r.status())),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried() {
        // Nothing listens on the reserved port, so every attempt fails to connect.
        let client = test_client(2);
        let result = client.get_text("http://127.0.0.1:9/", None).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_stalled_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stalled"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .timeout(Duration::from_millis(200))
            .retry(fast_retry(1))
            .build()
            .unwrap();
        let started = Instant::now();
        let result = client
            .get_text(&format!("{}/stalled", server.uri()), None)
            .await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_send_is_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(4);
        let result = client.send(&server.uri(), None).await;
        assert!(matches!(result, Err(Error::BadStatus { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_referer_and_default_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("referer", "https://example.com/manga/foo/chapter/1-1"))
            .and(header("user-agent", "RenzokuTest/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .retry(fast_retry(1))
            .header("User-Agent", "RenzokuTest/1.0")
            .build()
            .unwrap();
        let body = client
            .get_text(
                &server.uri(),
                Some("https://example.com/manga/foo/chapter/1-1"),
            )
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }
}
