//! Common test utilities and fixtures
//!
//! Shared functionality used across all test modules: fast-retry clients,
//! chapter page fixtures and mock server helpers.
#![allow(dead_code)]

use renzoku::config::{Config, RetryConfig};
use renzoku::prelude::*;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

/// A retry policy with millisecond delays.
pub fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(4))
}

pub fn test_client(attempts: u32) -> HttpClient {
    HttpClient::builder()
        .timeout(TEST_TIMEOUT)
        .retry(fast_retry(attempts))
        .build()
        .unwrap()
}

/// Default configuration writing into `downloads` with fast retries.
pub fn test_config(downloads: &Path) -> Config {
    let mut config = Config::default();
    config.app.downloads_dir = downloads.to_path_buf();
    config.app.concurrency = 3;
    config.download.retry = RetryConfig {
        attempts: 2,
        base_delay: 0.001,
        max_delay: 0.004,
    };
    config
}

/// A chapter page listing `pages` as page images numbered from 1.
///
/// `head` is inserted into `<head>`, `body` after the images.
pub fn chapter_html(title: &str, pages: &[&str], head: &str, body: &str) -> String {
    let images: String = pages
        .iter()
        .enumerate()
        .map(|(i, src)| {
            format!(
                r#"<img class="page-image" data-number="{}" src="{}">"#,
                i + 1,
                src
            )
        })
        .collect();
    format!(
        "<html><head><title>{}</title>{}</head><body>{}{}</body></html>",
        title, head, images, body
    )
}

/// A chapter page with one image and no navigation.
pub fn plain_chapter(title: &str) -> String {
    chapter_html(title, &["/img/1.jpg"], "", "")
}

pub fn html_response(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into().into_bytes(), "text/html")
}

pub fn image_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(PNG_BYTES.to_vec(), "image/png")
}

/// Serves `body` as HTML at `route`.
pub async fn mount_html(server: &MockServer, route: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_response(body))
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// `<server>/manga/<slug>/chapter/<id>`
pub fn chapter_url(server: &MockServer, slug: &str, id: &str) -> ChapterUrl {
    ChapterUrl::parse(&format!("{}/manga/{}/chapter/{}", server.uri(), slug, id)).unwrap()
}

pub fn chapter_path(slug: &str, id: &str) -> String {
    format!("/manga/{}/chapter/{}", slug, id)
}
