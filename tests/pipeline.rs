//! End-to-end pipeline tests
//!
//! Full runs against a mock site, writing into temporary library directories.

use renzoku::pipeline::{RunOptionsBuilder, RunSummary};
use renzoku::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer};

mod common;
use common::{
    PNG_BYTES, chapter_html, chapter_path, chapter_url, html_response, image_response,
    mount_html, mount_status, plain_chapter, test_client, test_config,
};

fn pipeline(server: &MockServer, dir: &TempDir, options: RunOptions) -> Pipeline {
    let mut config = test_config(dir.path());
    config.app.site = server.uri();
    Pipeline::with_client(config, test_client(1), options)
}

async fn mount_images(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/"))
        .respond_with(image_response())
        .mount(server)
        .await;
}

fn chapters(summary: &RunSummary) -> Vec<String> {
    summary
        .chapters
        .iter()
        .map(|c| c.metadata.chapter_id.clone())
        .collect()
}

#[cfg(test)]
mod run_chapter_tests {
    use super::*;

    #[tokio::test]
    async fn test_single_chapter_into_library_layout() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            &chapter_path("foo", "2-7"),
            chapter_html("Foo Volume 2 Chapter 7", &["/img/a.png", "b.jpg"], "", ""),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/img/a.png"))
            .respond_with(image_response())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/manga/foo/chapter/b.jpg"))
            .respond_with(image_response())
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&server, &dir, RunOptions::default());
        let summary = pipeline
            .run_chapter(&chapter_url(&server, "foo", "2-7"))
            .await
            .unwrap();

        let chapter_dir = dir.path().join("foo").join("Volume 02").join("Chapter 7");
        assert_eq!(summary.chapters[0].output_dir, chapter_dir);
        assert_eq!(summary.pages_saved(), 2);
        assert_eq!(std::fs::read(chapter_dir.join("001.png")).unwrap(), PNG_BYTES);
        assert!(chapter_dir.join("002.jpg").exists());

        // A second run finds both pages on disk and makes no image requests.
        let again = pipeline
            .run_chapter(&chapter_url(&server, "foo", "2-7"))
            .await
            .unwrap();
        assert_eq!(again.pages_saved(), 0);
        assert_eq!(again.pages_skipped(), 2);
    }

    #[tokio::test]
    async fn test_page_without_images_fails_with_diagnostic() {
        let server = MockServer::start().await;
        let body = format!(
            "<html><head><title>Access denied</title></head><body>{}</body></html>",
            "x".repeat(500)
        );
        mount_html(&server, &chapter_path("foo", "1-1"), body).await;

        let dir = TempDir::new().unwrap();
        let result = pipeline(&server, &dir, RunOptions::default())
            .run_chapter(&chapter_url(&server, "foo", "1-1"))
            .await;

        match result {
            Err(Error::ExtractionEmpty { title, snippet, .. }) => {
                assert_eq!(title, "Access denied");
                assert_eq!(snippet.chars().count(), 200);
                assert!(snippet.starts_with("<html>"));
            }
            other => panic!("expected ExtractionEmpty, got {:?}", other.map(|s| s.chapters.len())),
        }
    }

    #[tokio::test]
    async fn test_dry_run_lists_without_downloading() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            &chapter_path("foo", "1-1"),
            chapter_html("Foo", &["/img/1.jpg", "/img/2.jpg"], "", ""),
        )
        .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/img/"))
            .respond_with(image_response())
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let options = RunOptionsBuilder::default().dry_run(true).build().unwrap();
        let summary = pipeline(&server, &dir, options)
            .run_chapter(&chapter_url(&server, "foo", "1-1"))
            .await
            .unwrap();

        let report = &summary.chapters[0];
        assert!(report.dry_run);
        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.pages[1].url, format!("{}/img/2.jpg", server.uri()));
        assert!(!dir.path().join("foo").exists());
    }

    #[tokio::test]
    async fn test_out_dir_override() {
        let server = MockServer::start().await;
        mount_html(&server, &chapter_path("foo", "1-1"), plain_chapter("Foo")).await;
        mount_images(&server).await;

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("custom");
        let options = RunOptionsBuilder::default()
            .out_dir(out.clone())
            .build()
            .unwrap();
        pipeline(&server, &dir, options)
            .run_chapter(&chapter_url(&server, "foo", "1-1"))
            .await
            .unwrap();

        assert!(out.join("001.jpg").exists());
    }

    #[tokio::test]
    async fn test_auto_next_increments_minor() {
        let server = MockServer::start().await;
        for id in ["4-1", "4-2", "4-3"] {
            mount_html(&server, &chapter_path("foo", id), plain_chapter("Foo")).await;
        }
        mount_images(&server).await;

        let dir = TempDir::new().unwrap();
        let options = RunOptionsBuilder::default().auto_next(2usize).build().unwrap();
        let summary = pipeline(&server, &dir, options)
            .run_chapter(&chapter_url(&server, "foo", "4-1"))
            .await
            .unwrap();

        assert_eq!(chapters(&summary), vec!["4-1", "4-2", "4-3"]);
        assert!(dir.path().join("foo/Volume 04/Chapter 3/001.jpg").exists());
    }

    #[tokio::test]
    async fn test_auto_next_halts_on_failure() {
        let server = MockServer::start().await;
        mount_html(&server, &chapter_path("foo", "4-1"), plain_chapter("Foo")).await;
        mount_status(&server, &chapter_path("foo", "4-2"), 404).await;
        Mock::given(method("GET"))
            .and(path(chapter_path("foo", "4-3")))
            .respond_with(html_response(plain_chapter("Foo")))
            .expect(0)
            .mount(&server)
            .await;
        mount_images(&server).await;

        let dir = TempDir::new().unwrap();
        let options = RunOptionsBuilder::default().auto_next(2usize).build().unwrap();
        let result = pipeline(&server, &dir, options)
            .run_chapter(&chapter_url(&server, "foo", "4-1"))
            .await;
        assert!(matches!(result, Err(Error::BadStatus { status: 404, .. })));
    }
}

#[cfg(test)]
mod run_title_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_slug_processes_index_in_order() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/manga/foo",
            r#"<a href="/manga/foo/chapter/1-2">2</a><a href="/manga/foo/chapter/1-1">1</a>"#,
        )
        .await;
        mount_html(&server, &chapter_path("foo", "1-1"), plain_chapter("Foo")).await;
        mount_html(&server, &chapter_path("foo", "1-2"), plain_chapter("Foo")).await;
        mount_images(&server).await;

        let dir = TempDir::new().unwrap();
        let summary = pipeline(&server, &dir, RunOptions::default())
            .run_slug("foo")
            .await
            .unwrap();
        assert_eq!(chapters(&summary), vec!["1-1", "1-2"]);
        assert_eq!(summary.pages_saved(), 2);
    }

    #[tokio::test]
    async fn test_run_all_crawls_past_the_index() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/manga/foo",
            r#"<a href="/manga/foo/chapter/1-1">1</a><a href="/manga/foo/chapter/1-2">2</a>"#,
        )
        .await;
        let with_next = |next: &str| {
            chapter_html(
                "Foo",
                &["/img/1.jpg"],
                &format!(r#"<link rel="next" href="{}">"#, next),
                "",
            )
        };
        Mock::given(method("GET"))
            .and(path(chapter_path("foo", "1-1")))
            .respond_with(html_response(with_next("1-2")))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(chapter_path("foo", "1-2")))
            .respond_with(html_response(with_next("1-3")))
            .expect(2)
            .mount(&server)
            .await;
        mount_html(&server, &chapter_path("foo", "1-3"), plain_chapter("Foo")).await;
        mount_status(&server, &chapter_path("foo", "1-4"), 404).await;
        mount_status(&server, &chapter_path("foo", "2-1"), 404).await;
        mount_images(&server).await;

        let dir = TempDir::new().unwrap();
        let start = chapter_url(&server, "foo", "1-2");
        let summary = pipeline(&server, &dir, RunOptions::default())
            .run_all(&start)
            .await
            .unwrap();

        assert_eq!(chapters(&summary), vec!["1-1", "1-2", "1-3"]);
        assert_eq!(summary.termination, Some(Termination::NoNextChapter));
        assert!(dir.path().join("foo/Volume 01/Chapter 3/001.jpg").exists());
    }
}
