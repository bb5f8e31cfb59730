//! Concurrent, resumable page downloads for one chapter.
//!
//! A [`Downloader`] runs a bounded pool of workers over a chapter's page
//! list. Each worker derives a deterministic file name from the page index,
//! skips pages already on disk, and otherwise streams the image to disk with
//! its own retry budget. Files on disk are the only record of progress: an
//! existing non-empty file is a finished page.
//!
//! # Examples
//!
//! ```rust,no_run
//! use renzoku::download::Downloader;
//! use renzoku::net::HttpClient;
//! use renzoku::types::PageItem;
//! use std::path::Path;
//!
//! # async fn example() -> renzoku::Result<()> {
//! let downloader = Downloader::new(HttpClient::new()?).with_concurrency(4);
//! let pages = vec![PageItem::new(1, "https://example.com/p/1.jpg")];
//!
//! let outcomes = downloader
//!     .download_all(
//!         &pages,
//!         Path::new("./Downloads/foo/Volume 01/Chapter 1"),
//!         "https://example.com/manga/foo/chapter/1-1",
//!     )
//!     .await?;
//! println!("{} pages done", outcomes.len());
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::net::{HttpClient, RetryPolicy};
use crate::types::PageItem;

/// Default number of parallel page downloads.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Image extensions kept from the source URL; anything else is saved as `.jpg`.
pub const RECOGNIZED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

const MIN_PAD_WIDTH: usize = 3;

/// What happened to one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// Downloaded and written during this run
    Saved,
    /// A non-empty file was already present
    Skipped,
}

/// Per-page result of a successful chapter download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub index: u32,
    pub file_name: String,
    pub status: PageStatus,
}

/// Bounded worker pool downloading the pages of one chapter.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: HttpClient,
    retry: RetryPolicy,
    concurrency: usize,
    overwrite: bool,
}

impl Downloader {
    /// Creates a downloader with 6 workers and 4 attempts per page.
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            retry: RetryPolicy::download_default(),
            concurrency: DEFAULT_CONCURRENCY,
            overwrite: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the number of workers; zero is raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Re-downloads pages even when a non-empty file already exists.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Downloads every page into `output_dir`, sending `referer` with each request.
    ///
    /// All pages are attempted: a page that exhausts its retries does not
    /// cancel the others. Once the pool has drained, the first failure (in
    /// completion order) is returned; otherwise the outcomes sorted by index.
    ///
    /// # Errors
    ///
    /// - [`Error::Filesystem`] if `output_dir` cannot be created
    /// - the last error of the first page that exhausted its retry budget
    pub async fn download_all(
        &self,
        items: &[PageItem],
        output_dir: &Path,
        referer: &str,
    ) -> Result<Vec<DownloadOutcome>> {
        ensure_dir(output_dir).await?;

        let total = items.len();
        let results: Vec<Result<DownloadOutcome>> = stream::iter(
            items
                .iter()
                .map(|item| self.download_page(item, total, output_dir, referer)),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut outcomes = Vec::with_capacity(total);
        let mut first_error = None;
        let mut failed = 0;
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            error!(failed, total, dir = %output_dir.display(), "chapter download incomplete");
            return Err(e);
        }

        outcomes.sort_by_key(|o| o.index);
        Ok(outcomes)
    }

    async fn download_page(
        &self,
        item: &PageItem,
        total: usize,
        output_dir: &Path,
        referer: &str,
    ) -> Result<DownloadOutcome> {
        let file_name = page_filename(item.index, total, &item.url);
        let path = output_dir.join(&file_name);

        if let Err(e) = fs::create_dir_all(output_dir).await {
            warn!(dir = %output_dir.display(), error = %e, "mkdir failed");
        }

        if !self.overwrite && is_complete(&path).await {
            debug!(file = %file_name, "skip existing");
            return Ok(DownloadOutcome {
                index: item.index,
                file_name,
                status: PageStatus::Skipped,
            });
        }

        info!(url = %item.url, page = item.index, "downloading");
        let client = &self.client;
        let target = path.as_path();
        let bytes = self
            .retry
            .run("download", move |attempt| {
                debug!(page = item.index, attempt, "download attempt");
                download_file(client, &item.url, referer, target)
            })
            .await?;

        info!(file = %file_name, bytes, "saved");
        Ok(DownloadOutcome {
            index: item.index,
            file_name,
            status: PageStatus::Saved,
        })
    }
}

/// Downloads a single image to `output_path` in one attempt.
///
/// The response must have a success status and an `image/*` content type.
/// The body is streamed to `<output_path>.part` and renamed into place once
/// complete, so an interrupted transfer never leaves a non-empty file at
/// `output_path`.
///
/// # Returns
///
/// The number of bytes written.
pub async fn download_file(
    client: &HttpClient,
    url: &str,
    referer: &str,
    output_path: &Path,
) -> Result<u64> {
    let response = client.send(url, Some(referer)).await?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.to_ascii_lowercase().contains("image") {
        return Err(Error::content_mismatch(url, content_type));
    }

    let partial = part_path(output_path);
    let written = match write_stream(response, &partial).await {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }
    };

    fs::rename(&partial, output_path)
        .await
        .map_err(|e| Error::filesystem(output_path, e))?;
    Ok(written)
}

async fn write_stream(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| Error::filesystem(path, e))?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk: Bytes = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::filesystem(path, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| Error::filesystem(path, e))?;
    Ok(written)
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

async fn is_complete(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Creates a directory tree, retrying once after a logged failure.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    if let Err(first) = fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %first, "mkdir failed, retrying once");
        fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::filesystem(dir, e))?;
    }
    Ok(())
}

/// Zero-padded file name of a page.
///
/// The width is the number of digits of `total`, at least 3. The extension
/// comes from the URL when it is one of [`RECOGNIZED_EXTENSIONS`], else `.jpg`.
///
/// # Examples
///
/// ```rust
/// use renzoku::download::page_filename;
///
/// assert_eq!(page_filename(7, 20, "https://example.com/p/7.png"), "007.png");
/// assert_eq!(page_filename(7, 1200, "https://example.com/p/7"), "0007.jpg");
/// ```
pub fn page_filename(index: u32, total: usize, url: &str) -> String {
    let width = pad_width(total);
    format!("{:0width$}.{}", index, page_extension(url), width = width)
}

fn pad_width(total: usize) -> usize {
    total.to_string().len().max(MIN_PAD_WIDTH)
}

fn page_extension(url: &str) -> &'static str {
    extract_extension(url)
        .and_then(|ext| {
            RECOGNIZED_EXTENSIONS
                .iter()
                .copied()
                .find(|known| *known == ext)
        })
        .unwrap_or("jpg")
}

/// Sanitizes a path component by replacing invalid characters.
///
/// # Examples
///
/// ```rust
/// use renzoku::download::sanitize_filename;
///
/// let clean = sanitize_filename("Chapter: 1 - The Beginning!");
/// assert_eq!(clean, "Chapter_ 1 - The Beginning!");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    let mut sanitized: String = name
        .chars()
        .map(|c| if invalid_chars.contains(&c) { '_' } else { c })
        .collect();

    sanitized = sanitized.trim().to_string();
    if sanitized.len() > 200 {
        let mut end = 200;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized.truncate(end);
    }

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        sanitized = "untitled".to_string();
    }

    sanitized
}

/// Extracts the lowercase file extension from a URL, ignoring query and fragment.
///
/// # Examples
///
/// ```rust
/// use renzoku::download::extract_extension;
///
/// assert_eq!(extract_extension("https://example.com/image.jpg"), Some("jpg".to_string()));
/// assert_eq!(extract_extension("https://example.com/image.PNG?v=123"), Some("png".to_string()));
/// assert_eq!(extract_extension("https://example.com/image"), None);
/// ```
pub fn extract_extension(url: &str) -> Option<String> {
    let clean_url = url.split(['?', '#']).next()?;
    let file = clean_url.rsplit('/').next()?;

    let (_, ext) = file.rsplit_once('.')?;
    if !ext.is_empty() && ext.len() <= 10 {
        return Some(ext.to_lowercase());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_filename_width() {
        assert_eq!(page_filename(1, 0, "a.jpg"), "001.jpg");
        assert_eq!(page_filename(1, 9, "a.jpg"), "001.jpg");
        assert_eq!(page_filename(12, 999, "a.jpg"), "012.jpg");
        assert_eq!(page_filename(12, 1000, "a.jpg"), "0012.jpg");
        assert_eq!(page_filename(12345, 10, "a.jpg"), "12345.jpg");
    }

    #[test]
    fn test_page_extension() {
        assert_eq!(page_extension("https://x/1.JPEG"), "jpeg");
        assert_eq!(page_extension("https://x/1.webp?token=abc"), "webp");
        assert_eq!(page_extension("https://x/1.png#frag"), "png");
        assert_eq!(page_extension("https://x/1.gif"), "jpg");
        assert_eq!(page_extension("https://x/image"), "jpg");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("normal_file.txt"), "normal_file.txt");
        assert_eq!(
            sanitize_filename("file/with\\bad:chars"),
            "file_with_bad_chars"
        );
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(sanitize_filename(".."), "untitled");

        let long_name = "я".repeat(150);
        let sanitized = sanitize_filename(&long_name);
        assert!(sanitized.len() <= 200);
    }

    #[test]
    fn test_extract_extension() {
        assert_eq!(
            extract_extension("https://example.com/path.with.dots.jpg"),
            Some("jpg".to_string())
        );
        assert_eq!(extract_extension("https://example.com/image."), None);
        assert_eq!(extract_extension("https://example.com/"), None);
        assert_eq!(extract_extension(""), None);
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/out/001.jpg")),
            PathBuf::from("/tmp/out/001.jpg.part")
        );
    }
}
