//! Error types and result handling for Renzoku operations.
//!
//! All fallible operations return a [`Result<T>`], a type alias for
//! `std::result::Result<T, Error>`.
//!
//! # Error Categories
//!
//! - **Transient network errors**: connection failures and timeouts
//! - **Bad status**: a non-success HTTP status code
//! - **Content mismatch**: a page download whose body is not an image
//! - **Extraction empty**: a chapter page without any page images
//! - **Filesystem errors**: directory or file creation failures
//! - **Configuration errors**: unreadable or invalid YAML configuration
//!
//! The first three are recovered internally by the retry loops of the fetch
//! client and the downloader; see [`Error::is_retryable`].
//!
//! # Examples
//!
//! ```rust
//! use renzoku::Error;
//!
//! let error = Error::bad_status("https://example.com/manga/foo", 503);
//! assert!(error.is_retryable());
//!
//! let error = Error::parse("chapter identifier without a minor part");
//! assert!(!error.is_retryable());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results with Renzoku errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Renzoku operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors from the HTTP client.
    ///
    /// Connection resets, DNS failures, timeouts and body read failures end
    /// up here. They are retried with backoff.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("HTTP {status} for {url}")]
    BadStatus { url: String, status: u16 },

    /// A page download answered with something that is not an image.
    ///
    /// Usually an HTML error or captcha page served with status 200.
    #[error("Unexpected content type {content_type:?} for {url}")]
    ContentMismatch { url: String, content_type: String },

    /// No page images could be extracted from a chapter page.
    ///
    /// Carries the document title and the beginning of the HTML so the log
    /// shows what the site actually served.
    #[error("No page images found at {url} (title: {title:?}, snippet: {snippet:?})")]
    ExtractionEmpty {
        url: String,
        title: String,
        snippet: String,
    },

    /// Directory or file creation failed for a specific path.
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Other IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cookie seed files and other JSON payloads.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML configuration.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A configuration value failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Data format errors such as malformed chapter identifiers.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic error messages.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Creates a configuration validation error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a bad status error for the given URL.
    pub fn bad_status(url: impl Into<String>, status: u16) -> Self {
        Error::BadStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a content mismatch error for the given URL and content type.
    pub fn content_mismatch(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Error::ContentMismatch {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates a filesystem error bound to a path.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use renzoku::Error;
    /// use std::io;
    ///
    /// let error = Error::filesystem("/tmp/out", io::Error::from(io::ErrorKind::PermissionDenied));
    /// assert!(error.to_string().contains("/tmp/out"));
    /// ```
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if a retry loop should try again after this error.
    ///
    /// Transport failures, bad statuses, content mismatches and filesystem
    /// failures during a transfer are retried. Everything else is a
    /// programming or configuration problem that another attempt cannot fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => !e.is_builder(),
            Error::BadStatus { .. }
            | Error::ContentMismatch { .. }
            | Error::Filesystem { .. }
            | Error::Io(_) => true,
            _ => false,
        }
    }
}
