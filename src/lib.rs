//! # Renzoku - Chapter crawler and resumable page downloader
//!
//! Renzoku retrieves serialized manga chapters from a single site. It works
//! out which chapters belong to a title, extracts the ordered page images of
//! each chapter page, and downloads them to a local library with bounded
//! concurrency, per-page retry and resume.
//!
//! ## Features
//!
//! - **Bulk Enumeration**: Scrape a title's chapter index into an ordered chapter list
//! - **Link Following**: Walk "next chapter" links with a numeric-probe fallback
//! - **Concurrent Downloads**: Bounded worker pool with per-page retry and backoff
//! - **Resume**: Pages already on disk are never fetched twice
//! - **Typed Failures**: One error enum, with transient failures retried internally
//!
//! ## Quick Start
//!
//! ### Downloading a Chapter
//!
//! ```rust,no_run
//! use renzoku::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> renzoku::Result<()> {
//!     let config = Config::load_or_default(None)?;
//!     let pipeline = Pipeline::new(config, RunOptions::default())?;
//!
//!     let start = ChapterUrl::parse("https://mangapoisk.io/manga/foo/chapter/1-1")?;
//!     let summary = pipeline.run_chapter(&start).await?;
//!     println!("{} pages saved", summary.pages_saved());
//!     Ok(())
//! }
//! ```
//!
//! ### Walking a Title
//!
//! ```rust,no_run
//! use renzoku::prelude::*;
//!
//! # async fn example() -> renzoku::Result<()> {
//! let resolver = ChapterResolver::new(HttpClient::new()?);
//! let start = ChapterUrl::parse("https://mangapoisk.io/manga/foo/chapter/1-1")?;
//!
//! for chapter in resolver.walk(start).await? {
//!     println!("{}", chapter);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`net`]: Fetch client with retry and backoff, HTML helpers
//! - [`extract`]: Page and metadata extraction from chapter HTML
//! - [`resolver`]: Chapter enumeration and the link-following crawl
//! - [`download`]: Concurrent, resumable page downloads
//! - [`pipeline`]: Run modes driving chapters through extraction and download
//! - [`audit`]: Online versus local chapter comparison
//! - [`config`]: YAML configuration
//! - [`types`]: Chapter identifiers, URLs and page items
//! - [`error`]: Error handling

pub mod audit;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod net;
pub mod pipeline;
pub mod resolver;
pub mod types;

#[cfg(feature = "cli")]
pub mod logging;

/// Prelude module for convenient imports.
///
/// ```rust
/// use renzoku::prelude::*;
///
/// let id: ChapterId = "16-5".parse().unwrap();
/// assert_eq!(id.major(), 16);
/// ```
pub mod prelude {
    pub use crate::{
        config::Config,
        download::{Downloader, sanitize_filename},
        error::{Error, Result},
        extract::{extract_metadata, extract_pages},
        net::{HttpClient, RetryPolicy},
        pipeline::{Pipeline, RunOptions, RunOptionsBuilder, RunSummary},
        resolver::{ChapterResolver, Crawl, Termination},
        types::{ChapterId, ChapterMetadata, ChapterUrl, PageItem},
    };
}

// Re-export main types at crate root for direct access
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunOptions};
pub use resolver::ChapterResolver;
pub use types::{ChapterId, ChapterUrl, PageItem};
