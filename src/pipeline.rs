//! Run orchestration.
//!
//! A [`Pipeline`] drives chapters one at a time through extraction and the
//! [`Downloader`], asking the [`ChapterResolver`] what comes next. Chapters
//! are strictly sequential: a chapter's download pool drains completely before
//! the next chapter page is fetched. The first chapter failure halts the run.
//!
//! # Run modes
//!
//! - [`run_chapter`](Pipeline::run_chapter): one chapter, then
//!   [`RunOptions::auto_next`] more by incrementing the minor part
//! - [`run_slug`](Pipeline::run_slug): every chapter of the title index
//! - [`run_all`](Pipeline::run_all): the title index, then a link-following
//!   crawl from the first chapter to pick up anything the index missed
//!
//! # Examples
//!
//! ```rust,no_run
//! use renzoku::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> renzoku::Result<()> {
//!     let options = RunOptionsBuilder::default()
//!         .dry_run(true)
//!         .build()
//!         .expect("all options have defaults");
//!     let pipeline = Pipeline::new(Config::default(), options)?;
//!
//!     let start = ChapterUrl::parse("https://example.com/manga/foo/chapter/1-1")?;
//!     let summary = pipeline.run_chapter(&start).await?;
//!     println!("{} chapters", summary.chapters_processed());
//!     Ok(())
//! }
//! ```

use derive_builder::Builder;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::download::{Downloader, PageStatus, sanitize_filename};
use crate::error::{Error, Result};
use crate::extract::{extract_metadata, extract_pages, normalize_pages};
use crate::net::{HttpClient, html};
use crate::resolver::{ChapterResolver, Crawl, Termination, VisitedSet};
use crate::types::{ChapterMetadata, ChapterUrl, PageItem};

/// Characters of page HTML kept in an extraction failure.
pub const SNIPPET_CHARS: usize = 200;

/// Switches of a run.
///
/// ```rust
/// use renzoku::pipeline::RunOptionsBuilder;
///
/// let options = RunOptionsBuilder::default()
///     .force(true)
///     .auto_next(3usize)
///     .out_dir("/tmp/out")
///     .build()
///     .unwrap();
/// assert!(options.force);
/// assert!(!options.dry_run);
/// ```
#[derive(Debug, Clone, Default, Builder)]
#[builder(setter(into), default)]
pub struct RunOptions {
    /// List pages without downloading
    pub dry_run: bool,
    /// Re-download pages that already exist
    pub force: bool,
    /// Write every chapter here instead of the derived library path
    #[builder(setter(into, strip_option))]
    pub out_dir: Option<PathBuf>,
    /// Chapters to follow after the first one in [`Pipeline::run_chapter`]
    pub auto_next: usize,
}

/// What was done for one chapter.
#[derive(Debug, Clone)]
pub struct ChapterReport {
    pub url: ChapterUrl,
    pub metadata: ChapterMetadata,
    pub output_dir: PathBuf,
    /// Page list with absolute URLs
    pub pages: Vec<PageItem>,
    pub saved: usize,
    pub skipped: usize,
    pub dry_run: bool,
}

/// Totals of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub chapters: Vec<ChapterReport>,
    /// Why the link-following crawl stopped, in [`Pipeline::run_all`]
    pub termination: Option<Termination>,
}

impl RunSummary {
    pub fn chapters_processed(&self) -> usize {
        self.chapters.len()
    }

    pub fn pages_saved(&self) -> usize {
        self.chapters.iter().map(|c| c.saved).sum()
    }

    pub fn pages_skipped(&self) -> usize {
        self.chapters.iter().map(|c| c.skipped).sum()
    }
}

/// A processed chapter together with the page HTML, which the crawl reuses
/// for next-link discovery.
#[derive(Debug, Clone)]
pub struct ChapterRun {
    pub report: ChapterReport,
    pub html: String,
}

/// Drives whole runs over one HTTP session.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    client: HttpClient,
    resolver: ChapterResolver,
    downloader: Downloader,
    options: RunOptions,
}

impl Pipeline {
    /// Builds the HTTP session from `config`.
    pub fn new(config: Config, options: RunOptions) -> Result<Self> {
        let client = HttpClient::from_config(&config)?;
        Ok(Self::with_client(config, client, options))
    }

    /// Uses an existing session; the downloader takes its retry budget and
    /// worker count from `config`.
    pub fn with_client(config: Config, client: HttpClient, options: RunOptions) -> Self {
        let downloader = Downloader::new(client.clone())
            .with_retry(config.download.retry.policy())
            .with_concurrency(config.app.concurrency)
            .with_overwrite(options.force);
        Self {
            resolver: ChapterResolver::new(client.clone()),
            config,
            client,
            downloader,
            options,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn resolver(&self) -> &ChapterResolver {
        &self.resolver
    }

    /// `<downloads>/<slug>/<volume_prefix><NN>/<chapter_prefix><label>`
    pub fn library_dir(&self, metadata: &ChapterMetadata) -> PathBuf {
        let layout = &self.config.layout;
        self.config
            .app
            .downloads_dir
            .join(sanitize_filename(&metadata.slug))
            .join(sanitize_filename(&format!(
                "{}{}",
                layout.volume_prefix, metadata.volume_label
            )))
            .join(sanitize_filename(&format!(
                "{}{}",
                layout.chapter_prefix, metadata.chapter_label
            )))
    }

    /// Fetches one chapter page, extracts its pages and downloads them.
    ///
    /// # Errors
    ///
    /// - [`Error::ExtractionEmpty`] when the page has no page images
    /// - fetch and download failures once their retry budgets are spent
    pub async fn process_chapter(&self, url: &ChapterUrl) -> Result<ChapterRun> {
        info!(%url, "fetching chapter");
        let body = self.client.get_text(url.as_str(), None).await?;
        debug!(%url, length = body.len(), "chapter page loaded");

        let pages = extract_pages(&body);
        if pages.is_empty() {
            let title = html::title(&html::parse(&body)).unwrap_or_default();
            let snippet = html::snippet(&body, SNIPPET_CHARS);
            error!(%url, %title, ?snippet, "no page images found");
            return Err(Error::ExtractionEmpty {
                url: url.to_string(),
                title,
                snippet,
            });
        }

        let pages = normalize_pages(url, pages);
        info!(count = pages.len(), "pages found");
        for page in pages.iter().take(5) {
            debug!(index = page.index, url = %page.url, "page");
        }

        let metadata = extract_metadata(&body, url);
        let output_dir = match &self.options.out_dir {
            Some(dir) => dir.clone(),
            None => self.library_dir(&metadata),
        };

        let mut report = ChapterReport {
            url: url.clone(),
            metadata,
            output_dir,
            pages,
            saved: 0,
            skipped: 0,
            dry_run: self.options.dry_run,
        };

        if !self.options.dry_run {
            let outcomes = self
                .downloader
                .download_all(&report.pages, &report.output_dir, url.as_str())
                .await?;
            report.saved = outcomes
                .iter()
                .filter(|o| o.status == PageStatus::Saved)
                .count();
            report.skipped = outcomes.len() - report.saved;
            info!(
                dir = %report.output_dir.display(),
                saved = report.saved,
                skipped = report.skipped,
                "chapter done"
            );
        }

        Ok(ChapterRun { report, html: body })
    }

    /// Processes `start`, then [`RunOptions::auto_next`] following chapters
    /// by incrementing the minor part of its identifier.
    ///
    /// Following stops early when the identifier is missing or is a decimal
    /// sub-chapter.
    pub async fn run_chapter(&self, start: &ChapterUrl) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        summary.chapters.push(self.process_chapter(start).await?.report);

        if self.options.auto_next == 0 {
            return Ok(summary);
        }
        let Some(mut current) = start.chapter_id() else {
            warn!(url = %start, "no chapter identifier, not following");
            return Ok(summary);
        };

        for _ in 0..self.options.auto_next {
            let Some(next) = current.next_minor() else {
                warn!(chapter = %current, "sub-chapter identifiers cannot be incremented");
                break;
            };
            let Some(url) = start.with_chapter(&next) else {
                break;
            };
            info!(%url, "auto-next");
            summary.chapters.push(self.process_chapter(&url).await?.report);
            current = next;
        }
        Ok(summary)
    }

    /// Processes every chapter listed on the index page of `slug` on the
    /// configured site.
    pub async fn run_slug(&self, slug: &str) -> Result<RunSummary> {
        let chapters = self.resolver.enumerate(&self.config.app.site, slug).await?;
        if chapters.is_empty() {
            warn!(slug, "no chapters listed");
        }

        let mut summary = RunSummary::default();
        let mut visited = VisitedSet::new();
        for url in chapters {
            if visited.insert(url.clone()) {
                summary.chapters.push(self.process_chapter(&url).await?.report);
            }
        }
        Ok(summary)
    }

    /// Processes the whole title of `start`.
    ///
    /// Every chapter of the title index is processed first. A link-following
    /// crawl then starts at the first listed chapter (or `start` when the
    /// index lists none); chapters processed by the first pass are fetched
    /// again only to find their next link.
    pub async fn run_all(&self, start: &ChapterUrl) -> Result<RunSummary> {
        let mut index = start.title_url().url().clone();
        index.set_query(Some("tab=chapters"));
        let chapters = self.resolver.enumerate_index(&index).await?;

        let mut summary = RunSummary::default();
        let mut visited = VisitedSet::new();
        for url in &chapters {
            if visited.insert(url.clone()) {
                summary.chapters.push(self.process_chapter(url).await?.report);
            }
        }

        let first = chapters.first().cloned().unwrap_or_else(|| start.clone());
        let mut crawl = Crawl::new(first).with_visited(visited);
        while let Some(visit) = crawl.position() {
            let body = if visit.first_visit {
                let run = self.process_chapter(&visit.url).await?;
                summary.chapters.push(run.report);
                run.html
            } else {
                match self.client.get_text(visit.url.as_str(), None).await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(url = %visit.url, error = %e, "navigation fetch failed");
                        crawl.terminate(Termination::FetchFailed(visit.url));
                        break;
                    }
                }
            };
            crawl.advance(&self.resolver, &body).await;
        }

        summary.termination = crawl.termination().cloned();
        info!(
            chapters = summary.chapters_processed(),
            saved = summary.pages_saved(),
            skipped = summary.pages_skipped(),
            "title done"
        );
        Ok(summary)
    }
}
