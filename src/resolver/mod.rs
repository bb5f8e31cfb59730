//! Chapter resolution.
//!
//! Two ways of deciding which chapters to process:
//!
//! - **Bulk enumeration** ([`ChapterResolver::enumerate`]): scrape the title's
//!   chapter index once and return every chapter, deduplicated and ordered by
//!   [`ChapterId`].
//! - **Link following** ([`Crawl`] driven by [`ChapterResolver::next_chapter`]):
//!   walk from a starting chapter using the [`heuristics`], falling back to a
//!   numeric probe of the neighbouring identifiers.
//!
//! # Examples
//!
//! ```rust,no_run
//! use renzoku::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> renzoku::Result<()> {
//!     let resolver = ChapterResolver::new(HttpClient::new()?);
//!     let chapters = resolver.enumerate("https://example.com", "foo").await?;
//!     for chapter in &chapters {
//!         println!("{}", chapter);
//!     }
//!     Ok(())
//! }
//! ```

pub mod crawl;
pub mod heuristics;

pub use crawl::{Crawl, CrawlState, DEFAULT_MAX_STEPS, Termination, Visit, VisitedSet};
pub use heuristics::{NEXT_LINK_STRATEGIES, NextLinkStrategy, find_next_link};

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info};
use url::Url;

use crate::error::Result;
use crate::extract::extract_pages;
use crate::net::{HttpClient, html};
use crate::types::{
    CHAPTER_SEGMENT, ChapterId, ChapterUrl, MANGA_SEGMENT, segment_after, title_index_url,
};

static CHAPTER_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/manga/([\w\-]+)/chapter/(\d+-\d+(?:\.\d+)*)").expect("valid regex")
});

/// Resolves chapter sequences for one site session.
#[derive(Debug, Clone)]
pub struct ChapterResolver {
    client: HttpClient,
}

impl ChapterResolver {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Enumerates every chapter of `slug` from `<site>/manga/<slug>?tab=chapters`.
    pub async fn enumerate(&self, site: &str, slug: &str) -> Result<Vec<ChapterUrl>> {
        let index = title_index_url(site, slug)?;
        self.enumerate_index(&index).await
    }

    /// Enumerates the chapters listed on a title index page.
    ///
    /// Chapters are restricted to the slug of `index` when it has one.
    pub async fn enumerate_index(&self, index: &Url) -> Result<Vec<ChapterUrl>> {
        info!(url = %index, "fetching chapter index");
        let body = self.client.get_text(index.as_str(), None).await?;
        let slug = segment_after(index, MANGA_SEGMENT);
        let chapters = collect_chapter_links(&body, index, slug);
        info!(count = chapters.len(), "chapters enumerated");
        Ok(chapters)
    }

    /// Finds the chapter after `current`.
    ///
    /// The link heuristics run first, in priority order; when none matches,
    /// [`probe_numeric`](Self::probe_numeric) guesses the neighbour.
    pub async fn next_chapter(
        &self,
        html_text: &str,
        current: &ChapterUrl,
        upper_bound: Option<&ChapterId>,
    ) -> Option<ChapterUrl> {
        if let Some((url, strategy)) = find_next_link(html_text, current.url()) {
            debug!(%url, strategy, "next link found");
            return Some(url.into());
        }
        self.probe_numeric(current, upper_bound).await
    }

    /// Probes `(major, minor + 1)`, then `(major + 1, 1)`.
    ///
    /// Only plain integer minors are probed; decimal sub-chapters return
    /// `None`. The next-major candidate is skipped when it lies beyond
    /// `upper_bound`.
    pub async fn probe_numeric(
        &self,
        current: &ChapterUrl,
        upper_bound: Option<&ChapterId>,
    ) -> Option<ChapterUrl> {
        let id = current.chapter_id()?;
        let next_minor = id.next_minor()?;

        let candidate = current.with_chapter(&next_minor)?;
        if self.chapter_exists(&candidate).await {
            debug!(url = %candidate, "numeric probe hit");
            return Some(candidate);
        }

        let next_major = id.first_of_next_major()?;
        if upper_bound.is_some_and(|bound| next_major > *bound) {
            debug!(candidate = %next_major, "next volume beyond known chapters");
            return None;
        }
        let candidate = current.with_chapter(&next_major)?;
        if self.chapter_exists(&candidate).await {
            debug!(url = %candidate, "numeric probe hit");
            return Some(candidate);
        }
        None
    }

    /// A chapter exists when its page loads and yields at least one page image.
    pub async fn chapter_exists(&self, url: &ChapterUrl) -> bool {
        match self.client.get_text(url.as_str(), None).await {
            Ok(body) => !extract_pages(&body).is_empty(),
            Err(e) => {
                debug!(%url, error = %e, "probe candidate unavailable");
                false
            }
        }
    }

    /// Follows next links from `start` and returns the chapters reached, in
    /// order. Pages are fetched but not processed.
    pub async fn walk(&self, start: ChapterUrl) -> Result<Vec<ChapterUrl>> {
        let (chapters, _) = self.walk_crawl(Crawl::new(start)).await?;
        Ok(chapters)
    }

    /// Drives `crawl` to termination, fetching each page once per visit.
    ///
    /// Returns the newly visited chapters and the termination reason. A page
    /// that fails to load on its first visit is an error; a seeded page that
    /// fails to re-load ends the crawl.
    pub async fn walk_crawl(&self, mut crawl: Crawl) -> Result<(Vec<ChapterUrl>, Termination)> {
        let mut chapters = Vec::new();
        while let Some(visit) = crawl.position() {
            let body = match self.client.get_text(visit.url.as_str(), None).await {
                Ok(body) => body,
                Err(e) if visit.first_visit => return Err(e),
                Err(e) => {
                    debug!(url = %visit.url, error = %e, "navigation fetch failed");
                    crawl.terminate(Termination::FetchFailed(visit.url));
                    break;
                }
            };
            if visit.first_visit {
                chapters.push(visit.url);
            }
            crawl.advance(self, &body).await;
        }
        let reason = crawl
            .termination()
            .cloned()
            .unwrap_or(Termination::NoNextChapter);
        Ok((chapters, reason))
    }
}

/// Collects the chapter links of a title index page.
///
/// Anchors pointing at `/manga/<slug>/chapter/` are combined with every
/// chapter path found by scanning the raw HTML, which also catches links
/// rendered lazily by scripts. Entries are keyed by [`ChapterId`]; the last
/// URL seen for an identifier wins, and links whose chapter segment is not a
/// well-formed identifier are dropped. The result is in ascending identifier
/// order.
pub fn collect_chapter_links(html_text: &str, base: &Url, slug: Option<&str>) -> Vec<ChapterUrl> {
    let mut chapters: BTreeMap<ChapterId, ChapterUrl> = BTreeMap::new();
    let mut insert = |url: Url| {
        let url = ChapterUrl::from(url);
        match url.chapter_id() {
            Some(id) => {
                chapters.insert(id, url);
            }
            None => debug!(%url, "skipping chapter link without identifier"),
        }
    };

    let marker = slug.map(|slug| format!("/{}/{}/{}/", MANGA_SEGMENT, slug, CHAPTER_SEGMENT));
    let document = html::parse(html_text);
    for href in html::select_all_attr(&document, r#"a[href*="/chapter/"]"#, "href") {
        let Some(url) = html::resolve_url(base, &href) else {
            continue;
        };
        if let Some(marker) = &marker {
            if !url.path().contains(marker.as_str()) {
                continue;
            }
        }
        insert(url);
    }

    for caps in CHAPTER_PATH_RE.captures_iter(html_text) {
        let found_slug = &caps[1];
        if slug.is_some_and(|slug| slug != found_slug) {
            continue;
        }
        let path = format!(
            "/{}/{}/{}/{}",
            MANGA_SEGMENT, found_slug, CHAPTER_SEGMENT, &caps[2]
        );
        if let Some(url) = html::resolve_url(base, &path) {
            insert(url);
        }
    }

    chapters.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/manga/foo?tab=chapters").unwrap()
    }

    fn ids(chapters: &[ChapterUrl]) -> Vec<String> {
        chapters
            .iter()
            .filter_map(|c| c.chapter_segment().map(String::from))
            .collect()
    }

    #[test]
    fn test_collect_merges_anchors_and_raw_paths() {
        let html = r#"
            <ul>
              <li><a href="/manga/foo/chapter/2-1">2-1</a></li>
              <li><a href="https://example.com/manga/foo/chapter/1-1?from=list">1-1</a></li>
            </ul>
            <script>var more = ["/manga/foo/chapter/1-2", "/manga/foo/chapter/1-1"];</script>
        "#;
        let chapters = collect_chapter_links(html, &base(), Some("foo"));
        assert_eq!(ids(&chapters), vec!["1-1", "1-2", "2-1"]);
        // The raw scan runs last, so its query-free URL wins.
        assert_eq!(chapters[0].as_str(), "https://example.com/manga/foo/chapter/1-1");
    }

    #[test]
    fn test_collect_orders_numerically() {
        let html = r#"
            <a href="/manga/foo/chapter/2-10">a</a>
            <a href="/manga/foo/chapter/2-9">b</a>
            <a href="/manga/foo/chapter/2-9.5">c</a>
            <a href="/manga/foo/chapter/10-1">d</a>
        "#;
        let chapters = collect_chapter_links(html, &base(), Some("foo"));
        assert_eq!(ids(&chapters), vec!["2-9", "2-9.5", "2-10", "10-1"]);
    }

    #[test]
    fn test_collect_filters_other_titles() {
        let html = r#"
            <a href="/manga/bar/chapter/1-1">other</a>
            <a href="/manga/foo/chapter/extra">special</a>
            <p>/manga/bar/chapter/3-3</p>
            <p>/manga/foo/chapter/3-3</p>
        "#;
        let chapters = collect_chapter_links(html, &base(), Some("foo"));
        assert_eq!(ids(&chapters), vec!["3-3"]);

        let everything = collect_chapter_links(html, &base(), None);
        assert_eq!(everything.len(), 2);
    }

    #[test]
    fn test_raw_scan_keeps_decimal_identifiers() {
        let html = r#"<div data-list='/manga/foo/chapter/72-1.5,/manga/foo/chapter/72-2'></div>"#;
        let chapters = collect_chapter_links(html, &base(), Some("foo"));
        assert_eq!(ids(&chapters), vec!["72-1.5", "72-2"]);
    }
}
