//! Page extraction from chapter HTML.
//!
//! [`extract_pages`] finds the ordered page images of a chapter page and
//! [`extract_metadata`] derives the slug, volume and chapter labels used to
//! name the output directory. Both are pure functions over the HTML text.
//!
//! # Examples
//!
//! ```rust
//! use renzoku::extract::{extract_metadata, extract_pages};
//! use renzoku::types::ChapterUrl;
//!
//! let html = r#"
//!     <title>Foo Volume 2 Chapter 7</title>
//!     <img class="page-image" data-number="2" src="/p/2.jpg">
//!     <img class="page-image" id="page-1" src="/p/1.jpg">
//! "#;
//!
//! let pages = extract_pages(html);
//! assert_eq!(pages[0].index, 1);
//! assert_eq!(pages[1].url, "/p/2.jpg");
//!
//! let url = ChapterUrl::parse("https://example.com/manga/foo/chapter/2-7").unwrap();
//! let meta = extract_metadata(html, &url);
//! assert_eq!(meta.volume_label, "02");
//! assert_eq!(meta.chapter_label, "7");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use std::collections::BTreeMap;

use crate::net::html;
use crate::types::{ChapterMetadata, ChapterUrl, PageItem};

/// Class marker of page images; matched as a substring of any class.
pub const PAGE_IMAGE_CLASS: &str = "page-image";

/// Volume label used when no volume number is discoverable.
pub const DEFAULT_VOLUME_LABEL: &str = "01";

static PAGE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"page-(\d+)").expect("valid regex"));

static TITLE_VOLUME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:volume|том)\s*(\d+)").expect("valid regex"));

static TITLE_CHAPTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:chapter|глава)\s*([0-9]+(?:\.[0-9]+)*)").expect("valid regex")
});

static URL_CHAPTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)-([0-9][0-9.]*)$").expect("valid regex"));

/// Extracts the ordered page images of a chapter page.
///
/// Page images are `<img>` elements with a class containing `page-image`.
/// The page index comes from `data-number`, else from an `id` of the form
/// `page-<N>`; images without either are dropped. The URL comes from `src`,
/// else `data-src`, else the first URL of `srcset`. When several images claim
/// the same index the one later in the document wins. URLs are returned as
/// written; see [`normalize_pages`].
pub fn extract_pages(html_text: &str) -> Vec<PageItem> {
    let document = html::parse(html_text);
    let mut pages = BTreeMap::new();

    for img in html::select_all(&document, "img[class]") {
        if !is_page_image(&img) {
            continue;
        }
        let (Some(index), Some(url)) = (page_index(&img), page_source(&img)) else {
            continue;
        };
        pages.insert(index, url);
    }

    pages
        .into_iter()
        .map(|(index, url)| PageItem::new(index, url))
        .collect()
}

fn is_page_image(img: &ElementRef) -> bool {
    img.value()
        .classes()
        .any(|class| class.contains(PAGE_IMAGE_CLASS))
}

fn page_index(img: &ElementRef) -> Option<u32> {
    if let Some(number) = html::attr(img, "data-number").and_then(|n| n.parse().ok()) {
        return Some(number);
    }
    let id = html::attr(img, "id")?;
    PAGE_ID_RE.captures(id)?.get(1)?.as_str().parse().ok()
}

fn page_source(img: &ElementRef) -> Option<String> {
    html::attr(img, "src")
        .or_else(|| html::attr(img, "data-src"))
        .or_else(|| html::attr(img, "srcset").and_then(|set| set.split_whitespace().next()))
        .map(String::from)
}

/// Resolves every page URL against the chapter URL.
///
/// Items whose URL cannot be joined are dropped.
pub fn normalize_pages(chapter_url: &ChapterUrl, items: Vec<PageItem>) -> Vec<PageItem> {
    items
        .into_iter()
        .filter_map(|item| {
            let url = html::resolve_url(chapter_url.url(), &item.url)?;
            Some(PageItem::new(item.index, url.as_str()))
        })
        .collect()
}

/// Derives the output naming of a chapter.
///
/// The slug and raw chapter identifier come from the URL segments after
/// `manga` and `chapter`. Volume and chapter numbers are also read from the
/// document title ("Volume N", "Chapter N[.M]", case-insensitive). When the
/// URL identifier has the form `major-minor`, its major fills a missing title
/// volume and its minor always replaces the title chapter number.
pub fn extract_metadata(html_text: &str, chapter_url: &ChapterUrl) -> ChapterMetadata {
    let slug = chapter_url.slug().unwrap_or("manga").to_string();
    let chapter_id = chapter_url.chapter_segment().unwrap_or("chapter").to_string();

    let title = html::title(&html::parse(html_text)).unwrap_or_default();
    let mut volume = TITLE_VOLUME_RE
        .captures(&title)
        .map(|caps| caps[1].to_string());
    let mut chapter = TITLE_CHAPTER_RE
        .captures(&title)
        .map(|caps| caps[1].to_string());

    if let Some(caps) = URL_CHAPTER_RE.captures(&chapter_id) {
        if volume.is_none() {
            volume = Some(caps[1].to_string());
        }
        chapter = Some(caps[2].to_string());
    }

    ChapterMetadata {
        slug,
        volume_label: volume
            .map(|v| pad2(&v))
            .unwrap_or_else(|| DEFAULT_VOLUME_LABEL.to_string()),
        chapter_label: chapter.unwrap_or_else(|| chapter_id.clone()),
        chapter_id,
    }
}

fn pad2(number: &str) -> String {
    match number.parse::<u64>() {
        Ok(n) => format!("{:02}", n),
        Err(_) => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> ChapterUrl {
        ChapterUrl::parse(s).unwrap()
    }

    #[test]
    fn test_index_priority() {
        let html = r#"
            <img class="page-image" data-number="4" id="page-9" src="/a.jpg">
            <img class="page-image" id="page-2" src="/b.jpg">
            <img class="page-image" src="/orphan.jpg">
            <img class="page-image" data-number="x" id="page-3" src="/c.jpg">
        "#;
        let pages = extract_pages(html);
        assert_eq!(
            pages,
            vec![
                PageItem::new(2, "/b.jpg"),
                PageItem::new(3, "/c.jpg"),
                PageItem::new(4, "/a.jpg"),
            ]
        );
    }

    #[test]
    fn test_source_priority() {
        let html = r#"
            <img class="page-image lazy" data-number="1" src="/src.jpg" data-src="/data.jpg">
            <img class="page-image" data-number="2" data-src="/data.jpg" srcset="/set.jpg 1x">
            <img class="page-image" data-number="3" srcset="/set-1.jpg 1x, /set-2.jpg 2x">
            <img class="page-image" data-number="4">
        "#;
        let urls: Vec<_> = extract_pages(html).into_iter().map(|p| p.url).collect();
        assert_eq!(urls, vec!["/src.jpg", "/data.jpg", "/set-1.jpg"]);
    }

    #[test]
    fn test_duplicate_index_last_wins() {
        let html = r#"
            <img class="page-image" data-number="3" src="/first.jpg">
            <img class="page-image" data-number="1" src="/one.jpg">
            <img class="page-image" id="page-3" src="/second.jpg">
        "#;
        let pages = extract_pages(html);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1], PageItem::new(3, "/second.jpg"));
    }

    #[test]
    fn test_ignores_other_images() {
        let html = r#"
            <img class="logo" data-number="1" src="/logo.png">
            <img data-number="2" src="/ad.png">
            <img class="page-image-webp" data-number="3" src="/3.webp">
        "#;
        let pages = extract_pages(html);
        assert_eq!(pages, vec![PageItem::new(3, "/3.webp")]);
    }

    #[test]
    fn test_normalize_pages() {
        let chapter = url("https://example.com/manga/foo/chapter/1-1");
        let pages = normalize_pages(
            &chapter,
            vec![
                PageItem::new(1, "/img/1.jpg"),
                PageItem::new(2, "2.jpg"),
                PageItem::new(3, "https://cdn.example.com/3.jpg"),
            ],
        );
        let urls: Vec<_> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/img/1.jpg",
                "https://example.com/manga/foo/chapter/2.jpg",
                "https://cdn.example.com/3.jpg",
            ]
        );
    }

    #[test]
    fn test_metadata_from_url_only() {
        let meta = extract_metadata(
            "<title>Foo</title>",
            &url("https://example.com/manga/foo/chapter/16-5"),
        );
        assert_eq!(meta.slug, "foo");
        assert_eq!(meta.volume_label, "16");
        assert_eq!(meta.chapter_label, "5");
        assert_eq!(meta.chapter_id, "16-5");
    }

    #[test]
    fn test_metadata_url_minor_beats_title() {
        let meta = extract_metadata(
            "<title>Foo Chapter 999</title>",
            &url("https://example.com/manga/foo/chapter/16-5"),
        );
        assert_eq!(meta.chapter_label, "5");
    }

    #[test]
    fn test_metadata_title_volume_beats_url_major() {
        let meta = extract_metadata(
            "<title>Foo Volume 3 Chapter 5</title>",
            &url("https://example.com/manga/foo/chapter/16-5"),
        );
        assert_eq!(meta.volume_label, "03");
    }

    #[test]
    fn test_metadata_decimal_sub_chapter() {
        let meta = extract_metadata(
            "<title>Foo</title>",
            &url("https://example.com/manga/foo/chapter/72-1.5"),
        );
        assert_eq!(meta.volume_label, "72");
        assert_eq!(meta.chapter_label, "1.5");
    }

    #[test]
    fn test_metadata_fallbacks() {
        let meta = extract_metadata(
            "<title>Том 4 Глава 12.5</title>",
            &url("https://example.com/manga/foo/chapter/special"),
        );
        assert_eq!(meta.volume_label, "04");
        assert_eq!(meta.chapter_label, "12.5");

        let meta = extract_metadata("", &url("https://example.com/manga/foo/chapter/special"));
        assert_eq!(meta.volume_label, DEFAULT_VOLUME_LABEL);
        assert_eq!(meta.chapter_label, "special");

        let meta = extract_metadata("", &url("https://example.com/read"));
        assert_eq!(meta.slug, "manga");
        assert_eq!(meta.chapter_id, "chapter");
    }
}
