//! HTML parsing utilities for chapter and title pages.
//!
//! Thin wrappers over the `scraper` crate for CSS selector-based lookups.
//! Lookups that find nothing return `None` or an empty vector; they never
//! fail.
//!
//! # Examples
//!
//! ```rust
//! use renzoku::net::html;
//!
//! let document = html::parse(r#"
//!     <html><head><title>Foo - Chapter 5</title></head>
//!     <body><a class="next" href="/manga/foo/chapter/1-6">Next</a></body></html>
//! "#);
//!
//! assert_eq!(html::title(&document), Some("Foo - Chapter 5".to_string()));
//! assert_eq!(
//!     html::select_attr(&document, "a.next", "href"),
//!     Some("/manga/foo/chapter/1-6".to_string())
//! );
//! ```

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parses an HTML document from a string.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

/// Extracts trimmed text content from the first element matching a CSS selector.
///
/// Returns `None` if no element matches or the selector is invalid.
pub fn select_text(html: &Html, selector: &str) -> Option<String> {
    Selector::parse(selector).ok().and_then(|sel| {
        html.select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    })
}

/// Extracts an attribute value from the first element matching a CSS selector
/// that carries the attribute.
///
/// # Examples
///
/// ```rust
/// use renzoku::net::html;
///
/// let document = html::parse(r#"<link rel="next" href="/manga/foo/chapter/2-1">"#);
/// let href = html::select_attr(&document, r#"link[rel="next"]"#, "href");
/// assert_eq!(href, Some("/manga/foo/chapter/2-1".to_string()));
/// ```
pub fn select_attr(html: &Html, selector: &str, name: &str) -> Option<String> {
    Selector::parse(selector).ok().and_then(|sel| {
        html.select(&sel)
            .find_map(|el| attr(&el, name).map(String::from))
    })
}

/// Extracts attribute values from all elements matching a CSS selector.
///
/// Elements without the attribute are skipped.
pub fn select_all_attr(html: &Html, selector: &str, attr: &str) -> Vec<String> {
    Selector::parse(selector)
        .ok()
        .map(|sel| {
            html.select(&sel)
                .filter_map(|el| el.value().attr(attr).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Returns every element matching a CSS selector, in document order.
pub fn select_all<'a>(html: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .map(|sel| html.select(&sel).collect())
        .unwrap_or_default()
}

/// The trimmed `<title>` text of a document.
pub fn title(html: &Html) -> Option<String> {
    select_text(html, "title").filter(|t| !t.is_empty())
}

/// Returns the value of an attribute, treating blank values as absent.
pub fn attr<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolves a possibly relative reference against a base URL.
///
/// # Examples
///
/// ```rust
/// use renzoku::net::html::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/manga/foo/chapter/1-1").unwrap();
/// assert_eq!(
///     resolve_url(&base, "/img/001.jpg").unwrap().as_str(),
///     "https://example.com/img/001.jpg"
/// );
/// assert_eq!(
///     resolve_url(&base, "https://cdn.example.com/1.png").unwrap().as_str(),
///     "https://cdn.example.com/1.png"
/// );
/// ```
pub fn resolve_url(base: &Url, reference: &str) -> Option<Url> {
    base.join(reference.trim()).ok()
}

/// The first `max_chars` characters of a document, for diagnostics.
pub fn snippet(html: &str, max_chars: usize) -> String {
    html.chars().take(max_chars).collect()
}
