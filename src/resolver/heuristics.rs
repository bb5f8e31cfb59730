//! Next-chapter link heuristics.
//!
//! Each heuristic is an independent [`NextLinkStrategy`] that inspects a
//! parsed chapter page and returns the raw `href` it believes points at the
//! next chapter. [`NEXT_LINK_STRATEGIES`] lists them in priority order and
//! [`find_next_link`] takes the first hit.

use scraper::{ElementRef, Html};
use url::Url;

use crate::net::html;

/// Anchor text fragments that mean "next" (matched lowercase, as substrings).
pub const NEXT_VOCABULARY: &[&str] = &["next", "следующ", "вперёд", "вперед", "далее"];

/// Fragments of `aria-label` / `title` attributes that mean "next".
const NEXT_LABELS: &[&str] = &["след", "next"];

/// Classes that mark a "next" navigation anchor.
const NEXT_CLASSES: &[&str] = &["next", "next-chapter"];

/// A named heuristic locating the next chapter's `href` on a page.
#[derive(Clone, Copy)]
pub struct NextLinkStrategy {
    pub name: &'static str,
    pub find: fn(&Html) -> Option<String>,
}

impl std::fmt::Debug for NextLinkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextLinkStrategy")
            .field("name", &self.name)
            .finish()
    }
}

/// The heuristics, highest priority first.
pub const NEXT_LINK_STRATEGIES: &[NextLinkStrategy] = &[
    NextLinkStrategy {
        name: "link-rel",
        find: link_rel_next,
    },
    NextLinkStrategy {
        name: "anchor-text",
        find: anchor_text_next,
    },
    NextLinkStrategy {
        name: "anchor-selector",
        find: anchor_selector_next,
    },
    NextLinkStrategy {
        name: "data-nav",
        find: data_nav_next,
    },
    NextLinkStrategy {
        name: "chapter-anchor-class",
        find: chapter_anchor_class_next,
    },
];

/// Runs the heuristics in order and resolves the first usable hit against
/// `page_url`. Returns the target and the name of the heuristic that found it.
pub fn find_next_link(html_text: &str, page_url: &Url) -> Option<(Url, &'static str)> {
    let document = html::parse(html_text);
    NEXT_LINK_STRATEGIES.iter().find_map(|strategy| {
        let href = (strategy.find)(&document)?;
        let target = html::resolve_url(page_url, &href)?;
        Some((target, strategy.name))
    })
}

fn href<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    html::attr(element, "href")
}

/// `<link rel="next" href="...">` in the document head.
pub fn link_rel_next(document: &Html) -> Option<String> {
    html::select_all(document, "link[rel]")
        .into_iter()
        .filter(|link| has_token(link, "rel", "next"))
        .find_map(|link| href(&link).map(String::from))
}

/// An anchor whose visible text contains next-navigation vocabulary.
pub fn anchor_text_next(document: &Html) -> Option<String> {
    html::select_all(document, "a[href]")
        .into_iter()
        .find(|a| {
            let text = a.text().collect::<String>().trim().to_lowercase();
            NEXT_VOCABULARY.iter().any(|word| text.contains(word))
        })
        .and_then(|a| href(&a).map(String::from))
}

/// An anchor with a "next" class, a `rel~=next` token, or a "next" label.
pub fn anchor_selector_next(document: &Html) -> Option<String> {
    html::select_all(document, "a[href]")
        .into_iter()
        .find(|a| {
            let by_class = a
                .value()
                .classes()
                .any(|class| NEXT_CLASSES.contains(&class));
            let by_label = ["aria-label", "title"].iter().any(|name| {
                html::attr(a, name)
                    .map(|label| {
                        let label = label.to_lowercase();
                        NEXT_LABELS.iter().any(|word| label.contains(word))
                    })
                    .unwrap_or(false)
            });
            by_class || has_token(a, "rel", "next") || by_label
        })
        .and_then(|a| href(&a).map(String::from))
}

/// Any element marked `data-nav="next"` that carries an `href`.
pub fn data_nav_next(document: &Html) -> Option<String> {
    html::select_attr(document, r#"[data-nav="next"]"#, "href")
}

/// A chapter anchor whose class list mentions "next".
pub fn chapter_anchor_class_next(document: &Html) -> Option<String> {
    html::select_all(document, r#"a[href*="/chapter/"]"#)
        .into_iter()
        .find(|a| {
            a.value()
                .classes()
                .any(|class| class.to_lowercase().contains("next"))
        })
        .and_then(|a| href(&a).map(String::from))
}

fn has_token(element: &ElementRef, attr: &str, token: &str) -> bool {
    element
        .value()
        .attr(attr)
        .map(|value| {
            value
                .split_whitespace()
                .any(|t| t.eq_ignore_ascii_case(token))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/manga/foo/chapter/1-1").unwrap()
    }

    fn run(strategy: fn(&Html) -> Option<String>, body: &str) -> Option<String> {
        strategy(&html::parse(body))
    }

    #[test]
    fn test_link_rel_next() {
        let body = r#"<head><link rel="prev" href="/p"><link rel="next" href="/n"></head>"#;
        assert_eq!(run(link_rel_next, body), Some("/n".into()));
        assert_eq!(run(link_rel_next, r#"<link rel="next">"#), None);
    }

    #[test]
    fn test_anchor_text_vocabulary() {
        assert_eq!(
            run(anchor_text_next, r#"<a href="/a">Back</a><a href="/b"> Next chapter </a>"#),
            Some("/b".into())
        );
        assert_eq!(
            run(anchor_text_next, r#"<a href="/c">Следующая глава</a>"#),
            Some("/c".into())
        );
        assert_eq!(run(anchor_text_next, r#"<a href="/d">ВПЕРЁД</a>"#), Some("/d".into()));
        assert_eq!(run(anchor_text_next, r#"<a href="/e">Home</a>"#), None);
    }

    #[test]
    fn test_anchor_selector() {
        assert_eq!(
            run(anchor_selector_next, r#"<a class="btn next-chapter" href="/a">→</a>"#),
            Some("/a".into())
        );
        assert_eq!(
            run(anchor_selector_next, r#"<a rel="nofollow next" href="/b">→</a>"#),
            Some("/b".into())
        );
        assert_eq!(
            run(anchor_selector_next, r#"<a aria-label="Следующая" href="/c">→</a>"#),
            Some("/c".into())
        );
        assert_eq!(
            run(anchor_selector_next, r#"<a class="nextish" href="/d">→</a>"#),
            None
        );
    }

    #[test]
    fn test_data_nav() {
        assert_eq!(
            run(data_nav_next, r#"<button data-nav="next">x</button><a data-nav="next" href="/a">→</a>"#),
            Some("/a".into())
        );
        assert_eq!(
            run(data_nav_next, r#"<a data-nav="next" href=" ">x</a><a data-nav="next" href="/b">→</a>"#),
            Some("/b".into())
        );
    }

    #[test]
    fn test_chapter_anchor_class() {
        assert_eq!(
            run(
                chapter_anchor_class_next,
                r#"<a class="nav-prev" href="/manga/foo/chapter/1-0">←</a>
                   <a class="navNextBtn" href="/manga/foo/chapter/1-2">→</a>"#
            ),
            Some("/manga/foo/chapter/1-2".into())
        );
    }

    #[test]
    fn test_priority_prefers_link_rel() {
        let body = r#"
            <head><link rel="next" href="/manga/foo/chapter/1-2"></head>
            <body><a href="/manga/foo/chapter/9-9">Next</a></body>
        "#;
        let (url, name) = find_next_link(body, &page()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/manga/foo/chapter/1-2");
        assert_eq!(name, "link-rel");
    }

    #[test]
    fn test_falls_through_in_order() {
        let body = r#"
            <a data-nav="next" href="/manga/foo/chapter/1-3">→</a>
            <a class="next" href="/manga/foo/chapter/1-2">→</a>
        "#;
        let (url, name) = find_next_link(body, &page()).unwrap();
        assert_eq!(url.path(), "/manga/foo/chapter/1-2");
        assert_eq!(name, "anchor-selector");

        assert!(find_next_link("<p>nothing here</p>", &page()).is_none());
    }
}
