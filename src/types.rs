//! Core data types for chapters, chapter URLs and page items.
//!
//! - [`ChapterId`] - `major-minor[.minor...]` identifier with numeric ordering
//! - [`ChapterUrl`] - absolute chapter page URL with path-segment accessors
//! - [`PageItem`] - one page image of a chapter
//! - [`ChapterMetadata`] - naming information for the output directory
//!
//! # Examples
//!
//! ```rust
//! use renzoku::types::{ChapterId, ChapterUrl};
//!
//! let a: ChapterId = "2-9".parse().unwrap();
//! let b: ChapterId = "2-10".parse().unwrap();
//! assert!(a < b);
//!
//! let url = ChapterUrl::parse("https://example.com/manga/foo/chapter/2-9").unwrap();
//! assert_eq!(url.slug(), Some("foo"));
//! assert_eq!(url.chapter_id(), Some(a));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use url::Url;

use crate::error::{Error, Result};

static CHAPTER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)-(\d+(?:\.\d+)*)$").expect("valid chapter id regex"));

/// Path marker preceding the title slug.
pub const MANGA_SEGMENT: &str = "manga";

/// Path marker preceding the chapter identifier.
pub const CHAPTER_SEGMENT: &str = "chapter";

/// A chapter identifier of the form `major-minor[.minor...]`.
///
/// `16-5` is major 16, minor `[5]`; `72-1.5` is major 72, minor `[1, 5]`
/// (a decimal sub-chapter). Identifiers compare numerically: major first,
/// then the minor components in order, with a shorter minor sorting first
/// when it is a prefix of the other (`3-1 < 3-1.5`).
///
/// The original text is kept so that formatting reproduces it exactly.
#[derive(Debug, Clone)]
pub struct ChapterId {
    major: u64,
    minor: Vec<u64>,
    raw: String,
}

impl ChapterId {
    /// Builds an identifier from its numeric parts.
    ///
    /// # Panics
    ///
    /// Panics if `minor` is empty.
    pub fn new(major: u64, minor: Vec<u64>) -> Self {
        assert!(!minor.is_empty(), "chapter minor part cannot be empty");
        let minor_str = minor
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        Self {
            raw: format!("{}-{}", major, minor_str),
            major,
            minor,
        }
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> &[u64] {
        &self.minor
    }

    /// The minor part exactly as written, e.g. `"1.5"` for `72-1.5`.
    pub fn minor_str(&self) -> &str {
        self.raw
            .split_once('-')
            .map(|(_, minor)| minor)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` for decimal sub-chapters such as `72-1.5`.
    pub fn is_sub_chapter(&self) -> bool {
        self.minor.len() > 1
    }

    /// The next chapter within the same major: `(major, minor + 1)`.
    ///
    /// Only defined for single-component minors; sub-chapters return `None`.
    pub fn next_minor(&self) -> Option<ChapterId> {
        match self.minor.as_slice() {
            [minor] => Some(ChapterId::new(self.major, vec![minor.checked_add(1)?])),
            _ => None,
        }
    }

    /// The first chapter of the next major: `(major + 1, 1)`.
    pub fn first_of_next_major(&self) -> Option<ChapterId> {
        Some(ChapterId::new(self.major.checked_add(1)?, vec![1]))
    }
}

impl FromStr for ChapterId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = CHAPTER_ID_RE
            .captures(s)
            .ok_or_else(|| Error::parse(format!("Invalid chapter identifier: {:?}", s)))?;

        let major = caps[1]
            .parse()
            .map_err(|e| Error::parse(format!("Invalid chapter major in {:?}: {}", s, e)))?;
        let minor = caps[2]
            .split('.')
            .map(|part| {
                part.parse()
                    .map_err(|e| Error::parse(format!("Invalid chapter minor in {:?}: {}", s, e)))
            })
            .collect::<Result<Vec<u64>>>()?;

        Ok(Self {
            major,
            minor,
            raw: s.to_string(),
        })
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for ChapterId {
    fn eq(&self, other: &Self) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl Eq for ChapterId {}

impl Hash for ChapterId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
    }
}

impl PartialOrd for ChapterId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChapterId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
    }
}

/// An absolute chapter page URL such as
/// `https://example.com/manga/<slug>/chapter/<major>-<minor>`.
///
/// The slug and chapter segments are looked up on demand; a URL without them
/// is still a valid `ChapterUrl` (next-chapter links are not guaranteed to
/// follow the site's URL scheme), the accessors simply return `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChapterUrl(Url);

impl ChapterUrl {
    /// Parses an absolute URL.
    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self(Url::parse(url)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    /// The title slug following the `manga` path segment.
    pub fn slug(&self) -> Option<&str> {
        segment_after(&self.0, MANGA_SEGMENT)
    }

    /// The raw path segment following `chapter`, parseable or not.
    pub fn chapter_segment(&self) -> Option<&str> {
        segment_after(&self.0, CHAPTER_SEGMENT)
    }

    /// The chapter identifier, if the chapter segment is well formed.
    pub fn chapter_id(&self) -> Option<ChapterId> {
        self.chapter_segment()?.parse().ok()
    }

    /// Returns a copy of this URL pointing at another chapter.
    ///
    /// Scheme, host and every other path segment are preserved; query and
    /// fragment are dropped. Returns `None` when there is no chapter segment
    /// to replace.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use renzoku::types::{ChapterId, ChapterUrl};
    ///
    /// let url = ChapterUrl::parse("https://example.com/manga/foo/chapter/5-3?x=1").unwrap();
    /// let next = url.with_chapter(&ChapterId::new(5, vec![4])).unwrap();
    /// assert_eq!(next.as_str(), "https://example.com/manga/foo/chapter/5-4");
    /// ```
    pub fn with_chapter(&self, id: &ChapterId) -> Option<ChapterUrl> {
        let id = id.to_string();
        let mut segments: Vec<&str> = path_segments(&self.0);
        let pos = segments.iter().position(|s| *s == CHAPTER_SEGMENT)?;
        *segments.get_mut(pos + 1)? = &id;
        Some(self.with_path(&segments))
    }

    /// The title page URL: this URL's path truncated before `chapter`.
    pub fn title_url(&self) -> ChapterUrl {
        let segments = path_segments(&self.0);
        let end = segments
            .iter()
            .position(|s| *s == CHAPTER_SEGMENT)
            .unwrap_or(segments.len());
        self.with_path(&segments[..end])
    }

    fn with_path(&self, segments: &[&str]) -> ChapterUrl {
        let mut url = self.0.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.set_path(&format!("/{}", segments.join("/")));
        ChapterUrl(url)
    }
}

impl fmt::Display for ChapterUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<Url> for ChapterUrl {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl AsRef<str> for ChapterUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Builds the chapter index page of a title: `<site>/manga/<slug>?tab=chapters`.
///
/// # Examples
///
/// ```rust
/// use renzoku::types::title_index_url;
///
/// let url = title_index_url("https://example.com/", "foo").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/manga/foo?tab=chapters");
/// ```
pub fn title_index_url(site: &str, slug: &str) -> Result<Url> {
    let base = site.trim_end_matches('/');
    let url = format!(
        "{}/{}/{}?tab=chapters",
        base,
        MANGA_SEGMENT,
        urlencoding::encode(slug)
    );
    Ok(Url::parse(&url)?)
}

fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Returns the path segment directly following `marker`, if any.
pub fn segment_after<'a>(url: &'a Url, marker: &str) -> Option<&'a str> {
    let segments = path_segments(url);
    let pos = segments.iter().position(|s| *s == marker)?;
    segments.get(pos + 1).copied()
}

/// One page image of a chapter.
///
/// The index orders pages within a chapter and is unique; the URL is made
/// absolute against the chapter URL before download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageItem {
    /// Page number within the chapter
    pub index: u32,

    /// Image URL
    pub url: String,
}

impl PageItem {
    pub fn new(index: u32, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }
}

/// Naming information for a chapter's output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMetadata {
    /// Title slug from the URL
    pub slug: String,

    /// Zero-padded volume number, `"01"` when none is discoverable
    pub volume_label: String,

    /// Chapter number, preserving decimal sub-chapters (`"1.5"`)
    pub chapter_label: String,

    /// Raw chapter path segment from the URL
    pub chapter_id: String,
}
