//! Link-following crawl state machine.
//!
//! A [`Crawl`] starts `Advancing` towards its first chapter. The driver calls
//! [`Crawl::position`] to land on the frontier, fetches (and, on a first
//! visit, processes) that page, then hands the HTML to [`Crawl::advance`],
//! which asks the [`ChapterResolver`] for the next chapter. The loop ends when
//! `position` returns `None`; [`Crawl::state`] then carries the
//! [`Termination`] reason.
//!
//! Termination is always reached: every `position` call consumes one step of
//! a bounded budget ([`DEFAULT_MAX_STEPS`]).

use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

use crate::resolver::ChapterResolver;
use crate::types::{ChapterId, ChapterUrl};

/// Upper bound on crawl iterations.
pub const DEFAULT_MAX_STEPS: usize = 2000;

/// Why a crawl stopped. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Neither a next link nor a numeric candidate was found
    NoNextChapter,
    /// The step budget ran out
    SafetyCap,
    /// The next link points at another title
    LeftTitle(ChapterUrl),
    /// The next link points back at a chapter already navigated from
    Cycle(ChapterUrl),
    /// An already-processed page could not be re-fetched for navigation
    FetchFailed(ChapterUrl),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::NoNextChapter => write!(f, "no next chapter"),
            Termination::SafetyCap => write!(f, "safety cap reached"),
            Termination::LeftTitle(url) => write!(f, "next link leaves the title: {}", url),
            Termination::Cycle(url) => write!(f, "next link revisits {}", url),
            Termination::FetchFailed(url) => write!(f, "could not re-fetch {}", url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    /// Heading towards the frontier URL
    Advancing(ChapterUrl),
    /// Standing on a chapter page, waiting for its HTML
    Positioned(ChapterUrl),
    Terminated(Termination),
}

/// Insertion-ordered set of processed chapter URLs.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    order: Vec<ChapterUrl>,
    seen: HashSet<ChapterUrl>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `url`; returns `false` if it was already present.
    pub fn insert(&mut self, url: ChapterUrl) -> bool {
        if self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.order.push(url);
        true
    }

    pub fn contains(&self, url: &ChapterUrl) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Visited URLs in first-visit order.
    pub fn iter(&self) -> impl Iterator<Item = &ChapterUrl> {
        self.order.iter()
    }
}

impl FromIterator<ChapterUrl> for VisitedSet {
    fn from_iter<I: IntoIterator<Item = ChapterUrl>>(iter: I) -> Self {
        let mut set = VisitedSet::new();
        for url in iter {
            set.insert(url);
        }
        set
    }
}

/// The page the crawl just landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub url: ChapterUrl,
    /// `false` when the page was processed before and is only fetched for
    /// navigation
    pub first_visit: bool,
}

#[derive(Debug, Clone)]
pub struct Crawl {
    state: CrawlState,
    visited: VisitedSet,
    navigated: HashSet<ChapterUrl>,
    steps: usize,
    max_steps: usize,
    origin: Option<(String, String)>,
    upper_bound: Option<ChapterId>,
}

impl Crawl {
    /// A crawl heading for `start`. Its host and slug define the title the
    /// crawl may not leave. Next links without a `/manga/<slug>` segment
    /// carry no title and are followed.
    pub fn new(start: ChapterUrl) -> Self {
        let origin = title_key(&start);
        Self {
            state: CrawlState::Advancing(start),
            visited: VisitedSet::new(),
            navigated: HashSet::new(),
            steps: 0,
            max_steps: DEFAULT_MAX_STEPS,
            origin,
            upper_bound: None,
        }
    }

    /// Seeds the visited set, e.g. with chapters processed by enumeration.
    pub fn with_visited(mut self, visited: VisitedSet) -> Self {
        self.visited = visited;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Stops numeric probing from jumping to a major beyond `bound`.
    pub fn with_upper_bound(mut self, bound: Option<ChapterId>) -> Self {
        self.upper_bound = bound;
        self
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    pub fn into_visited(self) -> VisitedSet {
        self.visited
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The termination reason, once the crawl has stopped.
    pub fn termination(&self) -> Option<&Termination> {
        match &self.state {
            CrawlState::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Lands on the frontier and marks it visited.
    ///
    /// Returns `None` once the crawl is terminated, including when this call
    /// would exceed the step budget.
    pub fn position(&mut self) -> Option<Visit> {
        let url = match &self.state {
            CrawlState::Terminated(_) => return None,
            CrawlState::Positioned(url) => {
                return Some(Visit {
                    url: url.clone(),
                    first_visit: false,
                });
            }
            CrawlState::Advancing(url) => url.clone(),
        };

        if self.steps >= self.max_steps {
            self.terminate(Termination::SafetyCap);
            return None;
        }
        self.steps += 1;

        let first_visit = self.visited.insert(url.clone());
        self.state = CrawlState::Positioned(url.clone());
        Some(Visit { url, first_visit })
    }

    /// Resolves the next chapter from the current page's HTML.
    ///
    /// Does nothing unless the crawl is positioned.
    pub async fn advance(&mut self, resolver: &ChapterResolver, html: &str) -> &CrawlState {
        let CrawlState::Positioned(current) = &self.state else {
            return &self.state;
        };
        let current = current.clone();
        self.navigated.insert(current.clone());

        let next = resolver
            .next_chapter(html, &current, self.upper_bound.as_ref())
            .await;
        self.state = match next {
            None => CrawlState::Terminated(Termination::NoNextChapter),
            Some(next) => self.classify(next),
        };

        match &self.state {
            CrawlState::Advancing(next) => debug!(from = %current, to = %next, "advancing"),
            CrawlState::Terminated(reason) => info!(at = %current, %reason, "crawl finished"),
            CrawlState::Positioned(_) => {}
        }
        &self.state
    }

    /// Stops the crawl.
    pub fn terminate(&mut self, reason: Termination) {
        info!(%reason, steps = self.steps, "crawl terminated");
        self.state = CrawlState::Terminated(reason);
    }

    fn classify(&self, next: ChapterUrl) -> CrawlState {
        let other_title = title_key(&next).is_some_and(|key| self.origin.as_ref() != Some(&key));
        if other_title {
            CrawlState::Terminated(Termination::LeftTitle(next))
        } else if self.navigated.contains(&next) {
            CrawlState::Terminated(Termination::Cycle(next))
        } else {
            CrawlState::Advancing(next)
        }
    }
}

fn title_key(url: &ChapterUrl) -> Option<(String, String)> {
    let host = url.url().host_str()?.to_string();
    let slug = url.slug()?.to_string();
    Some((host, slug))
}
