//! Library audit: compares the chapters a title lists online with the
//! chapters present under the local downloads directory.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::config::LayoutConfig;
use crate::download::sanitize_filename;
use crate::error::{Error, Result};
use crate::resolver::ChapterResolver;
use crate::types::ChapterId;

/// The chapters of one volume (one major number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSummary {
    pub major: u64,
    /// Sorted, without duplicates
    pub chapters: Vec<ChapterId>,
}

impl VolumeSummary {
    pub fn count(&self) -> usize {
        self.chapters.len()
    }

    pub fn first(&self) -> Option<&ChapterId> {
        self.chapters.first()
    }

    pub fn last(&self) -> Option<&ChapterId> {
        self.chapters.last()
    }
}

/// Groups identifiers by major number, in ascending order.
pub fn group_by_volume<I>(ids: I) -> Vec<VolumeSummary>
where
    I: IntoIterator<Item = ChapterId>,
{
    let mut volumes: BTreeMap<u64, BTreeSet<ChapterId>> = BTreeMap::new();
    for id in ids {
        volumes.entry(id.major()).or_default().insert(id);
    }
    volumes
        .into_iter()
        .map(|(major, chapters)| VolumeSummary {
            major,
            chapters: chapters.into_iter().collect(),
        })
        .collect()
}

/// Online and local chapters of one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDiff {
    pub major: u64,
    pub online: Vec<ChapterId>,
    pub local: Vec<ChapterId>,
    /// Listed online, absent locally
    pub missing: Vec<ChapterId>,
    /// Present locally, not listed online
    pub extra: Vec<ChapterId>,
}

/// Per-volume difference between two chapter sets.
pub fn compare(online: &[ChapterId], local: &[ChapterId]) -> Vec<VolumeDiff> {
    let online = group_by_volume(online.iter().cloned());
    let local = group_by_volume(local.iter().cloned());

    let mut majors: BTreeSet<u64> = online.iter().map(|v| v.major).collect();
    majors.extend(local.iter().map(|v| v.major));

    let chapters_of = |volumes: &[VolumeSummary], major: u64| -> Vec<ChapterId> {
        volumes
            .iter()
            .find(|v| v.major == major)
            .map(|v| v.chapters.clone())
            .unwrap_or_default()
    };

    majors
        .into_iter()
        .map(|major| {
            let on = chapters_of(&online, major);
            let lo = chapters_of(&local, major);
            let missing = on.iter().filter(|id| !lo.contains(id)).cloned().collect();
            let extra = lo.iter().filter(|id| !on.contains(id)).cloned().collect();
            VolumeDiff {
                major,
                online: on,
                local: lo,
                missing,
                extra,
            }
        })
        .collect()
}

/// Reconstructs the chapter identifiers stored under `<downloads_root>/<slug>`.
///
/// Chapter directories are named `<chapter_prefix><minor>`; their volume is
/// the nearest enclosing `<volume_prefix><NN>` directory. Directories that do
/// not yield a well-formed identifier are ignored. A missing title directory
/// yields an empty list.
pub async fn scan_local(
    downloads_root: &Path,
    slug: &str,
    layout: &LayoutConfig,
) -> Result<Vec<ChapterId>> {
    let root = downloads_root.join(sanitize_filename(slug));
    if !fs::try_exists(&root).await.unwrap_or(false) {
        debug!(root = %root.display(), "no local title directory");
        return Ok(Vec::new());
    }

    let volume_re = Regex::new(&format!(
        r"^{}\s*(\d+)$",
        regex::escape(layout.volume_prefix.trim())
    ))
    .map_err(|e| Error::config(format!("layout.volume_prefix: {}", e)))?;
    let chapter_prefix = layout.chapter_prefix.as_str();

    let mut found = BTreeSet::new();
    let mut pending: Vec<(PathBuf, Option<u64>)> = vec![(root, None)];

    while let Some((dir, volume)) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| Error::filesystem(&dir, e))?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            if let (Some(volume), Some(minor)) = (volume, name.strip_prefix(chapter_prefix)) {
                match format!("{}-{}", volume, minor.trim()).parse::<ChapterId>() {
                    Ok(id) => {
                        found.insert(id);
                    }
                    Err(_) => debug!(dir = %name, "not a chapter directory"),
                }
            }

            let child_volume = volume_re
                .captures(&name)
                .and_then(|caps| caps[1].parse().ok())
                .or(volume);
            pending.push((entry.path(), child_volume));
        }
    }

    Ok(found.into_iter().collect())
}

/// Outcome of [`audit_title`].
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub slug: String,
    pub online_total: usize,
    pub local_total: usize,
    pub volumes: Vec<VolumeDiff>,
}

impl AuditReport {
    /// Whether every online chapter is present locally.
    pub fn is_complete(&self) -> bool {
        self.volumes.iter().all(|v| v.missing.is_empty())
    }

    pub fn missing_total(&self) -> usize {
        self.volumes.iter().map(|v| v.missing.len()).sum()
    }
}

/// Enumerates `slug` on `site` and compares it with the local library.
pub async fn audit_title(
    resolver: &ChapterResolver,
    site: &str,
    slug: &str,
    downloads_root: &Path,
    layout: &LayoutConfig,
) -> Result<AuditReport> {
    let online: Vec<ChapterId> = resolver
        .enumerate(site, slug)
        .await?
        .iter()
        .filter_map(|url| url.chapter_id())
        .collect();
    let local = scan_local(downloads_root, slug, layout).await?;

    let report = AuditReport {
        slug: slug.to_string(),
        online_total: online.len(),
        local_total: local.len(),
        volumes: compare(&online, &local),
    };
    info!(
        slug,
        online = report.online_total,
        local = report.local_total,
        missing = report.missing_total(),
        "audit finished"
    );
    Ok(report)
}
