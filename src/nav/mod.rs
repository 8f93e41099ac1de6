//! Navigation-tree building.
//!
//! Turns the optional navigation document of a book into an ordered list of
//! [`NavEntry`] values, each pointing at a spine index. Navigation is never
//! allowed to fail a load: any problem degrades to an empty list.

mod ncx;
mod xhtml;

use crate::archive::Archive;
use crate::error::Result;
use crate::package::{ManifestItem, Package, parent_dir, resolve_path, split_fragment};

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// A table of contents entry resolved against the spine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub label: String,
    pub spine_index: usize,
    /// Nesting level in the source tree (0 = top level).
    pub depth: usize,
    /// In-page target, if the entry points inside a chapter.
    pub fragment: Option<String>,
}

/// A navigation point before spine resolution.
#[derive(Debug, Clone)]
pub(crate) struct RawNavPoint {
    pub label: String,
    pub href: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavKind {
    Ncx,
    Xhtml,
}

/// Build the table of contents of a book.
///
/// The navigation document is located by declaration (an EPUB 3 item with
/// the `nav` property, then the spine's `toc` reference) or, failing that,
/// by file name. Entries whose target does not match a spine item are
/// dropped.
pub fn build_toc(archive: &Archive, package: &Package) -> Vec<NavEntry> {
    let Some((path, kind)) = locate_nav_document(archive, package) else {
        tracing::debug!("no navigation document found");
        return Vec::new();
    };

    match read_points(archive, &path, kind) {
        Ok(points) => resolve_points(package, &path, points),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "navigation document unusable");
            Vec::new()
        }
    }
}

/// Index of the entry to highlight while `chapter` is dominant.
///
/// The first entry pointing at `chapter`, or else the last entry pointing
/// at an earlier chapter.
pub fn highlight_for(entries: &[NavEntry], chapter: usize) -> Option<usize> {
    entries
        .iter()
        .position(|entry| entry.spine_index == chapter)
        .or_else(|| {
            entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.spine_index < chapter)
                .max_by_key(|(i, entry)| (entry.spine_index, *i))
                .map(|(i, _)| i)
        })
}

fn read_points(archive: &Archive, path: &str, kind: NavKind) -> Result<Vec<RawNavPoint>> {
    let content = archive.read_text(path)?;
    match kind {
        NavKind::Ncx => ncx::parse_ncx(&content),
        NavKind::Xhtml => xhtml::parse_nav_xhtml(&content),
    }
}

fn resolve_points(package: &Package, nav_path: &str, points: Vec<RawNavPoint>) -> Vec<NavEntry> {
    let base_dir = parent_dir(nav_path);
    points
        .into_iter()
        .filter_map(|point| {
            let (path, fragment) = split_fragment(&point.href);
            let target = resolve_path(base_dir, path);
            let Some(spine_index) = spine_index_for(package, &target) else {
                tracing::debug!(label = %point.label, target = %target, "dropping unmatched nav entry");
                return None;
            };
            Some(NavEntry {
                label: point.label,
                spine_index,
                depth: point.depth,
                fragment: fragment.map(str::to_string),
            })
        })
        .collect()
}

/// Exact match first, then a percent-decoded comparison.
fn spine_index_for(package: &Package, target: &str) -> Option<usize> {
    package.spine_index_of(target).or_else(|| {
        let decoded = percent_encoding::percent_decode_str(target).decode_utf8().ok()?;
        package.spine.iter().position(|item| {
            percent_encoding::percent_decode_str(&item.resolved_path)
                .decode_utf8()
                .is_ok_and(|p| p == decoded)
        })
    })
}

fn locate_nav_document(archive: &Archive, package: &Package) -> Option<(String, NavKind)> {
    let declared = sorted_items(package, |item| item.has_property("nav"))
        .into_iter()
        .next()
        .map(|item| (item.resolved_path.clone(), kind_of(item)))
        .or_else(|| {
            let id = package.toc_id.as_ref()?;
            let item = package.manifest.get(id)?;
            Some((item.resolved_path.clone(), kind_of(item)))
        });

    let candidate = declared.or_else(|| {
        sorted_items(package, |item| item.media_type == NCX_MEDIA_TYPE)
            .into_iter()
            .chain(sorted_items(package, looks_like_nav))
            .next()
            .map(|item| (item.resolved_path.clone(), kind_of(item)))
    });

    let candidate = candidate.or_else(|| {
        let mut names: Vec<&str> = archive
            .entry_names()
            .filter(|name| name.to_ascii_lowercase().ends_with(".ncx"))
            .collect();
        names.sort_unstable();
        names.first().map(|name| (name.to_string(), NavKind::Ncx))
    })?;

    archive.contains(&candidate.0).then_some(candidate)
}

fn sorted_items(package: &Package, pred: impl Fn(&ManifestItem) -> bool) -> Vec<&ManifestItem> {
    let mut items: Vec<_> = package.manifest.values().filter(|item| pred(item)).collect();
    items.sort_by(|a, b| a.resolved_path.cmp(&b.resolved_path));
    items
}

fn looks_like_nav(item: &ManifestItem) -> bool {
    let name = item
        .resolved_path
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_document = [".ncx", ".xhtml", ".html", ".htm"]
        .iter()
        .any(|ext| name.ends_with(ext));
    is_document && (name.contains("toc") || name.contains("nav"))
}

fn kind_of(item: &ManifestItem) -> NavKind {
    if item.media_type == NCX_MEDIA_TYPE || item.resolved_path.to_ascii_lowercase().ends_with(".ncx")
    {
        NavKind::Ncx
    } else {
        NavKind::Xhtml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, spine_index: usize) -> NavEntry {
        NavEntry {
            label: label.to_string(),
            spine_index,
            depth: 0,
            fragment: None,
        }
    }

    #[test]
    fn test_highlight_exact_match() {
        let entries = vec![entry("One", 0), entry("Two", 2), entry("Two b", 2)];
        assert_eq!(highlight_for(&entries, 2), Some(1));
    }

    #[test]
    fn test_highlight_falls_back_to_preceding_entry() {
        let entries = vec![entry("One", 0), entry("Three", 3)];
        assert_eq!(highlight_for(&entries, 2), Some(0));
        assert_eq!(highlight_for(&entries, 5), Some(1));
    }

    #[test]
    fn test_highlight_before_first_entry() {
        let entries = vec![entry("Two", 2)];
        assert_eq!(highlight_for(&entries, 0), None);
        assert_eq!(highlight_for(&[], 0), None);
    }

    #[test]
    fn test_looks_like_nav() {
        let item = |path: &str| ManifestItem {
            id: "x".into(),
            href: path.into(),
            media_type: "application/xhtml+xml".into(),
            resolved_path: path.into(),
            properties: None,
        };
        assert!(looks_like_nav(&item("OEBPS/toc.xhtml")));
        assert!(looks_like_nav(&item("OEBPS/nav.html")));
        assert!(!looks_like_nav(&item("OEBPS/chapter1.xhtml")));
        assert!(!looks_like_nav(&item("OEBPS/toc.css")));
    }
}
