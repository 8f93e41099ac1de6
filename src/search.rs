//! Linear full-book search.

use memchr::memmem;

use crate::archive::Archive;
use crate::package::Package;
use crate::text::strip_markup;
use crate::util::{decode_text, extract_xml_encoding};

/// One matching chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub spine_index: usize,
    /// Text around the first match in the chapter.
    pub snippet: String,
}

/// Scan the spine in order for `query`, case-insensitively.
///
/// Each chapter contributes at most one hit, built around its first match.
/// Scanning stops once `max_results` hits are collected. Chapters that
/// cannot be read are skipped.
pub fn search(
    archive: &Archive,
    package: &Package,
    query: &str,
    max_results: usize,
    snippet_radius: usize,
) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || max_results == 0 {
        return Vec::new();
    }
    let finder = memmem::Finder::new(needle.as_bytes());

    let mut hits = Vec::new();
    for (index, item) in package.spine.iter().enumerate() {
        let bytes = match archive.read(&item.resolved_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(index, path = %item.resolved_path, error = %e, "search skipping chapter");
                continue;
            }
        };
        let text = strip_markup(&decode_text(&bytes, extract_xml_encoding(&bytes)));
        let (haystack, starts) = lowercase_with_offsets(&text);

        if let Some(pos) = finder.find(haystack.as_bytes()) {
            let start = starts.partition_point(|&(lowered, _)| lowered <= pos) - 1;
            hits.push(SearchHit {
                spine_index: index,
                snippet: snippet(&text, starts[start].1, needle.chars().count(), snippet_radius),
            });
            if hits.len() >= max_results {
                break;
            }
        }
    }
    tracing::debug!(query, hits = hits.len(), "search finished");
    hits
}

/// Lowercase `text`, recording for each original char the byte offset of
/// its lowercase form and of itself, so matches map back to the original.
fn lowercase_with_offsets(text: &str) -> (String, Vec<(usize, usize)>) {
    let mut lowered = String::with_capacity(text.len());
    let mut starts = Vec::with_capacity(text.len());
    for (offset, ch) in text.char_indices() {
        starts.push((lowered.len(), offset));
        lowered.extend(ch.to_lowercase());
    }
    (lowered, starts)
}

/// Up to `radius` chars on each side of the match at byte `at`.
fn snippet(text: &str, at: usize, match_chars: usize, radius: usize) -> String {
    let before: Vec<(usize, char)> = text[..at].char_indices().collect();
    let start = before
        .len()
        .checked_sub(radius)
        .map_or(0, |i| before[i].0);

    let end = text[at..]
        .char_indices()
        .nth(match_chars + radius)
        .map_or(text.len(), |(i, _)| at + i);

    let mut out = String::new();
    if start > 0 {
        out.push('…');
    }
    out.push_str(text[start..end].trim());
    if end < text.len() {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_offsets_map_back() {
        let (lowered, starts) = lowercase_with_offsets("AİB");
        assert_eq!(lowered, "ai\u{307}b");
        assert_eq!(starts, vec![(0, 0), (1, 1), (4, 3)]);
    }

    #[test]
    fn test_snippet_bounds() {
        let text = "The quick brown fox jumps over the lazy dog";
        assert_eq!(snippet(text, 16, 3, 6), "…brown fox jumps…");
        assert_eq!(snippet(text, 0, 3, 100), text);
        assert_eq!(snippet("née café", 5, 4, 1), "…café");
    }
}
