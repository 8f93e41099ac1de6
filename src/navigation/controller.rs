//! Link activation and the back-stack.

use super::link::Link;
use crate::package::{Package, parent_dir, resolve_path};
use crate::stream::{ChapterSource, StreamEngine, Surface};

/// Where the reader was before a link jump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry {
    pub chapter_index: usize,
    pub scroll_top: f64,
    pub scroll_left: f64,
}

/// Result of activating a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Leaves the book; not recorded in history.
    External(String),
    /// Target chapter was already materialized and the viewport moved there.
    ScrolledWithin {
        index: usize,
        fragment: Option<String>,
    },
    /// The window was replaced. The fragment, if any, still has to be
    /// scrolled to once the new content has settled.
    Jumped {
        index: usize,
        fragment: Option<String>,
    },
    /// Nothing happened: empty href, no matching spine item, or the target
    /// could not be rendered.
    Unresolved,
}

/// Resolves links against the spine and keeps the back-stack.
#[derive(Debug, Default)]
pub struct NavigationController {
    history: Vec<HistoryEntry>,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Spine index an internal link points at, resolved against the
    /// directory of chapter `active`. An empty path means `active` itself.
    pub fn resolve_target(package: &Package, active: usize, path: &str) -> Option<usize> {
        if path.is_empty() {
            return (active < package.spine.len()).then_some(active);
        }
        let current = &package.spine.get(active)?.resolved_path;
        let target = resolve_path(parent_dir(current), path);
        package.spine_index_of(&target)
    }

    /// Handle activation of `href` from chapter `active`.
    ///
    /// Internal links to a materialized chapter only scroll. Others push the
    /// current position on the back-stack and jump.
    pub fn handle_link_activation(
        &mut self,
        href: &str,
        active: usize,
        package: &Package,
        engine: &mut StreamEngine,
        source: &mut dyn ChapterSource,
        surface: &mut dyn Surface,
    ) -> LinkOutcome {
        let (path, fragment) = match Link::parse(href) {
            None => return LinkOutcome::Unresolved,
            Some(Link::External(url)) => return LinkOutcome::External(url),
            Some(Link::Internal { path, fragment }) => (path, fragment),
        };

        let Some(index) = Self::resolve_target(package, active, &path) else {
            tracing::warn!(href, active, "link target not in spine");
            return LinkOutcome::Unresolved;
        };

        if engine.window().contains(index) {
            engine.scroll_to_fragment(index, fragment.as_deref(), surface);
            return LinkOutcome::ScrolledWithin { index, fragment };
        }

        let entry = HistoryEntry {
            chapter_index: engine.window().lo().unwrap_or(active),
            scroll_top: surface.scroll_top(),
            scroll_left: surface.scroll_left(),
        };
        self.history.push(entry);
        tracing::debug!(from = entry.chapter_index, to = index, depth = self.history.len(), "link jump");

        if engine.jump(index, source, surface) {
            LinkOutcome::Jumped { index, fragment }
        } else {
            LinkOutcome::Unresolved
        }
    }

    /// Return to the last history entry.
    ///
    /// Jumps to its chapter and hands the entry back so the caller can
    /// restore the offsets once the content has settled. `None` (and no state
    /// change) when the stack is empty.
    pub fn pop_history(
        &mut self,
        engine: &mut StreamEngine,
        source: &mut dyn ChapterSource,
        surface: &mut dyn Surface,
    ) -> Option<HistoryEntry> {
        let entry = self.history.pop()?;
        tracing::debug!(chapter = entry.chapter_index, "returning to history entry");
        engine.jump(entry.chapter_index, source, surface);
        Some(entry)
    }
}
