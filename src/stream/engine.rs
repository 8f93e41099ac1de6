//! The windowed materialization state machine.

use std::collections::BTreeSet;

use super::chapter::{ChapterBlock, ChapterSource};
use super::surface::Surface;
use super::window::ChapterWindow;
use crate::config::ReaderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Claim on an in-flight extension.
///
/// Handed out by [`StreamEngine::begin_extend`]; the matching
/// [`StreamEngine::complete_extend`] is dropped when a jump happened in
/// between or the window no longer ends next to `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendTicket {
    generation: u64,
    direction: Direction,
    index: usize,
}

impl ExtendTicket {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// What a scroll event caused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub extended_forward: bool,
    pub extended_backward: bool,
    /// New dominant chapter, if it changed.
    pub dominant_changed: Option<usize>,
}

/// Visibility observation over materialized blocks.
#[derive(Debug, Default)]
struct Observer {
    attached: bool,
    observed: BTreeSet<usize>,
}

impl Observer {
    fn disconnect(&mut self) {
        self.attached = false;
        self.observed.clear();
    }

    fn attach(&mut self, window: ChapterWindow) {
        self.observed = window.iter().collect();
        self.attached = true;
    }

    /// Structural insertion: new blocks join the observed set while attached.
    fn inserted(&mut self, index: usize) {
        if self.attached {
            self.observed.insert(index);
        }
    }
}

/// Owns the chapter window and decides what is materialized.
///
/// The engine never holds the surface or the chapter source; both are
/// passed into each operation, so a session can own them side by side.
#[derive(Debug)]
pub struct StreamEngine {
    total: usize,
    window: ChapterWindow,
    generation: u64,
    extending_forward: bool,
    extending_backward: bool,
    observer: Observer,
    dominant: Option<usize>,
    forward_threshold: f64,
    backward_threshold: f64,
    fill_factor: f64,
    visibility_threshold: f64,
}

impl StreamEngine {
    pub fn new(total: usize, config: &ReaderConfig) -> Self {
        Self {
            total,
            window: ChapterWindow::empty(),
            generation: 0,
            extending_forward: false,
            extending_backward: false,
            observer: Observer::default(),
            dominant: None,
            forward_threshold: config.forward_threshold,
            backward_threshold: config.backward_threshold,
            fill_factor: config.fill_factor,
            visibility_threshold: config.visibility_threshold,
        }
    }

    pub fn window(&self) -> ChapterWindow {
        self.window
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Incremented by every jump.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dominant(&self) -> Option<usize> {
        self.dominant
    }

    pub fn is_observing(&self) -> bool {
        self.observer.attached
    }

    pub fn is_extending(&self, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.extending_forward,
            Direction::Backward => self.extending_backward,
        }
    }

    /// Replace the window with `[index, index]`, fill, and observe again.
    ///
    /// Returns `false` when `index` is out of range or its chapter could not
    /// be rendered; the surface is left empty in the latter case.
    pub fn jump(
        &mut self,
        index: usize,
        source: &mut dyn ChapterSource,
        surface: &mut dyn Surface,
    ) -> bool {
        if index >= self.total {
            tracing::warn!(index, total = self.total, "jump target out of range");
            return false;
        }

        self.observer.disconnect();
        self.generation += 1;
        self.extending_forward = false;
        self.extending_backward = false;
        self.dominant = None;
        surface.clear();
        source.release_all();
        self.window = ChapterWindow::empty();
        tracing::debug!(index, generation = self.generation, "jump");

        let Some(block) = source.render(index) else {
            return false;
        };
        surface.append(block);
        self.window = ChapterWindow::singleton(index);

        self.fill_minimum(source, surface);
        self.observer.attach(self.window);
        true
    }

    /// Claim the next extension in `direction`.
    ///
    /// `None` when the window is empty, already at that end of the spine, or
    /// an extension in the same direction is in flight.
    pub fn begin_extend(&mut self, direction: Direction) -> Option<ExtendTicket> {
        let (index, in_flight) = match direction {
            Direction::Forward => (
                self.window.next_forward(self.total)?,
                &mut self.extending_forward,
            ),
            Direction::Backward => (self.window.next_backward()?, &mut self.extending_backward),
        };
        if *in_flight {
            return None;
        }
        *in_flight = true;
        Some(ExtendTicket {
            generation: self.generation,
            direction,
            index,
        })
    }

    /// Materialize the result of an extension.
    ///
    /// Stale tickets (a jump happened since [`begin_extend`](Self::begin_extend))
    /// and tickets whose index is no longer adjacent to the window are
    /// dropped. A prepend shifts the scroll offset by exactly the height it
    /// added.
    pub fn complete_extend(
        &mut self,
        ticket: ExtendTicket,
        block: Option<ChapterBlock>,
        surface: &mut dyn Surface,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(index = ticket.index, "dropping extension from a superseded window");
            return false;
        }
        match ticket.direction {
            Direction::Forward => self.extending_forward = false,
            Direction::Backward => self.extending_backward = false,
        }

        let expected = match ticket.direction {
            Direction::Forward => self.window.next_forward(self.total),
            Direction::Backward => self.window.next_backward(),
        };
        if expected != Some(ticket.index) {
            tracing::debug!(index = ticket.index, "dropping extension no longer adjacent");
            return false;
        }
        let Some(block) = block.filter(|b| b.index == ticket.index) else {
            return false;
        };

        match ticket.direction {
            Direction::Forward => {
                surface.append(block);
                self.window = self.window.extended_forward();
            }
            Direction::Backward => {
                let before = surface.scroll_height();
                let (top, left) = (surface.scroll_top(), surface.scroll_left());
                surface.prepend(block);
                let added = surface.scroll_height() - before;
                surface.scroll_to(top + added, left);
                self.window = self.window.extended_backward();
            }
        }
        self.observer.inserted(ticket.index);
        tracing::debug!(
            index = ticket.index,
            lo = self.window.lo(),
            hi = self.window.hi(),
            "window extended"
        );
        true
    }

    pub fn extend_forward(
        &mut self,
        source: &mut dyn ChapterSource,
        surface: &mut dyn Surface,
    ) -> bool {
        self.extend(Direction::Forward, source, surface)
    }

    pub fn extend_backward(
        &mut self,
        source: &mut dyn ChapterSource,
        surface: &mut dyn Surface,
    ) -> bool {
        self.extend(Direction::Backward, source, surface)
    }

    fn extend(
        &mut self,
        direction: Direction,
        source: &mut dyn ChapterSource,
        surface: &mut dyn Surface,
    ) -> bool {
        let Some(ticket) = self.begin_extend(direction) else {
            return false;
        };
        let block = source.render(ticket.index);
        self.complete_extend(ticket, block, surface)
    }

    /// Extend forward until the content is `fill_factor` viewports tall,
    /// the spine ends, or a chapter fails to render.
    pub fn fill_minimum(&mut self, source: &mut dyn ChapterSource, surface: &mut dyn Surface) {
        while surface.scroll_height() < self.fill_factor * surface.client_height()
            && self.window.next_forward(self.total).is_some()
        {
            if !self.extend_forward(source, surface) {
                break;
            }
        }
    }

    /// Extend forward until a viewport at `offset` fits in the content, the
    /// spine ends, or a chapter fails to render. Returns whether `offset`
    /// is reachable without clamping.
    pub fn extend_to_reach(
        &mut self,
        offset: f64,
        source: &mut dyn ChapterSource,
        surface: &mut dyn Surface,
    ) -> bool {
        while surface.scroll_height() < offset + surface.client_height()
            && self.window.next_forward(self.total).is_some()
        {
            if !self.extend_forward(source, surface) {
                break;
            }
        }
        surface.scroll_height() >= offset + surface.client_height()
    }

    /// React to the viewport having moved.
    pub fn on_scroll(
        &mut self,
        source: &mut dyn ChapterSource,
        surface: &mut dyn Surface,
    ) -> ScrollOutcome {
        let mut outcome = ScrollOutcome::default();
        if self.window.is_empty() {
            return outcome;
        }

        let bottom = surface.scroll_top() + surface.client_height();
        if surface.scroll_height() - bottom <= self.forward_threshold {
            outcome.extended_forward = self.extend_forward(source, surface);
        }
        if surface.scroll_top() <= self.backward_threshold {
            outcome.extended_backward = self.extend_backward(source, surface);
        }
        outcome.dominant_changed = self.update_visibility(surface);
        outcome
    }

    /// Recompute the dominant block. Returns it when it changed.
    ///
    /// The dominant block is the observed block with the largest visible
    /// height among those whose visible ratio (visible height over the
    /// smaller of block and viewport height) reaches the threshold.
    pub fn update_visibility(&mut self, surface: &dyn Surface) -> Option<usize> {
        if !self.observer.attached {
            return None;
        }
        let view_top = surface.scroll_top();
        let view_height = surface.client_height();
        let view_bottom = view_top + view_height;

        let mut best: Option<(usize, f64)> = None;
        for &index in &self.observer.observed {
            let Some(bounds) = surface.block_bounds(index) else {
                continue;
            };
            let visible = (bounds.bottom().min(view_bottom) - bounds.top.max(view_top)).max(0.0);
            let reference = bounds.height.min(view_height);
            if reference <= 0.0 || visible / reference < self.visibility_threshold {
                continue;
            }
            if best.is_none_or(|(_, v)| visible > v) {
                best = Some((index, visible));
            }
        }

        let dominant = best.map(|(index, _)| index);
        if dominant.is_some() && dominant != self.dominant {
            self.dominant = dominant;
            tracing::debug!(chapter = dominant, "dominant chapter changed");
            return dominant;
        }
        None
    }

    /// Scroll to `fragment` in chapter `index`, or to the chapter start.
    ///
    /// Returns `false` when the chapter is not materialized or the fragment
    /// is unknown.
    pub fn scroll_to_fragment(
        &self,
        index: usize,
        fragment: Option<&str>,
        surface: &mut dyn Surface,
    ) -> bool {
        if !self.window.contains(index) {
            return false;
        }
        let offset = match fragment {
            Some(id) => surface.fragment_offset(index, id),
            None => surface.block_bounds(index).map(|b| b.top),
        };
        match offset {
            Some(offset) => {
                let left = surface.scroll_left();
                surface.scroll_to(offset, left);
                true
            }
            None => {
                tracing::debug!(index, fragment, "fragment not found");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextMetrics;
    use crate::stream::surface::HeadlessSurface;

    /// Chapters with fixed text lengths; `None` fails to render.
    struct FakeChapters {
        lengths: Vec<Option<usize>>,
        released: usize,
        rendered: Vec<usize>,
    }

    impl FakeChapters {
        fn new(lengths: &[Option<usize>]) -> Self {
            Self {
                lengths: lengths.to_vec(),
                released: 0,
                rendered: Vec::new(),
            }
        }
    }

    impl ChapterSource for FakeChapters {
        fn chapter_count(&self) -> usize {
            self.lengths.len()
        }

        fn render(&mut self, index: usize) -> Option<ChapterBlock> {
            self.rendered.push(index);
            let text_len = (*self.lengths.get(index)?)?;
            Some(ChapterBlock {
                index,
                path: format!("ch{index}.xhtml"),
                html: String::new(),
                text_len,
                images: 0,
                anchors: Vec::new(),
            })
        }

        fn release_all(&mut self) {
            self.released += 1;
        }
    }

    // Chapter height equals its text length: 10 chars per 10px line.
    fn setup(lengths: &[Option<usize>]) -> (StreamEngine, FakeChapters, HeadlessSurface) {
        let config = ReaderConfig {
            forward_threshold: 50.0,
            backward_threshold: 20.0,
            ..ReaderConfig::default()
        };
        let metrics = TextMetrics {
            viewport_height: 100.0,
            chars_per_line: 10,
            line_height: 10.0,
            image_height: 0.0,
            block_padding: 0.0,
        };
        (
            StreamEngine::new(lengths.len(), &config),
            FakeChapters::new(lengths),
            HeadlessSurface::new(metrics),
        )
    }

    #[test]
    fn test_extend_to_reach_deep_offset() {
        let (mut engine, mut chapters, mut surface) =
            setup(&[Some(300), Some(300), Some(300), Some(300)]);
        engine.jump(0, &mut chapters, &mut surface);
        assert_eq!(engine.window().range(), Some(0..=0));

        assert!(engine.extend_to_reach(650.0, &mut chapters, &mut surface));
        assert_eq!(engine.window().range(), Some(0..=2));
        surface.scroll_to(650.0, 0.0);
        assert_eq!(surface.scroll_top(), 650.0);

        // Past the end of the book: extends fully, then reports the clamp.
        assert!(!engine.extend_to_reach(5_000.0, &mut chapters, &mut surface));
        assert_eq!(engine.window().range(), Some(0..=3));
    }

    #[test]
    fn test_extend_to_reach_stops_at_a_failed_render() {
        let (mut engine, mut chapters, mut surface) = setup(&[Some(300), None, Some(300)]);
        engine.jump(0, &mut chapters, &mut surface);
        assert!(!engine.extend_to_reach(400.0, &mut chapters, &mut surface));
        assert_eq!(engine.window().range(), Some(0..=0));
    }

    #[test]
    fn test_scrolling_down_extends_until_the_last_chapter() {
        let (mut engine, mut chapters, mut surface) =
            setup(&[Some(300), Some(300), Some(300)]);

        assert!(engine.jump(0, &mut chapters, &mut surface));
        assert_eq!(engine.window().range(), Some(0..=0));

        surface.scroll_to(200.0, 0.0);
        assert!(engine.on_scroll(&mut chapters, &mut surface).extended_forward);
        assert_eq!(engine.window().range(), Some(0..=1));

        surface.scroll_to(500.0, 0.0);
        assert!(engine.on_scroll(&mut chapters, &mut surface).extended_forward);
        assert_eq!(engine.window().range(), Some(0..=2));

        surface.scroll_to(800.0, 0.0);
        let outcome = engine.on_scroll(&mut chapters, &mut surface);
        assert!(!outcome.extended_forward);
        assert_eq!(engine.window().range(), Some(0..=2));
    }

    #[test]
    fn test_extend_backward_preserves_anchor() {
        let (mut engine, mut chapters, mut surface) =
            setup(&[Some(130), Some(240), Some(500)]);
        engine.jump(2, &mut chapters, &mut surface);
        surface.scroll_to(15.0, 0.0);

        let outcome = engine.on_scroll(&mut chapters, &mut surface);
        assert!(outcome.extended_backward);
        assert_eq!(engine.window().range(), Some(1..=2));
        assert_eq!(surface.scroll_top(), 15.0 + 240.0);
        assert_eq!(surface.block_bounds(2).unwrap().top, 240.0);
    }

    #[test]
    fn test_jump_fills_minimum_extent() {
        let (mut engine, mut chapters, mut surface) =
            setup(&[Some(40), Some(40), Some(40), Some(40), Some(40), Some(40)]);
        engine.jump(1, &mut chapters, &mut surface);

        assert_eq!(engine.window().range(), Some(1..=4));
        assert!(surface.scroll_height() >= 150.0);
    }

    #[test]
    fn test_fill_minimum_stops_at_the_end_of_the_spine() {
        let (mut engine, mut chapters, mut surface) = setup(&[Some(40), Some(40), Some(10)]);
        engine.jump(2, &mut chapters, &mut surface);
        assert_eq!(engine.window().range(), Some(2..=2));
        assert_eq!(surface.scroll_height(), 10.0);
    }

    #[test]
    fn test_fill_minimum_stops_on_render_failure() {
        let (mut engine, mut chapters, mut surface) = setup(&[Some(40), None, Some(400)]);
        engine.jump(0, &mut chapters, &mut surface);
        assert_eq!(engine.window().range(), Some(0..=0));
        assert_eq!(chapters.rendered, vec![0, 1]);
    }

    #[test]
    fn test_jump_to_unrenderable_chapter_leaves_empty_window() {
        let (mut engine, mut chapters, mut surface) = setup(&[Some(300), None]);
        engine.jump(0, &mut chapters, &mut surface);
        assert!(!engine.jump(1, &mut chapters, &mut surface));
        assert!(engine.window().is_empty());
        assert_eq!(surface.scroll_height(), 0.0);
        assert!(!engine.jump(7, &mut chapters, &mut surface));
    }

    #[test]
    fn test_jump_releases_previous_resources() {
        let (mut engine, mut chapters, mut surface) = setup(&[Some(300), Some(300)]);
        engine.jump(0, &mut chapters, &mut surface);
        engine.jump(1, &mut chapters, &mut surface);
        assert_eq!(chapters.released, 2);
        assert_eq!(surface.indices(), vec![1]);
    }

    #[test]
    fn test_same_direction_extensions_do_not_overlap() {
        let (mut engine, mut chapters, mut surface) =
            setup(&[Some(300), Some(300), Some(300)]);
        engine.jump(1, &mut chapters, &mut surface);

        let forward = engine.begin_extend(Direction::Forward).unwrap();
        assert!(engine.begin_extend(Direction::Forward).is_none());
        let backward = engine.begin_extend(Direction::Backward).unwrap();
        assert!(engine.is_extending(Direction::Backward));

        let block = chapters.render(backward.index());
        assert!(engine.complete_extend(backward, block, &mut surface));
        let block = chapters.render(forward.index());
        assert!(engine.complete_extend(forward, block, &mut surface));

        assert_eq!(engine.window().range(), Some(0..=2));
        assert!(!engine.is_extending(Direction::Forward));
    }

    #[test]
    fn test_stale_completion_after_jump_is_dropped() {
        let (mut engine, mut chapters, mut surface) =
            setup(&[Some(300), Some(300), Some(300), Some(300)]);
        engine.jump(0, &mut chapters, &mut surface);
        let ticket = engine.begin_extend(Direction::Forward).unwrap();

        engine.jump(3, &mut chapters, &mut surface);
        let block = chapters.render(ticket.index());
        assert!(!engine.complete_extend(ticket, block, &mut surface));
        assert_eq!(engine.window().range(), Some(3..=3));
        assert_eq!(surface.indices(), vec![3]);
    }

    #[test]
    fn test_dominant_chapter_follows_viewport() {
        let (mut engine, mut chapters, mut surface) =
            setup(&[Some(300), Some(300), Some(300)]);
        engine.jump(0, &mut chapters, &mut surface);
        assert!(engine.is_observing());
        assert_eq!(engine.update_visibility(&surface), Some(0));
        assert_eq!(engine.update_visibility(&surface), None);

        surface.scroll_to(200.0, 0.0);
        engine.on_scroll(&mut chapters, &mut surface);
        surface.scroll_to(270.0, 0.0);
        // 30px of chapter 0 against 70px of the freshly observed chapter 1.
        assert_eq!(engine.update_visibility(&surface), Some(1));
        assert_eq!(engine.dominant(), Some(1));
    }

    #[test]
    fn test_scroll_to_fragment_requires_materialized_chapter() {
        let (mut engine, mut chapters, mut surface) = setup(&[Some(300), Some(300)]);
        engine.jump(0, &mut chapters, &mut surface);
        assert!(!engine.scroll_to_fragment(1, None, &mut surface));
        assert!(engine.scroll_to_fragment(0, None, &mut surface));
        assert!(!engine.scroll_to_fragment(0, Some("missing"), &mut surface));
    }
}
