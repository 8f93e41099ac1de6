//! The rendering-surface contract and a headless implementation.

use super::chapter::ChapterBlock;
use crate::config::TextMetrics;

/// Vertical extent of a materialized block in content coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockBounds {
    pub top: f64,
    pub height: f64,
}

impl BlockBounds {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// A scrollable container the engine materializes chapters into.
///
/// Inserting above the viewport must not move `scroll_top`; the engine
/// compensates for prepended height itself.
pub trait Surface {
    fn scroll_top(&self) -> f64;
    fn scroll_left(&self) -> f64;
    /// Total extent of the materialized content.
    fn scroll_height(&self) -> f64;
    /// Height of the viewport.
    fn client_height(&self) -> f64;
    /// Scroll to the given offsets, clamped to the scrollable range.
    fn scroll_to(&mut self, top: f64, left: f64);
    fn append(&mut self, block: ChapterBlock);
    fn prepend(&mut self, block: ChapterBlock);
    fn clear(&mut self);
    /// Bounds of the block of spine item `index`, if materialized.
    fn block_bounds(&self, index: usize) -> Option<BlockBounds>;
    /// Content offset of the element with id `fragment` inside block `index`.
    fn fragment_offset(&self, index: usize, fragment: &str) -> Option<f64>;
}

struct LaidOutBlock {
    block: ChapterBlock,
    height: f64,
}

/// A surface that lays blocks out with a fixed text-metrics model.
///
/// Used by the CLI and the tests: no pixels, but heights, offsets and
/// clamping behave like a real scroll container.
pub struct HeadlessSurface {
    metrics: TextMetrics,
    blocks: Vec<LaidOutBlock>,
    scroll_top: f64,
    scroll_left: f64,
}

impl HeadlessSurface {
    pub fn new(metrics: TextMetrics) -> Self {
        Self {
            metrics,
            blocks: Vec::new(),
            scroll_top: 0.0,
            scroll_left: 0.0,
        }
    }

    /// Materialized blocks, top to bottom.
    pub fn blocks(&self) -> impl Iterator<Item = &ChapterBlock> {
        self.blocks.iter().map(|b| &b.block)
    }

    /// Spine indices of the materialized blocks, top to bottom.
    pub fn indices(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.block.index).collect()
    }

    fn lines(&self, chars: usize) -> f64 {
        let per_line = self.metrics.chars_per_line.max(1);
        chars.div_ceil(per_line) as f64
    }

    fn measure(&self, block: &ChapterBlock) -> f64 {
        self.metrics.block_padding * 2.0
            + self.lines(block.text_len) * self.metrics.line_height
            + block.images as f64 * self.metrics.image_height
    }

    fn position_of(&self, index: usize) -> Option<(usize, f64)> {
        let mut top = 0.0;
        for (i, laid) in self.blocks.iter().enumerate() {
            if laid.block.index == index {
                return Some((i, top));
            }
            top += laid.height;
        }
        None
    }

    fn max_scroll_top(&self) -> f64 {
        (self.scroll_height() - self.client_height()).max(0.0)
    }

    /// Blocks are laid out to the viewport width, so nothing overflows.
    fn max_scroll_left(&self) -> f64 {
        0.0
    }
}

impl Surface for HeadlessSurface {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    fn scroll_height(&self) -> f64 {
        self.blocks.iter().map(|b| b.height).sum()
    }

    fn client_height(&self) -> f64 {
        self.metrics.viewport_height
    }

    fn scroll_to(&mut self, top: f64, left: f64) {
        self.scroll_top = top.clamp(0.0, self.max_scroll_top());
        self.scroll_left = left.clamp(0.0, self.max_scroll_left());
    }

    fn append(&mut self, block: ChapterBlock) {
        let height = self.measure(&block);
        self.blocks.push(LaidOutBlock { block, height });
    }

    fn prepend(&mut self, block: ChapterBlock) {
        let height = self.measure(&block);
        self.blocks.insert(0, LaidOutBlock { block, height });
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.scroll_top = 0.0;
        self.scroll_left = 0.0;
    }

    fn block_bounds(&self, index: usize) -> Option<BlockBounds> {
        let (i, top) = self.position_of(index)?;
        Some(BlockBounds {
            top,
            height: self.blocks[i].height,
        })
    }

    fn fragment_offset(&self, index: usize, fragment: &str) -> Option<f64> {
        let (i, top) = self.position_of(index)?;
        let anchor = self.blocks[i].block.anchors.iter().find(|a| a.id == fragment)?;
        Some(
            top + self.metrics.block_padding
                + (anchor.text_offset / self.metrics.chars_per_line.max(1)) as f64
                    * self.metrics.line_height
                + anchor.images_before as f64 * self.metrics.image_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::chapter::Anchor;

    fn metrics() -> TextMetrics {
        TextMetrics {
            viewport_height: 100.0,
            chars_per_line: 10,
            line_height: 10.0,
            image_height: 50.0,
            block_padding: 0.0,
        }
    }

    fn block(index: usize, text_len: usize) -> ChapterBlock {
        ChapterBlock {
            index,
            path: format!("c{index}.xhtml"),
            html: String::new(),
            text_len,
            images: 0,
            anchors: Vec::new(),
        }
    }

    #[test]
    fn test_append_and_prepend_layout() {
        let mut surface = HeadlessSurface::new(metrics());
        surface.append(block(1, 100));
        surface.append(block(2, 50));
        surface.prepend(block(0, 25));

        assert_eq!(surface.indices(), vec![0, 1, 2]);
        assert_eq!(surface.scroll_height(), 30.0 + 100.0 + 50.0);
        assert_eq!(
            surface.block_bounds(1),
            Some(BlockBounds {
                top: 30.0,
                height: 100.0
            })
        );
        assert_eq!(surface.block_bounds(7), None);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut surface = HeadlessSurface::new(metrics());
        surface.append(block(0, 150));
        surface.scroll_to(1_000.0, 20.0);
        assert_eq!(surface.scroll_top(), 50.0);
        assert_eq!(surface.scroll_left(), 0.0);
        surface.scroll_to(-5.0, 0.0);
        assert_eq!(surface.scroll_top(), 0.0);
    }

    #[test]
    fn test_prepend_keeps_scroll_top() {
        let mut surface = HeadlessSurface::new(metrics());
        surface.append(block(1, 300));
        surface.scroll_to(120.0, 0.0);
        surface.prepend(block(0, 100));
        assert_eq!(surface.scroll_top(), 120.0);
    }

    #[test]
    fn test_fragment_offset() {
        let mut surface = HeadlessSurface::new(metrics());
        surface.append(block(0, 40));
        let mut b = block(1, 100);
        b.images = 1;
        b.anchors.push(Anchor {
            id: "sec3".into(),
            text_offset: 35,
            images_before: 1,
        });
        surface.append(b);

        assert_eq!(surface.fragment_offset(1, "sec3"), Some(40.0 + 30.0 + 50.0));
        assert_eq!(surface.fragment_offset(1, "nope"), None);
        assert_eq!(surface.fragment_offset(0, "sec3"), None);
    }
}
