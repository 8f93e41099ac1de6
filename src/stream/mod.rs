//! Continuous content stream: the chapter window, rendering and surfaces.
//!
//! The [`StreamEngine`] keeps a contiguous [`ChapterWindow`] of rendered
//! chapters on a [`Surface`], extends it as the viewport nears either end,
//! and reports which chapter currently dominates the viewport.

mod blob;
mod chapter;
mod engine;
mod surface;
mod window;

pub use blob::{Blob, BlobStore};
pub use chapter::{Anchor, ChapterBlock, ChapterRenderer, ChapterSource};
pub use engine::{Direction, ExtendTicket, ScrollOutcome, StreamEngine};
pub use surface::{BlockBounds, HeadlessSurface, Surface};
pub use window::ChapterWindow;
