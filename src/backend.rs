//! Format backends behind a reader session.
//!
//! A session holds exactly one [`Document`], chosen when the book is
//! loaded: reflowable EPUBs stream through the windowed engine, fixed-page
//! documents are rendered page by page up front.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::book::Book;
use crate::error::Result;
use crate::position::ReadingLocation;
use crate::stream::{BlobStore, ChapterBlock, ChapterRenderer, StreamEngine, Surface};

/// A fixed-page document renderer (e.g. PDF).
pub trait PageSource {
    fn number_of_pages(&self) -> usize;

    /// Render page `n` (0-based) to an encoded image.
    fn render_page(&mut self, n: usize) -> Result<PageImage>;
}

/// A rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    pub mime: String,
    pub data: Vec<u8>,
}

/// A fixed-page document with all pages loaded.
pub struct FlatDocument {
    pages: Vec<Option<PageImage>>,
    page_height: f64,
}

impl FlatDocument {
    /// Render every page. A page that fails is kept as a blank slot so page
    /// numbers stay aligned.
    pub fn load(source: &mut dyn PageSource, page_height: f64) -> Self {
        let count = source.number_of_pages();
        let pages = (0..count)
            .map(|n| match source.render_page(n) {
                Ok(page) => Some(page),
                Err(e) => {
                    tracing::warn!(page = n, error = %e, "page render failed");
                    None
                }
            })
            .collect();
        tracing::debug!(pages = count, "flat document loaded");
        Self { pages, page_height }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, n: usize) -> Option<&PageImage> {
        self.pages.get(n)?.as_ref()
    }

    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    /// Put every page on `surface`, one block per page.
    ///
    /// Failed pages still get a block so the page grid stays regular.
    pub fn materialize(&self, surface: &mut dyn Surface) {
        surface.clear();
        for (n, page) in self.pages.iter().enumerate() {
            let html = page.as_ref().map_or_else(String::new, |page| {
                format!(
                    r#"<img src="data:{};base64,{}" alt="Page {}"/>"#,
                    page.mime,
                    STANDARD.encode(&page.data),
                    n + 1
                )
            });
            surface.append(ChapterBlock {
                index: n,
                path: format!("page-{}", n + 1),
                html,
                text_len: 0,
                images: 1,
                anchors: Vec::new(),
            });
        }
    }

    /// Page at a scroll offset. `None` for an empty document.
    pub fn page_at(&self, scroll_offset: f64) -> Option<usize> {
        let last = self.pages.len().checked_sub(1)?;
        if self.page_height <= 0.0 {
            return Some(0);
        }
        Some(((scroll_offset.max(0.0) / self.page_height) as usize).min(last))
    }
}

/// The loaded document of a session.
pub enum Document {
    /// Reflowable book, materialized through a chapter window.
    Windowed {
        book: Box<Book>,
        engine: StreamEngine,
        blobs: BlobStore,
    },
    /// Fixed pages, no windowing.
    Flat(FlatDocument),
}

impl Document {
    /// Current position as stored: first materialized chapter (or page under
    /// the viewport) and the scroll offset.
    pub fn current_position(&self, surface: &dyn Surface) -> Option<ReadingLocation> {
        let offset = surface.scroll_top();
        match self {
            Document::Windowed { engine, .. } => engine
                .window()
                .lo()
                .map(|lo| ReadingLocation::new(lo, offset)),
            Document::Flat(doc) => doc
                .page_at(offset)
                .map(|page| ReadingLocation::new(page, offset)),
        }
    }

    /// Renderer and engine of a windowed document, borrowed together.
    pub fn windowed_parts(&mut self) -> Option<(&mut StreamEngine, ChapterRenderer<'_>, &Book)> {
        match self {
            Document::Windowed {
                book,
                engine,
                blobs,
            } => {
                let book: &Book = book;
                Some((
                    engine,
                    ChapterRenderer::new(&book.archive, &book.package, blobs),
                    book,
                ))
            }
            Document::Flat(_) => None,
        }
    }
}
