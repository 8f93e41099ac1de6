//! # scrollbook
//!
//! A continuous-scroll EPUB reading engine.
//!
//! Chapters are materialized lazily into a contiguous window as the reader
//! scrolls toward either edge, so arbitrarily long books stay cheap to
//! display. The engine tracks the dominant chapter, resolves internal links
//! with a back-stack, and persists the reading position and progress.
//!
//! ## Features
//!
//! - EPUB 2/3 package parsing (container, OPF, NCX and XHTML nav)
//! - Windowed chapter streaming with anchor-preserving backward extension
//! - Sanitized chapter content with images resolved to handles or data URIs
//! - Link navigation with history, full-book search
//! - Reading location and progress persistence behind a pluggable store
//!
//! ## Quick Start
//!
//! ```no_run
//! use scrollbook::{Command, MemoryStore, ReaderConfig, ReaderSession};
//! use scrollbook::stream::HeadlessSurface;
//!
//! let config = ReaderConfig::default();
//! let surface = HeadlessSurface::new(config.metrics);
//! let mut session = ReaderSession::new(Box::new(MemoryStore::new()), surface, config);
//!
//! let book = scrollbook::Book::open("book.epub").unwrap();
//! session.load_book("book", book, 0);
//! session.dispatch(Command::Scrolled { top: 2_000.0, left: 0.0 }, 100);
//!
//! for event in session.drain_events() {
//!     println!("{event:?}");
//! }
//! ```
//!
//! ## Searching
//!
//! ```no_run
//! let book = scrollbook::Book::open("book.epub").unwrap();
//! for hit in scrollbook::search(&book.archive, &book.package, "whale", 50, 40) {
//!     println!("{}: {}", hit.spine_index, hit.snippet);
//! }
//! ```

pub mod archive;
pub mod backend;
pub mod book;
pub mod config;
pub mod error;
pub mod nav;
pub mod navigation;
pub mod package;
pub mod position;
pub mod search;
pub mod session;
pub mod store;
pub mod stream;
pub mod text;
pub(crate) mod util;

pub use archive::Archive;
pub use backend::{Document, FlatDocument, PageImage, PageSource};
pub use book::Book;
pub use config::{ImageMode, ReaderConfig, TextMetrics};
pub use error::{Error, Result};
pub use nav::NavEntry;
pub use navigation::{HistoryEntry, LinkOutcome, NavigationController};
pub use package::Package;
pub use position::{PositionTracker, ReadingLocation};
pub use search::{SearchHit, search};
pub use session::{Command, ReaderEvent, ReaderSession};
pub use store::{
    BookFormat, BookRecord, BookStore, JsonDirStore, LocationStore, MemoryStore, ReaderStore,
};
pub use util::time_now_ms;
