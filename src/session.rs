//! The reader session: one loaded document and everything acting on it.
//!
//! Input arrives as [`Command`]s, queued and handled one at a time. Work that
//! has to wait for content to settle (fragment scrolling, history offset
//! restoration) becomes a timestamped deferred action run by
//! [`ReaderSession::tick`]; each one remembers the engine generation it was
//! scheduled in and is dropped if a jump superseded it. Effects meant for the
//! UI come out as [`ReaderEvent`]s.

use std::collections::VecDeque;

use crate::backend::{Document, FlatDocument, PageSource};
use crate::book::Book;
use crate::config::ReaderConfig;
use crate::error::{Error, Result};
use crate::nav::highlight_for;
use crate::navigation::{HistoryEntry, LinkOutcome, NavigationController};
use crate::position::{PositionTracker, ReadingLocation};
use crate::store::{BookFormat, ReaderStore};
use crate::stream::{BlobStore, ChapterWindow, StreamEngine, Surface};

/// Input to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// The viewport moved to the given offsets.
    Scrolled { top: f64, left: f64 },
    /// Show spine item (or page) `n` from its start.
    Jump(usize),
    /// A link in the content was activated.
    ActivateLink(String),
    PopHistory,
    /// Entry `n` of the table of contents was selected.
    SelectToc(usize),
    /// A search hit in spine item `n` was selected.
    SelectSearchResult(usize),
    /// Persist pending progress now (pointer release, unload).
    Flush,
    Suspend,
    Resume,
}

/// Output of a session, for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// The dominant chapter changed. `label` comes from the table of contents.
    ChapterChanged {
        index: usize,
        label: Option<String>,
    },
    /// Table of contents entry to highlight.
    TocHighlight(Option<usize>),
    /// An external link should be opened outside the reader.
    OpenExternal(String),
    LoadFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
enum DeferredKind {
    ScrollToFragment {
        index: usize,
        fragment: Option<String>,
    },
    RestoreOffsets {
        top: f64,
        left: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Deferred {
    due_ms: u64,
    generation: u64,
    kind: DeferredKind,
}

struct Loaded {
    document: Document,
    tracker: PositionTracker,
}

/// Owns a loaded document, its surface, the store and the navigation state.
pub struct ReaderSession<S: Surface> {
    config: ReaderConfig,
    surface: S,
    store: Box<dyn ReaderStore>,
    nav: NavigationController,
    loaded: Option<Loaded>,
    queue: VecDeque<Command>,
    deferred: Vec<Deferred>,
    events: Vec<ReaderEvent>,
}

impl<S: Surface> ReaderSession<S> {
    pub fn new(store: Box<dyn ReaderStore>, surface: S, config: ReaderConfig) -> Self {
        Self {
            config,
            surface,
            store,
            nav: NavigationController::new(),
            loaded: None,
            queue: VecDeque::new(),
            deferred: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Load book `book_id` from the store.
    ///
    /// On failure a [`ReaderEvent::LoadFailed`] is emitted, the previous
    /// document stays unloaded and the error is returned.
    pub fn load(&mut self, book_id: &str, now_ms: u64) -> Result<()> {
        let result = self.load_from_store(book_id, now_ms);
        if let Err(e) = &result {
            tracing::warn!(book = book_id, error = %e, "load failed");
            self.events.push(ReaderEvent::LoadFailed(e.to_string()));
        }
        result
    }

    fn load_from_store(&mut self, book_id: &str, now_ms: u64) -> Result<()> {
        self.unload(now_ms);
        let record = self
            .store
            .get_record(book_id)
            .map_err(|e| match e {
                Error::StoreUnavailable(_) => e,
                other => Error::StoreUnavailable(other.to_string()),
            })?
            .ok_or_else(|| Error::MissingResource(format!("book {book_id}")))?;

        match record.format {
            BookFormat::Epub => {
                let book = Book::from_bytes(record.data)?;
                self.load_book(book_id, book, now_ms);
                Ok(())
            }
            BookFormat::Pdf => Err(Error::UnsupportedFormat(
                "fixed-page documents need a page renderer".into(),
            )),
        }
    }

    /// Start reading an already parsed book.
    ///
    /// Restores the saved location when it is valid for this spine and
    /// starts at the first chapter otherwise.
    pub fn load_book(&mut self, book_id: &str, book: Book, now_ms: u64) {
        self.unload(now_ms);
        let total = book.chapter_count();
        let tracker =
            PositionTracker::new(book_id, total, self.config.progress_throttle_ms, now_ms);
        let start = tracker
            .restore(self.store.as_ref())
            .unwrap_or(ReadingLocation::new(0, 0.0));

        let mut document = Document::Windowed {
            book: Box::new(book),
            engine: StreamEngine::new(total, &self.config),
            blobs: BlobStore::new(self.config.image_mode),
        };
        if let Some((engine, mut renderer, _)) = document.windowed_parts()
            && total > 0
        {
            engine.jump(start.chapter_index, &mut renderer, &mut self.surface);
        }
        self.loaded = Some(Loaded { document, tracker });

        if start.scroll_offset > 0.0 {
            self.reach_offset(start.scroll_offset);
            let left = self.surface.scroll_left();
            self.surface.scroll_to(start.scroll_offset, left);
        }
        tracing::debug!(book = book_id, chapter = start.chapter_index, "session started");
        self.viewport_changed(now_ms, false);
    }

    /// Start reading a fixed-page document. All pages are rendered now.
    pub fn load_pages(&mut self, book_id: &str, source: &mut dyn PageSource, now_ms: u64) {
        self.unload(now_ms);
        let page_height =
            self.config.metrics.image_height + 2.0 * self.config.metrics.block_padding;
        let flat = FlatDocument::load(source, page_height);
        let total = flat.page_count();
        flat.materialize(&mut self.surface);

        let tracker =
            PositionTracker::new(book_id, total, self.config.progress_throttle_ms, now_ms);
        if let Some(start) = tracker.restore(self.store.as_ref()) {
            let left = self.surface.scroll_left();
            self.surface.scroll_to(start.scroll_offset, left);
        }
        self.loaded = Some(Loaded {
            document: Document::Flat(flat),
            tracker,
        });
        self.viewport_changed(now_ms, false);
    }

    /// Flush and account the current session, then drop the document.
    fn unload(&mut self, now_ms: u64) {
        if let Some(mut loaded) = self.loaded.take() {
            loaded.tracker.suspend(self.store.as_mut(), now_ms);
        }
        self.nav.clear_history();
        self.deferred.clear();
        self.queue.clear();
        self.surface.clear();
    }

    pub fn submit(&mut self, command: Command) {
        self.queue.push_back(command);
    }

    /// Handle every queued command, oldest first.
    pub fn process(&mut self, now_ms: u64) {
        while let Some(command) = self.queue.pop_front() {
            self.handle(command, now_ms);
        }
    }

    /// Queue `command` and process the queue.
    pub fn dispatch(&mut self, command: Command, now_ms: u64) {
        self.submit(command);
        self.process(now_ms);
    }

    /// Run deferred actions that are due at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.deferred)
            .into_iter()
            .partition(|action| action.due_ms <= now_ms);
        self.deferred = pending;
        due.sort_by_key(|action| action.due_ms);

        for action in due {
            if action.generation != self.generation() {
                tracing::debug!(kind = ?action.kind, "dropping deferred action from a superseded window");
                continue;
            }
            match action.kind {
                DeferredKind::ScrollToFragment { index, fragment } => {
                    if let Some(Loaded {
                        document: Document::Windowed { engine, .. },
                        ..
                    }) = &self.loaded
                    {
                        engine.scroll_to_fragment(index, fragment.as_deref(), &mut self.surface);
                    }
                }
                DeferredKind::RestoreOffsets { top, left } => {
                    self.reach_offset(top);
                    self.surface.scroll_to(top, left);
                }
            }
            self.viewport_changed(now_ms, true);
        }
    }

    /// Events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<ReaderEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ReaderStore {
        self.store.as_ref()
    }

    pub fn book(&self) -> Option<&Book> {
        match &self.loaded.as_ref()?.document {
            Document::Windowed { book, .. } => Some(book),
            Document::Flat(_) => None,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.loaded.as_ref().map(|loaded| &loaded.document)
    }

    /// Materialized chapters. Always empty for fixed-page documents.
    pub fn window(&self) -> ChapterWindow {
        match self.loaded.as_ref().map(|l| &l.document) {
            Some(Document::Windowed { engine, .. }) => engine.window(),
            _ => ChapterWindow::empty(),
        }
    }

    pub fn current_position(&self) -> Option<ReadingLocation> {
        self.loaded
            .as_ref()?
            .document
            .current_position(&self.surface)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.nav.history()
    }

    /// Deferred actions not yet run.
    pub fn pending_actions(&self) -> usize {
        self.deferred.len()
    }

    fn generation(&self) -> u64 {
        match self.loaded.as_ref().map(|l| &l.document) {
            Some(Document::Windowed { engine, .. }) => engine.generation(),
            _ => 0,
        }
    }

    fn defer(&mut self, delay_ms: u64, now_ms: u64, kind: DeferredKind) {
        let action = Deferred {
            due_ms: now_ms + delay_ms,
            generation: self.generation(),
            kind,
        };
        self.deferred.push(action);
    }

    fn handle(&mut self, command: Command, now_ms: u64) {
        let Some(loaded) = self.loaded.as_mut() else {
            tracing::debug!(?command, "no document loaded, ignoring command");
            return;
        };
        tracing::trace!(?command, "handling command");

        match command {
            Command::Scrolled { top, left } => {
                self.surface.scroll_to(top, left);
                self.viewport_changed(now_ms, true);
            }
            Command::Jump(index) | Command::SelectSearchResult(index) => {
                self.jump(index, None, now_ms);
            }
            Command::SelectToc(entry) => {
                let target = self
                    .book()
                    .and_then(|book| book.toc.get(entry))
                    .map(|e| (e.spine_index, e.fragment.clone()));
                match target {
                    Some((index, fragment)) => self.jump(index, fragment, now_ms),
                    None => tracing::debug!(entry, "no such table of contents entry"),
                }
            }
            Command::ActivateLink(href) => self.activate_link(&href, now_ms),
            Command::PopHistory => {
                let Document::Windowed {
                    book,
                    engine,
                    blobs,
                } = &mut loaded.document
                else {
                    return;
                };
                let mut renderer =
                    crate::stream::ChapterRenderer::new(&book.archive, &book.package, blobs);
                if let Some(entry) = self.nav.pop_history(engine, &mut renderer, &mut self.surface)
                {
                    self.defer(
                        self.config.history_restore_delay_ms,
                        now_ms,
                        DeferredKind::RestoreOffsets {
                            top: entry.scroll_top,
                            left: entry.scroll_left,
                        },
                    );
                    self.viewport_changed(now_ms, false);
                }
            }
            Command::Flush => loaded.tracker.flush(self.store.as_mut(), now_ms),
            Command::Suspend => loaded.tracker.suspend(self.store.as_mut(), now_ms),
            Command::Resume => loaded.tracker.resume(now_ms),
        }
    }

    fn jump(&mut self, index: usize, fragment: Option<String>, now_ms: u64) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        if let Document::Flat(flat) = &loaded.document {
            if index < flat.page_count() {
                let top = index as f64 * flat.page_height();
                let left = self.surface.scroll_left();
                self.surface.scroll_to(top, left);
            }
        } else {
            let jumped = match loaded.document.windowed_parts() {
                Some((engine, mut renderer, _)) => {
                    engine.jump(index, &mut renderer, &mut self.surface)
                }
                None => false,
            };
            if jumped && fragment.is_some() {
                self.defer(
                    self.config.fragment_scroll_delay_ms,
                    now_ms,
                    DeferredKind::ScrollToFragment { index, fragment },
                );
            }
        }
        self.viewport_changed(now_ms, false);
    }

    fn activate_link(&mut self, href: &str, now_ms: u64) {
        let Some(Loaded {
            document: Document::Windowed {
                book,
                engine,
                blobs,
            },
            ..
        }) = self.loaded.as_mut()
        else {
            return;
        };
        let Some(active) = engine.dominant().or(engine.window().lo()) else {
            return;
        };
        let mut renderer = crate::stream::ChapterRenderer::new(&book.archive, &book.package, blobs);
        let outcome = self.nav.handle_link_activation(
            href,
            active,
            &book.package,
            engine,
            &mut renderer,
            &mut self.surface,
        );

        match outcome {
            LinkOutcome::External(url) => self.events.push(ReaderEvent::OpenExternal(url)),
            LinkOutcome::Jumped { index, fragment } => {
                if fragment.is_some() {
                    self.defer(
                        self.config.fragment_scroll_delay_ms,
                        now_ms,
                        DeferredKind::ScrollToFragment { index, fragment },
                    );
                }
                self.viewport_changed(now_ms, false);
            }
            LinkOutcome::ScrolledWithin { .. } => self.viewport_changed(now_ms, true),
            LinkOutcome::Unresolved => {}
        }
    }

    /// Materialize forward until a viewport at `offset` fits, so restoring
    /// it is not clamped. Stops at the end of the spine.
    fn reach_offset(&mut self, offset: f64) {
        if let Some(loaded) = self.loaded.as_mut()
            && let Some((engine, mut renderer, _)) = loaded.document.windowed_parts()
            && !engine.extend_to_reach(offset, &mut renderer, &mut self.surface)
        {
            tracing::debug!(offset, "offset lies past the end of the content");
        }
    }

    /// Follow-up of any viewport change: extend the window when `extend` is
    /// set, recompute the dominant chapter, and record the position.
    fn viewport_changed(&mut self, now_ms: u64, extend: bool) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };

        if let Some((engine, mut renderer, book)) = loaded.document.windowed_parts() {
            let changed = if extend {
                engine.on_scroll(&mut renderer, &mut self.surface).dominant_changed
            } else {
                engine.update_visibility(&self.surface)
            };
            if let Some(index) = changed {
                let highlight = highlight_for(&book.toc, index);
                let label = highlight
                    .map(|i| &book.toc[i])
                    .filter(|entry| entry.spine_index == index)
                    .map(|entry| entry.label.clone());
                self.events.push(ReaderEvent::ChapterChanged { index, label });
                self.events.push(ReaderEvent::TocHighlight(highlight));
            }
        }

        if let Some(location) = loaded.document.current_position(&self.surface) {
            loaded.tracker.update(
                self.store.as_mut(),
                location.chapter_index,
                location.scroll_offset,
                now_ms,
            );
        }
    }
}
