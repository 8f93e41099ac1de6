//! Reading location and progress persistence.

use std::fmt;
use std::str::FromStr;

use crate::store::ReaderStore;

const ONE_DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Durable reading position: a chapter and a scroll offset.
///
/// Stored as `"<chapter>,<rounded offset>"`:
///
/// ```
/// use scrollbook::ReadingLocation;
///
/// let location = ReadingLocation::new(3, 1250.6);
/// assert_eq!(location.to_string(), "3,1251");
/// assert_eq!("3,1251".parse::<ReadingLocation>().unwrap().chapter_index, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingLocation {
    pub chapter_index: usize,
    pub scroll_offset: f64,
}

impl ReadingLocation {
    /// Negative or non-finite offsets are stored as 0.
    pub fn new(chapter_index: usize, scroll_offset: f64) -> Self {
        let scroll_offset = if scroll_offset.is_finite() {
            scroll_offset.max(0.0)
        } else {
            0.0
        };
        Self {
            chapter_index,
            scroll_offset,
        }
    }

    /// Parse a stored location, rejecting chapters outside `0..total`.
    pub fn decode(value: &str, total: usize) -> Option<Self> {
        value
            .parse::<Self>()
            .ok()
            .filter(|location| location.chapter_index < total)
    }
}

impl fmt::Display for ReadingLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.chapter_index, self.scroll_offset.round() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLocationError;

impl fmt::Display for ParseLocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid reading location")
    }
}

impl std::error::Error for ParseLocationError {}

impl FromStr for ReadingLocation {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chapter, offset) = s.trim().split_once(',').ok_or(ParseLocationError)?;
        let chapter = chapter.trim().parse::<usize>().map_err(|_| ParseLocationError)?;
        let offset = offset.trim().parse::<f64>().map_err(|_| ParseLocationError)?;
        if !offset.is_finite() || offset < 0.0 {
            return Err(ParseLocationError);
        }
        Ok(Self::new(chapter, offset))
    }
}

/// Tracks the reading position of one book and persists it.
///
/// Locations are written on every update. Progress is throttled, never
/// regresses, and is flushed on demand. Store failures are logged and
/// otherwise ignored.
#[derive(Debug)]
pub struct PositionTracker {
    book_id: String,
    total: usize,
    throttle_ms: u64,
    last_progress_write: Option<u64>,
    pending_progress: Option<f64>,
    session_start: u64,
    last_location: Option<ReadingLocation>,
}

impl PositionTracker {
    pub fn new(book_id: impl Into<String>, total: usize, throttle_ms: u64, now_ms: u64) -> Self {
        Self {
            book_id: book_id.into(),
            total,
            throttle_ms,
            last_progress_write: None,
            pending_progress: None,
            session_start: now_ms,
            last_location: None,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn last_location(&self) -> Option<ReadingLocation> {
        self.last_location
    }

    /// Saved location of the book, if it is valid for this spine.
    pub fn restore(&self, store: &dyn ReaderStore) -> Option<ReadingLocation> {
        let value = match store.get_location(&self.book_id) {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!(book = %self.book_id, error = %e, "could not read saved location");
                return None;
            }
        };
        let location = ReadingLocation::decode(&value, self.total);
        if location.is_none() {
            tracing::debug!(book = %self.book_id, value = %value, "ignoring invalid saved location");
        }
        location
    }

    /// Record the current position.
    ///
    /// `chapter_index` is the first materialized chapter. Progress is
    /// `chapter_index / total`.
    pub fn update(
        &mut self,
        store: &mut dyn ReaderStore,
        chapter_index: usize,
        scroll_offset: f64,
        now_ms: u64,
    ) {
        if chapter_index >= self.total {
            return;
        }
        let location = ReadingLocation::new(chapter_index, scroll_offset);
        self.last_location = Some(location);
        if let Err(e) = store.set_location(&self.book_id, &location.to_string()) {
            tracing::warn!(book = %self.book_id, error = %e, "could not save location");
        }

        let progress = chapter_index as f64 / self.total as f64;
        self.pending_progress = Some(self.pending_progress.map_or(progress, |p| p.max(progress)));
        let due = self
            .last_progress_write
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.throttle_ms);
        if due {
            self.flush(store, now_ms);
        }
    }

    /// Write pending progress now, bypassing the throttle.
    pub fn flush(&mut self, store: &mut dyn ReaderStore, now_ms: u64) {
        let Some(progress) = self.pending_progress.take() else {
            return;
        };
        self.last_progress_write = Some(now_ms);
        self.write_stats(store, now_ms, |stats| {
            stats.progress = stats.progress.max(progress).clamp(0.0, 1.0);
        });
    }

    /// Account the time read since the session (re)started.
    ///
    /// Only a plausible elapsed time (more than zero, less than a day) is
    /// added. The session start moves to `now_ms` either way, so a second
    /// suspend without a resume only adds the time since the first.
    pub fn suspend(&mut self, store: &mut dyn ReaderStore, now_ms: u64) {
        self.flush(store, now_ms);
        let elapsed = now_ms.checked_sub(self.session_start);
        self.session_start = now_ms;
        match elapsed {
            Some(elapsed) if elapsed > 0 && elapsed < ONE_DAY_MS => {
                self.write_stats(store, now_ms, |stats| {
                    stats.total_time_ms = stats.total_time_ms.saturating_add(elapsed);
                });
            }
            _ => tracing::debug!(?elapsed, "ignoring implausible session duration"),
        }
    }

    pub fn resume(&mut self, now_ms: u64) {
        self.session_start = now_ms;
    }

    fn write_stats(
        &self,
        store: &mut dyn ReaderStore,
        now_ms: u64,
        apply: impl FnOnce(&mut crate::store::ReadingStats),
    ) {
        let mut record = match store.get_record(&self.book_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(book = %self.book_id, "no library record, stats not saved");
                return;
            }
            Err(e) => {
                tracing::warn!(book = %self.book_id, error = %e, "could not read library record");
                return;
            }
        };
        apply(&mut record.stats);
        record.stats.last_read = Some(now_ms);
        if let Err(e) = store.put_record(record) {
            tracing::warn!(book = %self.book_id, error = %e, "could not save reading stats");
        }
    }
}
