//! Persistence collaborators: the book library and saved locations.
//!
//! The reader only reads archive bytes and writes [`ReadingStats`] and
//! location strings; the record schema belongs to the library.

mod json_dir;
mod memory;
mod record;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;
pub use record::{BookFormat, BookRecord, ReadingStats, RecordMetadata};

use crate::error::Result;

/// Storage of whole book records.
pub trait BookStore {
    fn get_record(&self, id: &str) -> Result<Option<BookRecord>>;
    fn put_record(&mut self, record: BookRecord) -> Result<()>;
    fn delete_record(&mut self, id: &str) -> Result<()>;
    fn list_records(&self) -> Result<Vec<BookRecord>>;
}

/// Storage of the `"<chapter>,<offset>"` location string per book.
pub trait LocationStore {
    fn get_location(&self, id: &str) -> Result<Option<String>>;
    fn set_location(&mut self, id: &str, value: &str) -> Result<()>;
}

/// A store providing both records and locations.
pub trait ReaderStore: BookStore + LocationStore {}

impl<T: BookStore + LocationStore> ReaderStore for T {}
