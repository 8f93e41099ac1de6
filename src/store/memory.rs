use std::collections::HashMap;

use super::{BookRecord, BookStore, LocationStore};
use crate::error::Result;

/// Volatile store, for tests and sessions without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, BookRecord>,
    locations: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookStore for MemoryStore {
    fn get_record(&self, id: &str) -> Result<Option<BookRecord>> {
        Ok(self.records.get(id).cloned())
    }

    fn put_record(&mut self, record: BookRecord) -> Result<()> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete_record(&mut self, id: &str) -> Result<()> {
        self.records.remove(id);
        self.locations.remove(id);
        Ok(())
    }

    fn list_records(&self) -> Result<Vec<BookRecord>> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

impl LocationStore for MemoryStore {
    fn get_location(&self, id: &str) -> Result<Option<String>> {
        Ok(self.locations.get(id).cloned())
    }

    fn set_location(&mut self, id: &str, value: &str) -> Result<()> {
        self.locations.insert(id.to_string(), value.to_string());
        Ok(())
    }
}
