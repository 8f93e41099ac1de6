//! A store kept as JSON files in one directory.
//!
//! Each record lives in `<percent-encoded id>.json`; all locations share
//! `_locations.json`, which no encoded id can collide with. Files are
//! replaced through a temporary file and a rename so a crash never leaves a
//! half-written record.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use super::{BookRecord, BookStore, LocationStore};
use crate::error::{Error, Result};

const LOCATIONS_FILE: &str = "_locations.json";

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open (creating if needed) the store directory.
    ///
    /// Fails with [`Error::StoreUnavailable`] when the directory cannot be
    /// created or is not a directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| Error::StoreUnavailable(format!("{}: {e}", dir.display())))?;
        if !dir.is_dir() {
            return Err(Error::StoreUnavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        let name = utf8_percent_encode(id, NON_ALPHANUMERIC).to_string();
        self.dir.join(format!("{name}.json"))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_locations(&self) -> Result<BTreeMap<String, String>> {
        match fs::read(self.dir.join(LOCATIONS_FILE)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_locations(&self, locations: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(locations)?;
        self.write_atomic(&self.dir.join(LOCATIONS_FILE), &json)
    }
}

impl BookStore for JsonDirStore {
    fn get_record(&self, id: &str) -> Result<Option<BookRecord>> {
        match fs::read(self.record_path(id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_record(&mut self, record: BookRecord) -> Result<()> {
        let json = serde_json::to_vec(&record)?;
        self.write_atomic(&self.record_path(&record.id), &json)
    }

    fn delete_record(&mut self, id: &str) -> Result<()> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let mut locations = self.read_locations()?;
        if locations.remove(id).is_some() {
            self.write_locations(&locations)?;
        }
        Ok(())
    }

    fn list_records(&self) -> Result<Vec<BookRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if name == LOCATIONS_FILE {
                continue;
            }
            let id = percent_decode_str(stem).decode_utf8_lossy().into_owned();
            match self.get_record(&id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

impl LocationStore for JsonDirStore {
    fn get_location(&self, id: &str) -> Result<Option<String>> {
        Ok(self.read_locations()?.remove(id))
    }

    fn set_location(&mut self, id: &str, value: &str) -> Result<()> {
        let mut locations = self.read_locations()?;
        locations.insert(id.to_string(), value.to_string());
        self.write_locations(&locations)
    }
}
