//! Random-access ZIP archive reading.
//!
//! The central directory is scanned once when the archive is opened and the
//! location of every entry is cached. Entry reads afterwards go straight to
//! the byte source and decompress on demand, so an [`Archive`] can be shared
//! by reference between overlapping extractions.

mod cursor;
mod source;

pub use source::{ByteSource, FileSource, MemorySource};

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding};
use cursor::SourceCursor;

/// A read-only handle on a book archive.
pub struct Archive {
    source: Arc<dyn ByteSource>,
    entries: HashMap<String, EntryLoc>,
}

#[derive(Clone, Copy, Debug)]
struct EntryLoc {
    data_offset: u64,
    compressed_size: u64,
    method: Compression,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Compression {
    Stored,
    Deflated,
    Unsupported,
}

impl Archive {
    /// Open an archive file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_source(Arc::new(FileSource::new(file)?))
    }

    /// Open an archive held in memory.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_source(Arc::new(MemorySource::new(bytes)))
    }

    /// Scan the central directory of `source`.
    ///
    /// A source that is not a readable ZIP archive is reported as
    /// [`Error::MalformedPackage`].
    pub fn from_source(source: Arc<dyn ByteSource>) -> Result<Self> {
        let mut zip = ZipArchive::new(SourceCursor::new(source.clone()))
            .map_err(|e| Error::MalformedPackage(format!("unreadable archive: {e}")))?;

        let mut entries = HashMap::with_capacity(zip.len());
        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let method = match file.compression() {
                zip::CompressionMethod::Stored => Compression::Stored,
                zip::CompressionMethod::Deflated => Compression::Deflated,
                _ => Compression::Unsupported,
            };
            entries.insert(
                file.name().to_string(),
                EntryLoc {
                    data_offset: file.data_start(),
                    compressed_size: file.compressed_size(),
                    method,
                },
            );
        }

        tracing::debug!(entries = entries.len(), "archive indexed");
        Ok(Self { source, entries })
    }

    /// Whether an entry exists under `path` (exact or percent-decoded).
    pub fn contains(&self, path: &str) -> bool {
        self.locate(path).is_some()
    }

    /// Names of all file entries, in no particular order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Read and decompress the entry at `path`.
    ///
    /// Returns [`Error::MissingResource`] when no entry matches.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let loc = self
            .locate(path)
            .ok_or_else(|| Error::MissingResource(path.to_string()))?;

        let raw = self.source.read_at(loc.data_offset, loc.compressed_size as usize)?;
        match loc.method {
            Compression::Stored => Ok(raw),
            Compression::Deflated => {
                let mut decoder = flate2::read::DeflateDecoder::new(&raw[..]);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            Compression::Unsupported => Err(Error::UnsupportedFormat(format!(
                "compression method of {path}"
            ))),
        }
    }

    /// Read an entry as text, honoring the XML declaration's encoding.
    pub fn read_text(&self, path: &str) -> Result<String> {
        let bytes = self.read(path)?;
        let hint = extract_xml_encoding(&bytes);
        Ok(decode_text(&bytes, hint).into_owned())
    }

    fn locate(&self, path: &str) -> Option<EntryLoc> {
        if let Some(loc) = self.entries.get(path) {
            return Some(*loc);
        }
        // Some packages percent-encode hrefs while the zip names are raw.
        let decoded = percent_encoding::percent_decode_str(path).decode_utf8().ok()?;
        self.entries.get(decoded.as_ref()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, deflate) in entries {
            let method = if *deflate {
                zip::CompressionMethod::Deflated
            } else {
                zip::CompressionMethod::Stored
            };
            zip.start_file(*name, SimpleFileOptions::default().compression_method(method))
                .unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_stored_and_deflated_entries() {
        let bytes = build_zip(&[
            ("mimetype", b"application/epub+zip", false),
            ("OEBPS/ch1.xhtml", b"<html>chapter one</html>", true),
        ]);
        let archive = Archive::from_bytes(bytes).unwrap();

        assert_eq!(archive.read("mimetype").unwrap(), b"application/epub+zip");
        assert_eq!(
            archive.read("OEBPS/ch1.xhtml").unwrap(),
            b"<html>chapter one</html>"
        );
    }

    #[test]
    fn test_missing_entry_is_missing_resource() {
        let archive = Archive::from_bytes(build_zip(&[("a.txt", b"a", true)])).unwrap();
        assert!(matches!(
            archive.read("b.txt"),
            Err(Error::MissingResource(path)) if path == "b.txt"
        ));
    }

    #[test]
    fn test_percent_encoded_lookup_falls_back_to_decoded_name() {
        let archive =
            Archive::from_bytes(build_zip(&[("OEBPS/my chapter.xhtml", b"x", true)])).unwrap();
        assert!(archive.contains("OEBPS/my%20chapter.xhtml"));
        assert_eq!(archive.read("OEBPS/my%20chapter.xhtml").unwrap(), b"x");
    }

    #[test]
    fn test_not_a_zip_is_malformed_package() {
        let result = Archive::from_bytes(b"definitely not a zip".to_vec());
        assert!(matches!(result, Err(Error::MalformedPackage(_))));
    }

    #[test]
    fn test_read_text_strips_bom() {
        let archive = Archive::from_bytes(build_zip(&[(
            "t.xml",
            b"\xEF\xBB\xBF<?xml version=\"1.0\"?><a/>",
            true,
        )]))
        .unwrap();
        assert!(archive.read_text("t.xml").unwrap().starts_with("<?xml"));
    }
}
