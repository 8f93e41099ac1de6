//! A loaded book: archive, package and table of contents.

use std::path::Path;
use std::sync::Arc;

use crate::archive::Archive;
use crate::error::Result;
use crate::nav::{NavEntry, build_toc};
use crate::package::Package;

/// An opened EPUB, parsed once and read-only afterwards.
pub struct Book {
    pub archive: Archive,
    pub package: Package,
    pub toc: Vec<NavEntry>,
}

impl Book {
    /// Open an EPUB file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_archive(Archive::open(path)?)
    }

    /// Open an EPUB held in memory, as handed over by the book store.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_archive(Archive::from_bytes(bytes)?)
    }

    /// Parse the package of an opened archive. The table of contents never
    /// fails the load; it is empty when unusable.
    pub fn from_archive(archive: Archive) -> Result<Self> {
        let package = Package::parse(&archive)?;
        let toc = build_toc(&archive, &package);
        tracing::debug!(
            title = package.title(),
            chapters = package.spine.len(),
            toc = toc.len(),
            "book loaded"
        );
        Ok(Self {
            archive,
            package,
            toc,
        })
    }

    pub fn title(&self) -> &str {
        self.package.title()
    }

    pub fn author(&self) -> &str {
        self.package.author()
    }

    pub fn chapter_count(&self) -> usize {
        self.package.spine.len()
    }

    /// Bytes of the cover image, if one is declared and present.
    pub fn cover_image(&self) -> Option<Vec<u8>> {
        let path = self.package.cover_path.as_deref()?;
        self.archive.read(path).ok()
    }
}
