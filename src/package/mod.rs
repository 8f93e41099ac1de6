//! Package resolution: container pointer, manifest and spine.
//!
//! The [`Package`] produced here is built once per load and shared read-only
//! by every other component for the lifetime of the loaded book.

mod opf;
mod path;
pub(crate) mod xml;

pub use opf::Metadata;
pub use path::{is_external, parent_dir, resolve_path, split_fragment};

use std::collections::HashMap;

use crate::archive::Archive;
use crate::error::{Error, Result};

const CONTAINER_PATH: &str = "META-INF/container.xml";
const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// A manifest entry with its archive path resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    /// Absolute archive path (`href` resolved against the package directory).
    pub resolved_path: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    /// Whether the whitespace-separated `properties` list contains `name`.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == name))
    }
}

/// One entry of the reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub id: String,
    pub href: String,
    pub resolved_path: String,
    pub linear: bool,
}

/// The parsed package document of a book.
#[derive(Debug, Clone)]
pub struct Package {
    /// Archive path of the package document (e.g. `OEBPS/content.opf`).
    pub root_path: String,
    pub metadata: Metadata,
    /// Manifest keyed by declared id. Duplicate ids: the last one wins.
    pub manifest: HashMap<String, ManifestItem>,
    pub spine: Vec<SpineItem>,
    /// Manifest id named by the spine's `toc` attribute.
    pub toc_id: Option<String>,
    /// Resolved archive path of the cover image, if declared.
    pub cover_path: Option<String>,
}

impl Package {
    /// Parse the package of an opened archive.
    ///
    /// Fails with [`Error::MalformedPackage`] when the container pointer is
    /// missing, names no package document, or the package document cannot be
    /// read or parsed. Nothing else is validated.
    pub fn parse(archive: &Archive) -> Result<Self> {
        let container = archive.read_text(CONTAINER_PATH).map_err(|e| match e {
            Error::MissingResource(_) => {
                Error::MalformedPackage(format!("{CONTAINER_PATH} not found"))
            }
            other => other,
        })?;
        let root_path = opf::parse_container(&container)?;

        let content = archive.read_text(&root_path).map_err(|e| match e {
            Error::MissingResource(_) => {
                Error::MalformedPackage(format!("package document {root_path} not found"))
            }
            other => other,
        })?;
        let opf = opf::parse_opf(&content)?;
        let base_dir = parent_dir(&root_path);

        let mut manifest = HashMap::with_capacity(opf.items.len());
        for item in opf.items {
            let resolved_path = resolve_path(base_dir, split_fragment(&item.href).0);
            manifest.insert(
                item.id.clone(),
                ManifestItem {
                    id: item.id,
                    href: item.href,
                    media_type: item.media_type,
                    resolved_path,
                    properties: item.properties,
                },
            );
        }

        let spine: Vec<SpineItem> = opf
            .itemrefs
            .iter()
            .filter_map(|itemref| {
                let Some(item) = manifest.get(&itemref.idref) else {
                    tracing::debug!(idref = %itemref.idref, "skipping itemref without manifest entry");
                    return None;
                };
                Some(SpineItem {
                    id: item.id.clone(),
                    href: item.href.clone(),
                    resolved_path: item.resolved_path.clone(),
                    linear: itemref.linear,
                })
            })
            .collect();

        let cover_path = manifest
            .values()
            .find(|item| item.has_property("cover-image"))
            .or_else(|| opf.cover_id.as_ref().and_then(|id| manifest.get(id)))
            .map(|item| item.resolved_path.clone());

        tracing::debug!(
            root = %root_path,
            manifest = manifest.len(),
            spine = spine.len(),
            "package parsed"
        );

        Ok(Self {
            root_path,
            metadata: opf.metadata,
            manifest,
            spine,
            toc_id: opf.toc_id,
            cover_path,
        })
    }

    /// Directory containing the package document.
    pub fn root_dir(&self) -> &str {
        parent_dir(&self.root_path)
    }

    /// Title, or a placeholder when the metadata has none.
    pub fn title(&self) -> &str {
        self.metadata.title.as_deref().unwrap_or(UNKNOWN_TITLE)
    }

    /// First author, or a placeholder when the metadata has none.
    pub fn author(&self) -> &str {
        self.metadata
            .authors
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_AUTHOR)
    }

    /// Spine index of the item whose resolved path is exactly `path`.
    pub fn spine_index_of(&self, path: &str) -> Option<usize> {
        self.spine.iter().position(|item| item.resolved_path == path)
    }

    /// Spine items marked `linear="no"` (notes, answer keys and the like).
    pub fn auxiliary_count(&self) -> usize {
        self.spine.iter().filter(|item| !item.linear).count()
    }
}
