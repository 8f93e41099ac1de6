//! Local handles for images extracted from the archive.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::config::ImageMode;

const HANDLE_PREFIX: &str = "blob:scrollbook/";

/// Bytes registered under a handle.
#[derive(Debug, Clone)]
pub struct Blob {
    pub mime: &'static str,
    pub data: Arc<[u8]>,
}

/// Registry of extracted image bytes.
///
/// Handles stay valid until [`BlobStore::revoke_all`], which the engine calls
/// whenever a jump clears the surface.
#[derive(Debug, Default)]
pub struct BlobStore {
    mode: ImageMode,
    next_id: u64,
    blobs: HashMap<String, Blob>,
}

impl BlobStore {
    pub fn new(mode: ImageMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Make `data` addressable and return the reference to put in the markup.
    pub fn register(&mut self, mime: &'static str, data: Vec<u8>) -> String {
        match self.mode {
            ImageMode::DataUri => format!("data:{mime};base64,{}", STANDARD.encode(&data)),
            ImageMode::Handles => {
                let handle = format!("{HANDLE_PREFIX}{}", self.next_id);
                self.next_id += 1;
                self.blobs.insert(
                    handle.clone(),
                    Blob {
                        mime,
                        data: data.into(),
                    },
                );
                handle
            }
        }
    }

    pub fn get(&self, handle: &str) -> Option<&Blob> {
        self.blobs.get(handle)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn revoke_all(&mut self) {
        if !self.blobs.is_empty() {
            tracing::debug!(count = self.blobs.len(), "revoking image handles");
        }
        self.blobs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique_and_revocable() {
        let mut store = BlobStore::new(ImageMode::Handles);
        let a = store.register("image/png", vec![1, 2, 3]);
        let b = store.register("image/png", vec![4]);

        assert_ne!(a, b);
        assert!(a.starts_with("blob:scrollbook/"));
        assert_eq!(&*store.get(&a).unwrap().data, &[1, 2, 3]);
        assert_eq!(store.len(), 2);

        store.revoke_all();
        assert!(store.get(&a).is_none());
        assert!(store.is_empty());

        // Numbering continues so a stale handle never aliases a new image.
        let c = store.register("image/gif", vec![5]);
        assert_ne!(c, a);
    }

    #[test]
    fn test_data_uri_mode() {
        let mut store = BlobStore::new(ImageMode::DataUri);
        let uri = store.register("image/png", b"abc".to_vec());
        assert_eq!(uri, "data:image/png;base64,YWJj");
        assert!(store.is_empty());
    }
}
