//! Error types for scrollbook operations.

use thiserror::Error;

/// Errors that can occur while loading, rendering or persisting a book.
///
/// Package-level failures ([`Error::MalformedPackage`]) abort a load.
/// Resource-level failures ([`Error::MissingResource`]) are usually swallowed
/// by the caller with a best-effort fallback, and [`Error::StoreUnavailable`]
/// only affects operations that need persistence.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed package: {0}")]
    MalformedPackage(String),

    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
