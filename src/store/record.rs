//! Book records as kept by the library store.

use serde::{Deserialize, Serialize};

/// Archive format of a stored book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Epub,
    Pdf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub title: String,
    pub author: String,
}

/// Reading statistics, the only part of a record the reader writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingStats {
    pub total_time_ms: u64,
    /// Fraction of the book reached, in `[0, 1]`.
    pub progress: f64,
    /// Milliseconds since the Unix epoch of the last stats write.
    pub last_read: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub format: BookFormat,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub metadata: RecordMetadata,
    #[serde(default)]
    pub stats: ReadingStats,
}

impl BookRecord {
    pub fn new(id: impl Into<String>, format: BookFormat, data: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            format,
            data,
            metadata: RecordMetadata::default(),
            stats: ReadingStats::default(),
        }
    }
}

/// Archive bytes as a base64 string in JSON.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
