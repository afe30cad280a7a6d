use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::dedup::ContentHash;

/// Media class decided by the content sniffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// First segment of every partition key.
    pub fn name(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 1970-01-01 00:00:00, used whenever a capture time is missing.
pub fn epoch_zero() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// An accepted file waiting to be relocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Where the file lives in the source tree
    pub source: PathBuf,
    pub kind: MediaKind,
    /// Camera model as reported by the container, empty if none
    pub model: String,
    /// Capture time (epoch-zero when unknown)
    pub created_at: NaiveDateTime,
    /// File size in bytes when the record was created
    pub size: u64,
    /// Digest used by the duplicate filter
    pub hash: ContentHash,
    /// Position in walk order
    pub seq: u64,
}
