use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::media::{MediaKind, MediaRecord};

/// Characters that are illegal in a path segment on at least one platform,
/// plus control characters.
static ILLEGAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\p{Cc}]"#).unwrap());

/// Destination subdirectory for a group of records.
///
/// Images: `image/<model>/<YYYYMMDD>`. Videos: `video/<YYYYMMDD>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    segments: Vec<String>,
}

impl PartitionKey {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Relative directory path. An empty model segment disappears here, so
    /// `image//20240102` lands in `image/20240102`.
    pub fn to_path(&self) -> PathBuf {
        self.segments.iter().filter(|s| !s.is_empty()).collect()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Derive the partition key of a record. Pure; no I/O.
pub fn build_key(record: &MediaRecord) -> PartitionKey {
    let date = record.created_at.format("%Y%m%d").to_string();
    let segments = match record.kind {
        MediaKind::Image => vec![
            record.kind.name().to_string(),
            sanitize_model(&record.model),
            date,
        ],
        MediaKind::Video => vec![record.kind.name().to_string(), date],
    };
    PartitionKey { segments }
}

/// Make a camera model safe to use as a directory name.
///
/// Strips `<>:"/\|?*` and control characters, normalizes to NFC and trims.
/// A result made only of dots would name the current or parent directory,
/// so it becomes empty.
pub fn sanitize_model(model: &str) -> String {
    let normalized: String = model.nfc().collect();
    let stripped = ILLEGAL_RE.replace_all(&normalized, "");
    let trimmed = stripped.trim();
    if trimmed.chars().all(|c| c == '.') {
        return String::new();
    }
    trimmed.to_string()
}
