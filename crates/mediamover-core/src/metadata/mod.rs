pub mod exif;
pub mod mp4;

use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::media::{epoch_zero, MediaKind};
use crate::sniff::Sniffed;

/// Normalized capture metadata for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Camera model, empty when the container names none
    pub model: String,
    /// Capture time, epoch-zero when the container has none
    pub created_at: NaiveDateTime,
}

/// Why a file's metadata could not be read.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("cannot read file: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt EXIF data: {0}")]
    Exif(#[from] ::exif::Error),

    #[error("malformed Date/Time value {0:?}")]
    Timestamp(String),

    #[error("malformed container: {0}")]
    Container(String),
}

/// Read model and capture time from an image or video container.
///
/// A missing timestamp is not an error: the record gets epoch-zero. A
/// timestamp that is present but unparsable, or a container that cannot be
/// decoded, is.
pub fn extract(path: &Path, sniffed: &Sniffed) -> Result<Metadata, ExtractionError> {
    match sniffed.kind {
        MediaKind::Image => {
            let tags = exif::read_tags(path)?;
            Ok(Metadata {
                model: tags.model.unwrap_or_default(),
                created_at: tags.created_at.unwrap_or_else(epoch_zero),
            })
        }
        MediaKind::Video => {
            let created_at = if mp4::is_iso_bmff(&sniffed.mime) {
                mp4::read_times(path)?.creation_time()
            } else {
                None
            };
            Ok(Metadata {
                model: String::new(),
                created_at: created_at.unwrap_or_else(epoch_zero),
            })
        }
    }
}
