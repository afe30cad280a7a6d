use std::io;
use std::path::Path;

use file_format::FileFormat;

use crate::media::MediaKind;

/// Content type of a classified file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniffed {
    pub kind: MediaKind,
    /// MIME type such as `image/jpeg` or `video/mp4`
    pub mime: String,
}

/// Map a MIME string to a media kind by its top-level type.
pub fn classify(mime: &str) -> Option<MediaKind> {
    if mime.starts_with("image/") {
        Some(MediaKind::Image)
    } else if mime.starts_with("video/") {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Probe a file's content type from its leading bytes.
///
/// Returns `Ok(None)` for anything that is neither an image nor a video.
/// When `extension_fallback` is set and the bytes match no known signature,
/// the file extension is consulted instead.
pub fn probe(path: &Path, extension_fallback: bool) -> io::Result<Option<Sniffed>> {
    let mime = match FileFormat::from_file(path)? {
        FileFormat::Empty => None,
        FileFormat::ArbitraryBinaryData if extension_fallback => mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string()),
        FileFormat::ArbitraryBinaryData => None,
        format => Some(format.media_type().to_string()),
    };

    Ok(mime.and_then(|mime| classify(&mime).map(|kind| Sniffed { kind, mime })))
}
