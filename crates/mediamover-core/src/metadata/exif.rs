use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{Field, Reader, Tag, Value};

use super::ExtractionError;

/// Layout of the EXIF `DateTime` tag.
pub const DATE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// The two tags the organizer cares about.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageTags {
    pub model: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// Read `Model` and `DateTime` from every IFD of an image.
///
/// Files without an EXIF block, and formats that cannot carry one, produce
/// empty tags rather than an error.
pub fn read_tags(path: &Path) -> Result<ImageTags, ExtractionError> {
    let mut reader = BufReader::new(File::open(path)?);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => collect_tags(exif.fields()),
        Err(exif::Error::NotFound(_)) => Ok(ImageTags::default()),
        // GIF, BMP and friends
        Err(exif::Error::InvalidFormat("Unknown image format")) => Ok(ImageTags::default()),
        Err(exif::Error::Io(e)) => Err(e.into()),
        Err(e) => Err(e.into()),
    }
}

/// Fold fields in traversal order. When several IFDs carry the same tag the
/// last one read is kept.
pub fn collect_tags<'a>(fields: impl Iterator<Item = &'a Field>) -> Result<ImageTags, ExtractionError> {
    let mut tags = ImageTags::default();
    for field in fields {
        if field.tag == Tag::Model {
            if let Some(model) = ascii(&field.value) {
                tags.model = Some(model);
            }
        } else if field.tag == Tag::DateTime {
            if let Some(raw) = ascii(&field.value) {
                tags.created_at = parse_date_time(&raw)?;
            }
        }
    }
    Ok(tags)
}

/// Parse an EXIF `DateTime` value.
///
/// Blank values (spaces, colons and zeros) are how cameras spell "unknown"
/// and yield `None`. Trailing text after the seconds is ignored.
pub fn parse_date_time(raw: &str) -> Result<Option<NaiveDateTime>, ExtractionError> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if trimmed.chars().all(|c| matches!(c, ' ' | ':' | '0')) {
        return Ok(None);
    }
    NaiveDateTime::parse_and_remainder(trimmed, DATE_TIME_FORMAT)
        .map(|(dt, _)| Some(dt))
        .map_err(|_| ExtractionError::Timestamp(trimmed.to_string()))
}

fn ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts.first().map(|raw| decode_text(raw)),
        _ => None,
    }
}

/// Decode an EXIF string without its NUL padding. Bytes that are not UTF-8
/// become U+FFFD.
fn decode_text(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
