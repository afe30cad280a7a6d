//! Creation times from ISO base media (MP4 / QuickTime) atoms.
//!
//! Only the atoms needed for a timestamp are decoded: `moov/mvhd` for the
//! movie, and `moov/trak/{tkhd,mdia/mdhd,mdia/hdlr}` to find the video track.
//! Atom times count seconds from 1904-01-01 UTC; zero means "not set".

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};

use super::ExtractionError;

/// Seconds between 1904-01-01 and 1970-01-01.
const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Upper bound on the `moov` atom we are willing to buffer.
const MAX_MOOV_SIZE: u64 = 64 * 1024 * 1024;

/// Whether a sniffed MIME type uses the atom layout.
pub fn is_iso_bmff(mime: &str) -> bool {
    matches!(
        mime,
        "video/mp4" | "video/quicktime" | "video/x-m4v" | "video/3gpp" | "video/3gpp2"
    )
}

/// Creation times found in a movie.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MovieTimes {
    /// From the movie header (`mvhd`)
    pub movie: Option<NaiveDateTime>,
    /// From the first video track (`mdhd`, else `tkhd`)
    pub video_track: Option<NaiveDateTime>,
}

impl MovieTimes {
    /// Movie header time, falling back to the video track.
    pub fn creation_time(&self) -> Option<NaiveDateTime> {
        self.movie.or(self.video_track)
    }
}

/// Locate `moov` at the top level of the file and read its timestamps.
pub fn read_times(path: &Path) -> Result<MovieTimes, ExtractionError> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    match find_top_level(&mut reader, len, b"moov")? {
        Some(moov) => parse_moov(&moov),
        None => Ok(MovieTimes::default()),
    }
}

/// Scan top-level atoms for `target` and return its payload.
///
/// Trailing bytes too short for a header end the scan. A truncated atom
/// other than the target also ends it, since nothing after it is reachable.
fn find_top_level<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    target: &[u8; 4],
) -> Result<Option<Vec<u8>>, ExtractionError> {
    let mut pos = 0u64;
    while len.saturating_sub(pos) >= 8 {
        reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let kind = [header[4], header[5], header[6], header[7]];

        let (header_len, size) = match u32::from_be_bytes([header[0], header[1], header[2], header[3]]) {
            0 => (8, len - pos),
            1 => {
                let mut large = [0u8; 8];
                reader.read_exact(&mut large)?;
                (16, u64::from_be_bytes(large))
            }
            n => (8, u64::from(n)),
        };

        if size < header_len {
            return Err(malformed(&kind, "size smaller than its header"));
        }
        let truncated = size > len - pos;
        if &kind == target {
            if truncated {
                return Err(malformed(&kind, "extends past end of file"));
            }
            let payload_len = size - header_len;
            if payload_len > MAX_MOOV_SIZE {
                return Err(malformed(&kind, "too large"));
            }
            let mut payload = vec![0u8; payload_len as usize];
            reader.read_exact(&mut payload)?;
            return Ok(Some(payload));
        }
        if truncated {
            break;
        }
        pos += size;
    }
    Ok(None)
}

fn parse_moov(moov: &[u8]) -> Result<MovieTimes, ExtractionError> {
    let mut times = MovieTimes::default();
    for (kind, body) in children(moov)? {
        match &kind {
            b"mvhd" => times.movie = full_box_time(&kind, body)?,
            b"trak" if times.video_track.is_none() => times.video_track = video_track_time(body)?,
            _ => {}
        }
    }
    Ok(times)
}

/// Creation time of a track if its handler is `vide`.
fn video_track_time(trak: &[u8]) -> Result<Option<NaiveDateTime>, ExtractionError> {
    let mut track_header = None;
    let mut media_header = None;
    let mut handler = None;

    for (kind, body) in children(trak)? {
        match &kind {
            b"tkhd" => track_header = full_box_time(&kind, body)?,
            b"mdia" => {
                for (kind, body) in children(body)? {
                    match &kind {
                        b"mdhd" => media_header = full_box_time(&kind, body)?,
                        // version/flags, pre_defined, then the handler type
                        b"hdlr" => handler = body.get(8..12).map(|h| [h[0], h[1], h[2], h[3]]),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    if handler.as_ref() == Some(b"vide") {
        Ok(media_header.or(track_header))
    } else {
        Ok(None)
    }
}

/// Split an atom payload into its child atoms.
fn children(mut data: &[u8]) -> Result<Vec<([u8; 4], &[u8])>, ExtractionError> {
    let mut out = Vec::new();
    while !data.is_empty() {
        if data.len() < 8 {
            // QuickTime allows a zero terminator after the last child
            if data.iter().all(|&b| b == 0) {
                break;
            }
            return Err(ExtractionError::Container("truncated atom header".to_string()));
        }
        let kind = [data[4], data[5], data[6], data[7]];
        let (header_len, size) = match be_u32(data, 0) {
            Some(0) => (8, data.len() as u64),
            Some(1) => match be_u64(data, 8) {
                Some(large) => (16, large),
                None => return Err(malformed(&kind, "truncated 64-bit size")),
            },
            Some(n) => (8, u64::from(n)),
            None => return Err(malformed(&kind, "truncated size")),
        };
        if size < header_len || size > data.len() as u64 {
            return Err(malformed(&kind, "size does not fit its parent"));
        }
        let size = size as usize;
        out.push((kind, &data[header_len as usize..size]));
        data = &data[size..];
    }
    Ok(out)
}

/// Creation time from a version 0 or 1 full box (`mvhd`, `tkhd`, `mdhd`).
fn full_box_time(kind: &[u8; 4], body: &[u8]) -> Result<Option<NaiveDateTime>, ExtractionError> {
    let seconds = match body.first() {
        Some(0) => be_u32(body, 4).map(u64::from),
        Some(1) => be_u64(body, 4),
        Some(v) => return Err(malformed(kind, &format!("unsupported version {}", v))),
        None => None,
    };
    let Some(seconds) = seconds else {
        return Err(malformed(kind, "too short"));
    };
    if seconds == 0 {
        return Ok(None);
    }

    let unix = i64::try_from(seconds)
        .ok()
        .and_then(|s| s.checked_sub(MAC_EPOCH_OFFSET))
        .and_then(|s| DateTime::from_timestamp(s, 0));
    match unix {
        Some(dt) => Ok(Some(dt.naive_utc())),
        None => Err(malformed(kind, "creation time out of range")),
    }
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    let bytes: [u8; 8] = data.get(at..at + 8)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

fn malformed(kind: &[u8; 4], problem: &str) -> ExtractionError {
    ExtractionError::Container(format!("'{}' atom {}", String::from_utf8_lossy(kind), problem))
}
