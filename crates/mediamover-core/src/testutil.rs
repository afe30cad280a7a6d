//! Byte builders for the container fixtures used across the unit tests.

use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::dedup::hash_bytes;
use crate::media::{MediaKind, MediaRecord};

/// EXIF `Model`
pub(crate) const MODEL: u16 = 0x0110;
/// EXIF `DateTime`, shown as "Date/Time" by most readers
pub(crate) const DATE_TIME: u16 = 0x0132;

/// Seconds between 1904-01-01 and 1970-01-01.
pub(crate) const MAC_EPOCH_OFFSET: u32 = 2_082_844_800;

/// Big-endian TIFF with one IFD per slice, chained in order, holding ASCII fields only.
pub(crate) fn tiff(ifds: &[&[(u16, &str)]]) -> Vec<u8> {
    let ifd_len = |entries: usize| 2 + 12 * entries + 4;

    let mut ifd_offsets = Vec::with_capacity(ifds.len());
    let mut cursor = 8;
    for ifd in ifds {
        ifd_offsets.push(cursor);
        cursor += ifd_len(ifd.len());
    }
    let data_start = cursor;

    let mut out = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();
    let mut data = Vec::new();
    for (i, ifd) in ifds.iter().enumerate() {
        out.extend((ifd.len() as u16).to_be_bytes());
        for (tag, value) in ifd.iter() {
            let mut bytes = value.as_bytes().to_vec();
            bytes.push(0);
            out.extend(tag.to_be_bytes());
            out.extend(2u16.to_be_bytes());
            out.extend((bytes.len() as u32).to_be_bytes());
            if bytes.len() <= 4 {
                bytes.resize(4, 0);
                out.extend(bytes);
            } else {
                out.extend(((data_start + data.len()) as u32).to_be_bytes());
                data.extend(bytes);
            }
        }
        let next = ifd_offsets.get(i + 1).copied().unwrap_or(0);
        out.extend((next as u32).to_be_bytes());
    }
    out.extend(data);
    out
}

/// Minimal JPEG: SOI, an APP1 Exif segment wrapping [`tiff`], EOI.
pub(crate) fn jpeg_with_exif(ifds: &[&[(u16, &str)]]) -> Vec<u8> {
    let tiff = tiff(ifds);
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend(((2 + 6 + tiff.len()) as u16).to_be_bytes());
    out.extend(b"Exif\x00\x00");
    out.extend(tiff);
    out.extend([0xFF, 0xD9]);
    out
}

/// JPEG without any metadata segment.
pub(crate) fn plain_jpeg(filler: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xFE];
    out.extend(((2 + filler.len()) as u16).to_be_bytes());
    out.extend(filler);
    out.extend([0xFF, 0xD9]);
    out
}

pub(crate) fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
    out.extend(kind);
    out.extend(payload);
    out
}

/// Version 0 full box carrying creation and modification times.
pub(crate) fn timed_atom(kind: &[u8; 4], created: u32) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    payload.extend(created.to_be_bytes());
    payload.extend(created.to_be_bytes());
    payload.extend(1000u32.to_be_bytes());
    payload.extend(0u32.to_be_bytes());
    atom(kind, &payload)
}

pub(crate) fn handler(kind: &[u8; 4]) -> Vec<u8> {
    let mut payload = vec![0; 8];
    payload.extend(kind);
    payload.extend([0; 13]);
    atom(b"hdlr", &payload)
}

pub(crate) fn track(handler_kind: &[u8; 4], created: u32) -> Vec<u8> {
    let mut mdia = timed_atom(b"mdhd", created);
    mdia.extend(handler(handler_kind));

    let mut trak = timed_atom(b"tkhd", created);
    trak.extend(atom(b"mdia", &mdia));
    atom(b"trak", &trak)
}

/// MP4 with an optional movie header time and an optional video track time,
/// both as seconds since 1904. With neither, the file has no `moov` at all.
pub(crate) fn mp4(movie_created: Option<u32>, video_created: Option<u32>) -> Vec<u8> {
    let mut out = atom(b"ftyp", b"isom\x00\x00\x02\x00isom");
    if movie_created.is_some() || video_created.is_some() {
        let mut moov = Vec::new();
        if let Some(created) = movie_created {
            moov.extend(timed_atom(b"mvhd", created));
        }
        if let Some(created) = video_created {
            moov.extend(track(b"vide", created));
        }
        out.extend(atom(b"moov", &moov));
    }
    out.extend(atom(b"mdat", b"frames"));
    out
}

/// Unix timestamp expressed in QuickTime seconds.
pub(crate) fn mac_time(unix: u32) -> u32 {
    unix + MAC_EPOCH_OFFSET
}

/// Record whose hash is derived from its source path.
pub(crate) fn record(
    source: impl Into<PathBuf>,
    kind: MediaKind,
    model: &str,
    created_at: NaiveDateTime,
    seq: u64,
) -> MediaRecord {
    let source = source.into();
    MediaRecord {
        hash: hash_bytes(source.as_os_str().as_encoded_bytes()),
        source,
        kind,
        model: model.to_string(),
        created_at,
        size: 0,
        seq,
    }
}
