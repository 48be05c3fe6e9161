//! Capture timestamp resolution.
//!
//! Order of preference: EXIF `DateTimeOriginal`, then file modification
//! time (local time), then nothing. Always rendered as
//! `YYYY-MM-DDTHH:MM:SS`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const EXIF_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Best available capture time for an image.
pub fn capture_timestamp(path: &Path) -> Option<String> {
    exif_timestamp(path).or_else(|| modified_timestamp(path))
}

/// `DateTimeOriginal` from the image's EXIF block, if present and parseable.
pub fn exif_timestamp(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let exif = exif::Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;
    let field = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)?;
    let exif::Value::Ascii(ref values) = field.value else {
        return None;
    };
    let raw = std::str::from_utf8(values.first()?).ok()?;
    match parse_exif_datetime(raw) {
        Some(dt) => Some(dt),
        None => {
            log::debug!("Unparseable DateTimeOriginal {:?} in {:?}", raw, path);
            None
        }
    }
}

/// File modification time in local time.
pub fn modified_timestamp(path: &Path) -> Option<String> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let local: DateTime<Local> = modified.into();
    Some(local.format(ISO_FORMAT).to_string())
}

/// Convert EXIF `YYYY:MM:DD HH:MM:SS` to ISO 8601.
pub fn parse_exif_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(raw, EXIF_FORMAT)
        .ok()
        .map(|dt| dt.format(ISO_FORMAT).to_string())
}
