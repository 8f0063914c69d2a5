use crate::error::Error;
use crate::metadata::{
    Metadata, KEY_CREATE_DATE, KEY_DATE_TIME_ORIGINAL, KEY_OFFSET_TIME_ORIGINAL,
    KEY_SUBSEC_DATE_TIME_ORIGINAL,
};
use crate::offset::{strip_trailing_offset, trailing_offset};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

/// Keys checked for the capture time, highest priority first.
pub const TIMESTAMP_KEYS: [&str; 3] = [
    KEY_SUBSEC_DATE_TIME_ORIGINAL,
    KEY_DATE_TIME_ORIGINAL,
    KEY_CREATE_DATE,
];

const METADATA_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const UNSET_DATE_PREFIX: &str = "0000:00:00";
const MIN_TIMESTAMP_LEN: usize = 8;
/// Fraction digits kept before scaling; more would overflow a second.
const MAX_FRACTION_DIGITS: usize = 6;

static EXIF_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}):(\d{2}):(\d{2}) (\d{2}):(\d{2}):(\d{2})\.(\d+)Z?$")
        .expect("valid timestamp regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Metadata(&'static str),
    FileModified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTime {
    pub raw: String,
    pub timestamp: NaiveDateTime,
    pub offset: Option<String>,
    pub source: TimeSource,
}

/// Derives capture time and UTC offset for the file at `path`.
pub fn resolve(path: &Path, metadata: &Metadata) -> Result<ResolvedTime> {
    let (raw, source) = match raw_from_metadata(metadata) {
        Some((key, raw)) => (raw, TimeSource::Metadata(key)),
        None => {
            warn!(
                photo = %path.display(),
                checked = ?TIMESTAMP_KEYS,
                "撮影日時のメタデータがないため更新日時を使用します"
            );
            (file_modified_raw(path)?, TimeSource::FileModified)
        }
    };

    let timestamp = parse_timestamp(&raw)?;
    let offset = metadata
        .non_empty(KEY_OFFSET_TIME_ORIGINAL)
        .or_else(|| trailing_offset(&raw).map(str::to_string));

    Ok(ResolvedTime {
        raw,
        timestamp,
        offset,
        source,
    })
}

pub fn raw_from_metadata(metadata: &Metadata) -> Option<(&'static str, String)> {
    TIMESTAMP_KEYS.iter().find_map(|key| {
        metadata
            .non_empty(key)
            .filter(|value| is_usable(value))
            .map(|value| (*key, value))
    })
}

fn is_usable(value: &str) -> bool {
    value.len() >= MIN_TIMESTAMP_LEN && !value.starts_with(UNSET_DATE_PREFIX)
}

/// Host-local modification time, without an offset.
fn file_modified_raw(path: &Path) -> Result<String> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("更新日時を取得できませんでした: {}", path.display()))?;
    let local: DateTime<Local> = DateTime::from(modified);
    Ok(format!(
        "{}.{:02}",
        local.format(METADATA_FORMAT),
        local.timestamp_subsec_millis() / 10
    ))
}

/// Parses `YYYY:MM:DD HH:MM:SS[.fraction][Z]`, ignoring any trailing `±HH:MM`.
///
/// The fraction is read as an integer count of microseconds, so `.12` becomes
/// 12µs rather than 120ms. Cameras that write sub-seconds pad them to a fixed
/// width, which keeps ordering within one device intact. Digits past the sixth
/// are dropped.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, Error> {
    let unparseable = || Error::UnparseableTimestamp(raw.to_string());

    let stripped = strip_trailing_offset(raw.trim());
    let (body, zulu) = match stripped.strip_suffix('Z') {
        Some(body) => (body, "Z"),
        None => (stripped, ""),
    };
    let normalized = if body.contains('.') {
        format!("{body}{zulu}")
    } else {
        format!("{body}.00{zulu}")
    };

    let caps = EXIF_TIMESTAMP.captures(&normalized).ok_or_else(unparseable)?;
    let num = |i: usize| caps[i].parse::<u32>().map_err(|_| unparseable());

    let year = caps[1].parse::<i32>().map_err(|_| unparseable())?;
    let date = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?).ok_or_else(unparseable)?;
    let fraction = &caps[7][..caps[7].len().min(MAX_FRACTION_DIGITS)];
    let nanos = fraction.parse::<u32>().map_err(|_| unparseable())? * 1000;
    let time = NaiveTime::from_hms_nano_opt(num(4)?, num(5)?, num(6)?, nanos)
        .ok_or_else(unparseable)?;
    Ok(date.and_time(time))
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(METADATA_FORMAT).to_string()
}
