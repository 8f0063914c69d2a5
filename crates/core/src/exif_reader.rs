use crate::metadata::{
    Metadata, MetadataService, KEY_CREATE_DATE, KEY_DATE_TIME_ORIGINAL, KEY_MODEL,
    KEY_OFFSET_TIME_ORIGINAL, KEY_SUBSEC_DATE_TIME_ORIGINAL,
};
use anyhow::{Context, Result};
use exif::{Exif, In, Reader, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Built-in reader that needs no external `exiftool` binary.
///
/// Fields are exposed under exiftool's tag names so the resolver does not care
/// which backend produced them. `SubSecDateTimeOriginal` is composed the same way
/// exiftool composes it.
#[derive(Debug, Default)]
pub struct BuiltinExifReader;

impl MetadataService for BuiltinExifReader {
    fn lookup(&mut self, path: &Path) -> Result<Metadata> {
        let file = File::open(path)
            .with_context(|| format!("EXIF読み込み対象を開けませんでした: {}", path.display()))?;
        let mut buf = BufReader::new(file);
        let exif = match Reader::new().read_from_container(&mut buf) {
            Ok(exif) => exif,
            // Files without an EXIF block resolve through the mtime fallback.
            Err(exif::Error::NotFound(_)) => return Ok(Metadata::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("EXIFを解析できませんでした: {}", path.display()))
            }
        };
        Ok(collect(&exif))
    }
}

fn collect(exif: &Exif) -> Metadata {
    let original = ascii_field(exif, Tag::DateTimeOriginal);
    let subsec = ascii_field(exif, Tag::SubSecTimeOriginal);
    let offset = ascii_field(exif, Tag::OffsetTimeOriginal);
    compose(
        original,
        subsec,
        offset,
        ascii_field(exif, Tag::DateTimeDigitized),
        ascii_field(exif, Tag::Model),
    )
}

fn compose(
    original: Option<String>,
    subsec: Option<String>,
    offset: Option<String>,
    digitized: Option<String>,
    model: Option<String>,
) -> Metadata {
    let mut meta = Metadata::default();
    if let Some(original) = original.as_deref() {
        meta.insert(KEY_DATE_TIME_ORIGINAL, original);
        if let Some(subsec) = subsec.as_deref() {
            let mut composed = format!("{original}.{subsec}");
            if let Some(offset) = offset.as_deref() {
                composed.push_str(offset);
            }
            meta.insert(KEY_SUBSEC_DATE_TIME_ORIGINAL, composed);
        }
    }
    if let Some(offset) = offset {
        meta.insert(KEY_OFFSET_TIME_ORIGINAL, offset);
    }
    if let Some(digitized) = digitized {
        meta.insert(KEY_CREATE_DATE, digitized);
    }
    if let Some(model) = model {
        meta.insert(KEY_MODEL, model);
    }
    meta
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(values) => values
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|v| !v.is_empty()),
        _ => None,
    }
}
