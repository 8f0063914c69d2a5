use crate::metadata::{Metadata, MetadataService};
use anyhow::{Context, Result};
use exiftool::ExifTool;
use serde_json::Value;
use std::path::Path;

/// Metadata lookup through a long-running `exiftool` process.
pub struct ExifToolReader {
    exiftool: ExifTool,
}

impl ExifToolReader {
    pub fn new(executable: Option<&Path>) -> Result<Self> {
        let exiftool = match executable {
            Some(path) => ExifTool::with_executable(path)
                .with_context(|| format!("exiftoolを起動できませんでした: {}", path.display()))?,
            None => ExifTool::new().context("exiftoolを起動できませんでした")?,
        };
        Ok(Self { exiftool })
    }
}

impl MetadataService for ExifToolReader {
    fn lookup(&mut self, path: &Path) -> Result<Metadata> {
        let value = self
            .exiftool
            .json(path, &[])
            .with_context(|| format!("EXIFを解析できませんでした: {}", path.display()))?;
        Ok(to_metadata(value))
    }
}

fn to_metadata(value: Value) -> Metadata {
    match value {
        Value::Object(map) => Metadata::new(map),
        Value::Array(mut items) if !items.is_empty() => to_metadata(items.swap_remove(0)),
        _ => Metadata::default(),
    }
}
