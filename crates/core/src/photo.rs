use crate::error::Error;
use crate::metadata::{Metadata, MetadataService, KEY_MODEL};
use crate::timestamp::{self, ResolvedTime, TimeSource};
use anyhow::Result;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// One input file and everything derived from its metadata.
///
/// Metadata and time are resolved once when the photo is loaded. Renaming only
/// moves `path`; the resolved values describe the file content and stay valid.
#[derive(Debug, Clone)]
pub struct Photo {
    path: PathBuf,
    metadata: Metadata,
    time: ResolvedTime,
}

impl Photo {
    pub fn load(path: impl Into<PathBuf>, service: &mut dyn MetadataService) -> Result<Self> {
        let path = path.into();
        let metadata = service.lookup(&path).map_err(|source| Error::Metadata {
            path: path.clone(),
            source,
        })?;
        let time = timestamp::resolve(&path, &metadata)?;
        Ok(Self {
            path,
            metadata,
            time,
        })
    }

    pub fn from_parts(path: impl Into<PathBuf>, metadata: Metadata, time: ResolvedTime) -> Self {
        Self {
            path: path.into(),
            metadata,
            time,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn raw_timestamp(&self) -> &str {
        &self.time.raw
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.time.timestamp
    }

    pub fn offset(&self) -> Option<&str> {
        self.time.offset.as_deref()
    }

    pub fn time_source(&self) -> TimeSource {
        self.time.source
    }

    pub fn camera_model(&self) -> Option<String> {
        self.metadata.non_empty(KEY_MODEL)
    }

    pub(crate) fn relocate(&mut self, path: PathBuf) {
        self.path = path;
    }
}

/// Loads every path in order; the first unreadable or undatable photo aborts the run.
pub fn load_photos(paths: &[PathBuf], service: &mut dyn MetadataService) -> Result<Vec<Photo>> {
    paths
        .iter()
        .map(|path| Photo::load(path.clone(), &mut *service))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fake::StaticMetadata;
    use crate::metadata::KEY_DATE_TIME_ORIGINAL;

    #[test]
    fn load_fetches_metadata_once_and_resolves_time() {
        let path = PathBuf::from("/photos/IMG_0001.JPG");
        let mut service = StaticMetadata::default().with(
            &path,
            Metadata::from([
                (KEY_DATE_TIME_ORIGINAL, "2023:01:10 08:30:00+09:00"),
                (KEY_MODEL, " X-T5 "),
            ]),
        );

        let photo = Photo::load(path.clone(), &mut service).expect("loads");
        assert_eq!(service.lookups, 1);
        assert_eq!(photo.path(), path.as_path());
        assert_eq!(photo.file_name(), "IMG_0001.JPG");
        assert_eq!(photo.offset(), Some("+09:00"));
        assert_eq!(photo.camera_model().as_deref(), Some("X-T5"));
        assert_eq!(
            photo.timestamp().format("%Y%m%d_%H%M%S").to_string(),
            "20230110_083000"
        );
    }

    #[test]
    fn relocating_keeps_resolved_time() {
        let mut photo = testing::photo("/p/a.jpg", "2023:01:10 08:30:00", None);
        let before = photo.timestamp();
        photo.relocate(PathBuf::from("/p/20230110_083000-a.jpg"));
        assert_eq!(photo.timestamp(), before);
        assert_eq!(photo.raw_timestamp(), "2023:01:10 08:30:00");
    }

    #[test]
    fn metadata_failure_is_fatal() {
        let mut service = StaticMetadata::default();
        let err = load_photos(&[PathBuf::from("/missing.jpg")], &mut service)
            .expect_err("missing metadata must fail");
        assert!(err.to_string().contains("メタデータを読み込めませんでした"));
    }
}
