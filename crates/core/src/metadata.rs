use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub const KEY_SUBSEC_DATE_TIME_ORIGINAL: &str = "SubSecDateTimeOriginal";
pub const KEY_DATE_TIME_ORIGINAL: &str = "DateTimeOriginal";
pub const KEY_CREATE_DATE: &str = "CreateDate";
pub const KEY_OFFSET_TIME_ORIGINAL: &str = "OffsetTimeOriginal";
pub const KEY_MODEL: &str = "Model";

/// Key/value view of one file's EXIF, fetched once per photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// String form of a value; numbers are rendered, everything else is ignored.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.get_str(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Metadata {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut meta = Metadata::default();
        for (key, value) in pairs {
            meta.insert(key, value);
        }
        meta
    }
}

/// Source of per-file metadata. Read failures are fatal for the run.
pub trait MetadataService {
    fn lookup(&mut self, path: &Path) -> Result<Metadata>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{Metadata, MetadataService};
    use anyhow::{bail, Result};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Default)]
    pub struct StaticMetadata {
        pub entries: HashMap<PathBuf, Metadata>,
        pub lookups: usize,
    }

    impl StaticMetadata {
        pub fn with(mut self, path: &Path, meta: Metadata) -> Self {
            self.entries.insert(path.to_path_buf(), meta);
            self
        }
    }

    impl MetadataService for StaticMetadata {
        fn lookup(&mut self, path: &Path) -> Result<Metadata> {
            self.lookups += 1;
            match self.entries.get(path) {
                Some(meta) => Ok(meta.clone()),
                None => bail!("no metadata for {}", path.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Metadata;
    use serde_json::json;

    #[test]
    fn get_str_renders_numbers_and_skips_other_values() {
        let meta = Metadata::new(
            json!({ "Model": "X-T5", "ISO": 200, "Flags": [1, 2], "Empty": "  " })
                .as_object()
                .cloned()
                .expect("object"),
        );
        assert_eq!(meta.get_str("Model").as_deref(), Some("X-T5"));
        assert_eq!(meta.get_str("ISO").as_deref(), Some("200"));
        assert_eq!(meta.get_str("Flags"), None);
        assert_eq!(meta.non_empty("Empty"), None);
        assert_eq!(meta.get_str("Missing"), None);
    }
}
