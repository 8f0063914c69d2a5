use crate::config::AppConfig;
use crate::error::Error;
use crate::offset::validate_offset_option;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct ProcessingOptions {
    /// Offset for photos whose metadata carries no timezone.
    pub time_add: Option<String>,
    /// Offset for every photo, ignoring metadata.
    pub time_add_force: Option<String>,
    pub gpx_files: Vec<PathBuf>,
    pub find_gpx: bool,
    pub gpx_search_paths: Vec<PathBuf>,
    pub months_back: Option<u32>,
    pub verbose: bool,
    pub skip_rotate: bool,
    pub skip_rename: bool,
}

impl ProcessingOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(value) = self.time_add.as_deref() {
            validate_offset_option("time-add", value)?;
        }
        if let Some(value) = self.time_add_force.as_deref() {
            validate_offset_option("time-add-force", value)?;
        }
        Ok(())
    }

    pub fn discovery_requested(&self) -> bool {
        self.find_gpx || !self.gpx_search_paths.is_empty()
    }

    /// Explicit search paths, or the configured root when none were given.
    pub fn search_paths(&self, config: &AppConfig) -> Vec<PathBuf> {
        if !self.gpx_search_paths.is_empty() {
            return self.gpx_search_paths.clone();
        }
        config.gpx_root.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_offsets_are_rejected_before_processing() {
        let options = ProcessingOptions {
            time_add: Some("+2".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidOffset {
                option: "time-add",
                ..
            })
        ));

        let options = ProcessingOptions {
            time_add: Some("+02:00".to_string()),
            time_add_force: Some("02:00".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidOffset {
                option: "time-add-force",
                ..
            })
        ));
    }

    #[test]
    fn explicit_search_paths_imply_discovery() {
        let config = AppConfig {
            gpx_root: Some(PathBuf::from("/gpx")),
            ..Default::default()
        };
        let mut options = ProcessingOptions::default();
        assert!(!options.discovery_requested());

        options.find_gpx = true;
        assert_eq!(options.search_paths(&config), vec![PathBuf::from("/gpx")]);

        options.find_gpx = false;
        options.gpx_search_paths = vec![PathBuf::from("/elsewhere")];
        assert!(options.discovery_requested());
        assert_eq!(
            options.search_paths(&config),
            vec![PathBuf::from("/elsewhere")]
        );
    }
}
