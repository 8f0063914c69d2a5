use crate::tools::ToolCommand;
use anyhow::{Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_COARSE_MAX_DIST_SECS: u32 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Track search root used when discovery runs without explicit paths.
    pub gpx_root: Option<PathBuf>,
    /// Camera models whose embedded GPS is removed before correlation.
    pub gps_strip_models: Vec<String>,
    pub exiftool_path: Option<PathBuf>,
    pub coarse_max_dist_secs: u32,
    pub rotate_tool: ToolCommand,
    pub correlate_tool: ToolCommand,
    pub strip_gps_tool: ToolCommand,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gpx_root: UserDirs::new().map(|dirs| dirs.home_dir().join("gpx")),
            gps_strip_models: vec!["Canon PowerShot SX740 HS".to_string()],
            exiftool_path: None,
            coarse_max_dist_secs: DEFAULT_COARSE_MAX_DIST_SECS,
            rotate_tool: ToolCommand::new("rotate-by-orientation"),
            correlate_tool: ToolCommand::new("gps-correlate"),
            strip_gps_tool: ToolCommand {
                program: "exiftool".to_string(),
                args: vec!["-overwrite_original".to_string(), "-gps:all=".to_string()],
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "phototrack", "phototrack")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

/// Reads `path`, falling back to defaults when the file does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("設定ファイルを読めませんでした: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?;
    Ok(config)
}
