use crate::config::AppConfig;
use crate::correlate::{CorrelationReport, Correlator};
use crate::metadata::MetadataService;
use crate::options::ProcessingOptions;
use crate::photo::{load_photos, Photo};
use crate::rename::{apply_renames, RenameStats};
use crate::tools::{rotate, strip_gps, ToolRunner};
use crate::track::{discover, merge_tracks};
use crate::window::compute_window;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a run needs besides the photos and the two service seams.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: AppConfig,
    pub options: ProcessingOptions,
    pub cwd: PathBuf,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub photos: usize,
    pub tracks: Vec<PathBuf>,
    pub timezone_fallbacks: usize,
    pub gps_stripped: usize,
    pub correlation: CorrelationReport,
    pub renames: Option<RenameStats>,
}

/// Track list for this run: explicit files, plus discovered ones when asked.
pub fn resolve_tracks(
    options: &ProcessingOptions,
    config: &AppConfig,
    photos: &[Photo],
    cwd: &Path,
    today: NaiveDate,
) -> Vec<PathBuf> {
    if !options.discovery_requested() {
        return options.gpx_files.clone();
    }
    let Some(window) = compute_window(options.months_back, photos, today) else {
        return options.gpx_files.clone();
    };
    let discovered = discover(cwd, &options.search_paths(config), &window);
    merge_tracks(&options.gpx_files, discovered)
}

/// Validates, loads, gates, then mutates: rotate, strip GPS, correlate, rename.
///
/// Every check that can reject the run happens before the first external tool
/// touches a file.
pub fn run(
    paths: &[PathBuf],
    ctx: &RunContext,
    metadata: &mut dyn MetadataService,
    runner: &mut dyn ToolRunner,
) -> Result<RunSummary> {
    let options = &ctx.options;
    options.validate()?;

    let mut photos = load_photos(paths, metadata)?;
    info!(count = photos.len(), "写真を読み込みました");

    let tracks = resolve_tracks(options, &ctx.config, &photos, &ctx.cwd, ctx.today);
    let correlator = Correlator::new(
        ctx.config.correlate_tool.clone(),
        options,
        ctx.config.coarse_max_dist_secs,
    );
    let timezone_fallbacks = correlator.check_timezones(&photos, &tracks)?;

    if !options.skip_rotate {
        rotate(runner, &ctx.config.rotate_tool, &photos)?;
    }
    let gps_stripped = strip_gps(
        runner,
        &ctx.config.strip_gps_tool,
        &ctx.config.gps_strip_models,
        &photos,
    )?;

    let correlation = correlator.correlate(runner, &photos, &tracks)?;

    let renames = if options.skip_rename {
        None
    } else {
        Some(apply_renames(&mut photos)?)
    };

    Ok(RunSummary {
        photos: photos.len(),
        tracks,
        timezone_fallbacks,
        gps_stripped,
        correlation,
        renames,
    })
}
