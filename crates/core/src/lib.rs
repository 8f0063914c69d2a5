mod config;
mod correlate;
mod error;
mod exif_reader;
mod exiftool_reader;
mod metadata;
mod offset;
mod options;
mod photo;
mod pipeline;
mod rename;
mod timestamp;
mod tools;
mod track;
mod window;

pub use config::{app_paths, load_config, load_config_from, AppConfig, AppPaths};
pub use correlate::{CorrelationReport, Correlator};
pub use error::Error;
pub use exif_reader::BuiltinExifReader;
pub use exiftool_reader::ExifToolReader;
pub use metadata::{Metadata, MetadataService};
pub use offset::validate_offset_option;
pub use options::ProcessingOptions;
pub use photo::{load_photos, Photo};
pub use pipeline::{resolve_tracks, run, RunContext, RunSummary};
pub use rename::{
    apply_renames, plan_renames, rename_with_date, target_name, RenameCandidate, RenameStats,
};
pub use timestamp::{
    format_timestamp, parse_timestamp, resolve as resolve_time, ResolvedTime, TimeSource,
};
pub use tools::{ProcessRunner, ToolCommand, ToolRunner};
pub use track::{discover, scan_gpx_start, DateOrigin, DeviceRule, RuleMatch, TrackFile};
pub use window::{compute_window, TimeWindow};
