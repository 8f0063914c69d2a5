use anyhow::{bail, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use phototrack_core::{
    app_paths, load_config, load_config_from, run, AppConfig, BuiltinExifReader, ExifToolReader,
    MetadataService, ProcessRunner, ProcessingOptions, RunContext, RunSummary,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "phototrack")]
#[command(about = "写真の撮影日時を整え、GPXトラックで位置情報を付与し、日時順にリネームします")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    process: ProcessArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
}

#[derive(Debug, Args)]
struct ProcessArgs {
    /// GPXファイル (複数指定可)
    #[arg(long = "gpx", value_name = "FILE")]
    gpx_files: Vec<PathBuf>,
    /// 撮影期間に合うGPXを検索する
    #[arg(long, default_value_t = false)]
    find_gpx: bool,
    /// GPX検索フォルダ (指定すると検索を有効にする)
    #[arg(long = "gpx-path", value_name = "DIR")]
    gpx_search_paths: Vec<PathBuf>,
    /// 撮影日時ではなく今日からNか月前までのGPXを対象にする
    #[arg(long)]
    months_back: Option<u32>,
    /// タイムゾーン情報のない写真に使うUTCオフセット ([+-]HH[:MM])
    #[arg(long, allow_hyphen_values = true)]
    time_add: Option<String>,
    /// すべての写真に使うUTCオフセット ([+-]HH[:MM])
    #[arg(long, allow_hyphen_values = true)]
    time_add_force: Option<String>,
    #[arg(long, value_enum, default_value_t = MetadataBackend::Exiftool)]
    metadata_backend: MetadataBackend,
    #[arg(long, default_value_t = false)]
    no_rotate: bool,
    #[arg(long, default_value_t = false)]
    no_rename: bool,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
    photos: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetadataBackend {
    Exiftool,
    Builtin,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config(config)) => match config.action {
            ConfigAction::Show => cmd_config_show(),
        },
        None => cmd_process(cli.process),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_process(args: ProcessArgs) -> Result<()> {
    init_tracing(args.verbose);

    let options = ProcessingOptions {
        time_add: args.time_add,
        time_add_force: args.time_add_force,
        gpx_files: args.gpx_files,
        find_gpx: args.find_gpx,
        gpx_search_paths: args.gpx_search_paths,
        months_back: args.months_back,
        verbose: args.verbose,
        skip_rotate: args.no_rotate,
        skip_rename: args.no_rename,
    };
    options.validate()?;

    if args.photos.is_empty() {
        bail!("写真ファイルを指定してください");
    }

    let config = match args.config.as_deref() {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let mut metadata: Box<dyn MetadataService> = match args.metadata_backend {
        MetadataBackend::Exiftool => Box::new(ExifToolReader::new(config.exiftool_path.as_deref())?),
        MetadataBackend::Builtin => Box::new(BuiltinExifReader),
    };
    let mut runner = ProcessRunner {
        verbose: options.verbose,
    };
    let ctx = RunContext {
        config,
        options,
        cwd: std::env::current_dir()?,
        today: Local::now().date_naive(),
    };

    let summary = run(&args.photos, &ctx, metadata.as_mut(), &mut runner)?;
    print_summary(&summary);
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("GPXトラック:");
    for track in &summary.tracks {
        println!("  {}", track.display());
    }

    let renames = summary
        .renames
        .map(|r| format!("renamed={} unchanged={}", r.renamed, r.unchanged))
        .unwrap_or_else(|| "skipped".to_string());
    info!(
        photos = summary.photos,
        tracks = summary.tracks.len(),
        tz_fallback = summary.timezone_fallbacks,
        gps_stripped = summary.gps_stripped,
        groups = summary.correlation.groups,
        fine = summary.correlation.fine_runs,
        coarse = summary.correlation.coarse_runs,
        stopped_early = summary.correlation.stopped_early,
        rename = %renames,
        "集計"
    );
}
