use crate::window::{date_key, TimeWindow};
use anyhow::Result;
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File-name marker of the low-precision logger whose tracks feed the coarse pass.
pub const COARSE_TRACK_MARKER: &str = "tracker_";

static ID_TRACKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^tracker_\d+\.gpx$").expect("valid regex"));
static DATED_LOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid regex"));
static PREFIXED_DATED_LOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Track_(\d{4})-(\d{2})-(\d{2})").expect("valid regex"));
static GPX_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T\d{2}:\d{2}:\d{2}(\.\d+)?Z$").expect("valid regex")
});

/// Per-device file-naming conventions, evaluated in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRule {
    /// `tracker_<id>.gpx`: the name carries a device id, not a date.
    IdTracker,
    /// `YYYY-MM-DD...gpx`
    DatedLog,
    /// `Track_YYYY-MM-DD...gpx`
    PrefixedDatedLog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    Undated(DeviceRule),
    Dated(DeviceRule, String),
}

impl DeviceRule {
    pub const ALL: [DeviceRule; 3] = [
        DeviceRule::IdTracker,
        DeviceRule::DatedLog,
        DeviceRule::PrefixedDatedLog,
    ];

    fn pattern(self) -> &'static Regex {
        match self {
            DeviceRule::IdTracker => &ID_TRACKER,
            DeviceRule::DatedLog => &DATED_LOG,
            DeviceRule::PrefixedDatedLog => &PREFIXED_DATED_LOG,
        }
    }

    fn extract(self, caps: &Captures<'_>) -> Option<String> {
        match self {
            DeviceRule::IdTracker => None,
            DeviceRule::DatedLog | DeviceRule::PrefixedDatedLog => {
                Some(format!("{}{}{}", &caps[1], &caps[2], &caps[3]))
            }
        }
    }

    pub fn apply(self, file_name: &str) -> Option<RuleMatch> {
        let caps = self.pattern().captures(file_name)?;
        Some(match self.extract(&caps) {
            Some(key) => RuleMatch::Dated(self, key),
            None => RuleMatch::Undated(self),
        })
    }
}

pub fn match_file_name(file_name: &str) -> Option<RuleMatch> {
    DeviceRule::ALL
        .iter()
        .find_map(|rule| rule.apply(file_name))
}

/// How a track's date was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrigin {
    FileName(DeviceRule),
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFile {
    pub path: PathBuf,
    /// Start date as `YYYYMMDD`, compared as text against the window.
    pub date_key: String,
    pub origin: DateOrigin,
}

impl TrackFile {
    /// Resolves the representative start date, or `None` for tracks that cannot be dated.
    pub fn resolve(path: &Path) -> Option<TrackFile> {
        let file_name = path.file_name()?.to_string_lossy();
        let (key, origin) = match match_file_name(&file_name) {
            Some(RuleMatch::Undated(rule)) => {
                debug!(track = %path.display(), ?rule, "ファイル名に日付のないトラックです");
                return None;
            }
            Some(RuleMatch::Dated(rule, key)) => (key, DateOrigin::FileName(rule)),
            None => (date_key(read_gpx_start(path)?), DateOrigin::Content),
        };
        Some(TrackFile {
            path: path.to_path_buf(),
            date_key: key,
            origin,
        })
    }
}

fn read_gpx_start(path: &Path) -> Option<NaiveDate> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!(track = %path.display(), %err, "GPXを開けませんでした");
            return None;
        }
    };
    match scan_gpx_start(BufReader::new(file)) {
        Ok(date) => date,
        Err(err) => {
            warn!(track = %path.display(), %err, "GPXを解析できませんでした");
            None
        }
    }
}

/// Streams a GPX document and returns the date of its start time.
///
/// The candidate is the first `<time>` inside `<metadata>`, or else the time of
/// the first `<trkpt>`. Only that one value is considered, and only in the strict
/// UTC form `YYYY-MM-DDTHH:MM:SS[.f]Z`; anything else leaves the track undated.
/// Reading stops as soon as the candidate is known.
pub fn scan_gpx_start<R: BufRead>(input: R) -> Result<Option<NaiveDate>> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_metadata = false;
    let mut in_trkpt = false;
    let mut in_time = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"trkpt" => in_trkpt = true,
                b"time" => in_time = in_metadata || in_trkpt,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = false,
                // The first point carried no time.
                b"trkpt" => return Ok(None),
                b"time" => in_time = false,
                _ => {}
            },
            Event::Text(text) if in_time => {
                let value = text.unescape()?;
                return Ok(parse_gpx_time(&value));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_gpx_time(value: &str) -> Option<NaiveDate> {
    let caps = GPX_TIME.captures(value.trim())?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// The working directory plus every configured root, without duplicates.
pub fn search_roots(cwd: &Path, search_paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::<PathBuf>::new();
    let mut roots = Vec::new();
    for root in std::iter::once(cwd).chain(search_paths.iter().map(PathBuf::as_path)) {
        let key = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        if seen.insert(key) {
            roots.push(root.to_path_buf());
        }
    }
    roots
}

/// Finds every `.gpx` below the roots whose start date lies inside `window`.
pub fn discover(cwd: &Path, search_paths: &[PathBuf], window: &TimeWindow) -> Vec<PathBuf> {
    let mut seen = HashSet::<PathBuf>::new();
    let mut out = Vec::new();

    for root in search_roots(cwd, search_paths) {
        if !root.is_dir() {
            warn!(root = %root.display(), "GPX検索フォルダが存在しません");
            continue;
        }
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(root = %root.display(), %err, "フォルダ走査に失敗しました");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !is_gpx(path) {
                continue;
            }
            let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            if seen.contains(&key) {
                continue;
            }
            let Some(track) = TrackFile::resolve(path) else {
                continue;
            };
            if window.contains_key(&track.date_key) {
                debug!(track = %path.display(), date = %track.date_key, origin = ?track.origin, "トラックを採用");
                seen.insert(key);
                out.push(track.path);
            }
        }
    }

    info!(count = out.len(), %window, "GPXトラックを検出しました");
    out
}

/// Explicit tracks first, then discovered ones that are not already listed.
pub fn merge_tracks(explicit: &[PathBuf], discovered: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = explicit.iter().cloned().collect();
    let mut out = explicit.to_vec();
    for path in discovered {
        if seen.insert(path.clone()) {
            out.push(path);
        }
    }
    out
}

pub fn is_coarse_track(path: &Path) -> bool {
    path.file_name()
        .map(|name| {
            name.to_string_lossy()
                .to_ascii_lowercase()
                .contains(COARSE_TRACK_MARKER)
        })
        .unwrap_or(false)
}

fn is_gpx(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("gpx"))
        .unwrap_or(false)
}
