use crate::error::Error;
use crate::options::ProcessingOptions;
use crate::photo::Photo;
use crate::tools::{run_tool, ToolCommand, ToolRunner};
use crate::track::is_coarse_track;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationReport {
    pub groups: usize,
    pub fine_runs: usize,
    pub coarse_runs: usize,
    /// Set when the coarse pass found no tracks and the remaining groups were skipped.
    pub stopped_early: bool,
}

/// Runs `gps-correlate` over offset groups in two passes.
#[derive(Debug, Clone)]
pub struct Correlator {
    pub command: ToolCommand,
    pub time_add: Option<String>,
    pub time_add_force: Option<String>,
    pub coarse_max_dist_secs: u32,
    pub verbose: bool,
}

impl Correlator {
    pub fn new(command: ToolCommand, options: &ProcessingOptions, coarse_max_dist_secs: u32) -> Self {
        Self {
            command,
            time_add: options.time_add.clone(),
            time_add_force: options.time_add_force.clone(),
            coarse_max_dist_secs,
            verbose: options.verbose,
        }
    }

    /// Gate run before anything touches the files.
    ///
    /// Returns how many photos will fall back to `time_add`. Fails when some
    /// photos have no offset and no fallback was given.
    pub fn check_timezones(&self, photos: &[Photo], tracks: &[PathBuf]) -> Result<usize, Error> {
        if tracks.is_empty() || self.time_add_force.is_some() {
            return Ok(0);
        }
        let missing = photos.iter().filter(|p| p.offset().is_none()).count();
        if missing == 0 {
            return Ok(0);
        }
        match self.time_add.as_deref() {
            Some(fallback) => {
                warn!(
                    missing,
                    total = photos.len(),
                    fallback,
                    "タイムゾーン情報のない写真に既定のオフセットを使用します"
                );
                Ok(missing)
            }
            None => Err(Error::MissingTimezone {
                missing,
                total: photos.len(),
            }),
        }
    }

    pub fn effective_offset<'a>(&'a self, photo: &'a Photo) -> Option<&'a str> {
        self.time_add_force
            .as_deref()
            .or_else(|| photo.offset())
            .or(self.time_add.as_deref())
    }

    /// Distinct effective offsets in first-seen order with their photos.
    pub fn offset_groups<'p>(&self, photos: &'p [Photo]) -> Result<Vec<(String, Vec<&'p Photo>)>, Error> {
        let mut groups: Vec<(String, Vec<&'p Photo>)> = Vec::new();
        let mut missing = 0usize;
        for photo in photos {
            let Some(offset) = self.effective_offset(photo) else {
                missing += 1;
                continue;
            };
            match groups.iter_mut().find(|(key, _)| key == offset) {
                Some((_, members)) => members.push(photo),
                None => groups.push((offset.to_string(), vec![photo])),
            }
        }
        if missing > 0 {
            return Err(Error::MissingTimezone {
                missing,
                total: photos.len(),
            });
        }
        Ok(groups)
    }

    pub fn correlate(
        &self,
        runner: &mut dyn ToolRunner,
        photos: &[Photo],
        tracks: &[PathBuf],
    ) -> Result<CorrelationReport, Error> {
        let mut report = CorrelationReport::default();
        if tracks.is_empty() {
            info!("GPXトラックがないため位置情報の付与をスキップします");
            return Ok(report);
        }

        let groups = self.offset_groups(photos)?;
        report.groups = groups.len();
        let coarse_tracks: Vec<&PathBuf> = tracks.iter().filter(|t| is_coarse_track(t)).collect();

        for (index, (offset, members)) in groups.iter().enumerate() {
            info!(offset = offset.as_str(), photos = members.len(), "オフセットグループを照合します");
            if self.verbose {
                for photo in members {
                    info!(photo = %photo.path().display(), "照合対象");
                }
            }

            run_tool(runner, &self.command, self.fine_args(offset, tracks.iter(), members))?;
            report.fine_runs += 1;

            if coarse_tracks.is_empty() {
                // Ends correlation for every remaining group, not just this one.
                warn!(
                    skipped_groups = groups.len() - index - 1,
                    "粗い照合用のトラックがないため照合を終了します"
                );
                report.stopped_early = true;
                return Ok(report);
            }

            run_tool(
                runner,
                &self.command,
                self.coarse_args(offset, coarse_tracks.iter().copied(), members),
            )?;
            report.coarse_runs += 1;
        }

        debug!(?report, "照合完了");
        Ok(report)
    }

    fn fine_args<'t>(
        &self,
        offset: &str,
        tracks: impl Iterator<Item = &'t PathBuf>,
        photos: &[&Photo],
    ) -> Vec<OsString> {
        let mut args = base_args(offset);
        push_tracks_and_photos(&mut args, tracks, photos);
        args
    }

    fn coarse_args<'t>(
        &self,
        offset: &str,
        tracks: impl Iterator<Item = &'t PathBuf>,
        photos: &[&Photo],
    ) -> Vec<OsString> {
        let mut args = base_args(offset);
        args.push("--ignore-tracksegs".into());
        args.push("--max-dist".into());
        args.push(self.coarse_max_dist_secs.to_string().into());
        push_tracks_and_photos(&mut args, tracks, photos);
        args
    }
}

fn base_args(offset: &str) -> Vec<OsString> {
    vec!["--timeadd".into(), offset.into(), "--no-mtime".into()]
}

fn push_tracks_and_photos<'t>(
    args: &mut Vec<OsString>,
    tracks: impl Iterator<Item = &'t PathBuf>,
    photos: &[&Photo],
) {
    for track in tracks {
        args.push("--gps".into());
        args.push(track.as_os_str().to_os_string());
    }
    args.extend(photos.iter().map(|p| p.path().as_os_str().to_os_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::testing::photo;
    use crate::tools::fake::RecordingRunner;

    fn correlator(time_add: Option<&str>, force: Option<&str>) -> Correlator {
        Correlator {
            command: ToolCommand::new("gps-correlate"),
            time_add: time_add.map(str::to_string),
            time_add_force: force.map(str::to_string),
            coarse_max_dist_secs: 3600,
            verbose: false,
        }
    }

    fn photos() -> Vec<Photo> {
        vec![
            photo("/p/a.jpg", "2023:01:10 08:30:00", Some("+02:00")),
            photo("/p/b.jpg", "2023:01:10 09:30:00", None),
            photo("/p/c.jpg", "2023:01:11 10:00:00", Some("+09:00")),
        ]
    }

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn missing_timezone_without_fallback_is_an_error() {
        let tracks = vec![PathBuf::from("/t/2023-01-10_trip.gpx")];
        let err = correlator(None, None)
            .check_timezones(&photos(), &tracks)
            .expect_err("must abort");
        assert!(matches!(err, Error::MissingTimezone { missing: 1, total: 3 }));
    }

    #[test]
    fn missing_timezone_with_fallback_warns_and_continues() {
        let tracks = vec![PathBuf::from("/t/2023-01-10_trip.gpx")];
        let fallback = correlator(Some("+01:00"), None)
            .check_timezones(&photos(), &tracks)
            .expect("fallback accepted");
        assert_eq!(fallback, 1);
    }

    #[test]
    fn gate_is_skipped_when_forced_or_without_tracks() {
        let tracks = vec![PathBuf::from("/t/2023-01-10_trip.gpx")];
        assert_eq!(
            correlator(None, Some("+00:00"))
                .check_timezones(&photos(), &tracks)
                .expect("forced"),
            0
        );
        assert_eq!(
            correlator(None, None)
                .check_timezones(&photos(), &[])
                .expect("no tracks"),
            0
        );
    }

    #[test]
    fn groups_follow_first_seen_order() {
        let photos = vec![
            photo("/p/a.jpg", "2023:01:10 08:30:00", Some("+09:00")),
            photo("/p/b.jpg", "2023:01:10 09:30:00", None),
            photo("/p/c.jpg", "2023:01:11 10:00:00", Some("+09:00")),
        ];
        let c = correlator(Some("+02:00"), None);
        let groups = c.offset_groups(&photos).expect("groups");
        let summary: Vec<(String, usize)> = groups
            .iter()
            .map(|(offset, members)| (offset.clone(), members.len()))
            .collect();
        assert_eq!(
            summary,
            vec![("+09:00".to_string(), 2), ("+02:00".to_string(), 1)]
        );

        let forced = correlator(Some("+02:00"), Some("-05:00"));
        let groups = forced.offset_groups(&photos).expect("groups");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, "-05:00");
        assert_eq!(groups[0].1.len(), 3);
    }

    #[test]
    fn runs_fine_and_coarse_pass_per_group() {
        let mut runner = RecordingRunner::default();
        let tracks = vec![
            PathBuf::from("/t/2023-01-10_trip.gpx"),
            PathBuf::from("/t/tracker_42.gpx"),
        ];
        let report = correlator(Some("+02:00"), None)
            .correlate(&mut runner, &photos(), &tracks)
            .expect("correlates");

        assert_eq!(
            report,
            CorrelationReport {
                groups: 2,
                fine_runs: 2,
                coarse_runs: 2,
                stopped_early: false,
            }
        );
        assert_eq!(
            runner.calls[0],
            (
                "gps-correlate".to_string(),
                s(&[
                    "--timeadd",
                    "+02:00",
                    "--no-mtime",
                    "--gps",
                    "/t/2023-01-10_trip.gpx",
                    "--gps",
                    "/t/tracker_42.gpx",
                    "/p/a.jpg",
                    "/p/b.jpg",
                ])
            )
        );
        assert_eq!(
            runner.calls[1].1,
            s(&[
                "--timeadd",
                "+02:00",
                "--no-mtime",
                "--ignore-tracksegs",
                "--max-dist",
                "3600",
                "--gps",
                "/t/tracker_42.gpx",
                "/p/a.jpg",
                "/p/b.jpg",
            ])
        );
        assert_eq!(runner.calls[2].1[1], "+09:00");
        assert_eq!(runner.calls[3].1.last().map(String::as_str), Some("/p/c.jpg"));
    }

    #[test]
    fn missing_coarse_tracks_stop_all_remaining_groups() {
        let mut runner = RecordingRunner::default();
        let tracks = vec![PathBuf::from("/t/2023-01-10_trip.gpx")];
        let report = correlator(Some("+02:00"), None)
            .correlate(&mut runner, &photos(), &tracks)
            .expect("correlates");

        assert!(report.stopped_early);
        assert_eq!(report.fine_runs, 1);
        assert_eq!(report.coarse_runs, 0);
        assert_eq!(runner.calls.len(), 1);
        assert_eq!(runner.calls[0].1[1], "+02:00");
    }

    #[test]
    fn no_tracks_is_a_no_op() {
        let mut runner = RecordingRunner::default();
        let report = correlator(None, None)
            .correlate(&mut runner, &photos(), &[])
            .expect("no-op");
        assert_eq!(report, CorrelationReport::default());
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn tool_failure_aborts_correlation() {
        let mut runner = RecordingRunner {
            fail_with_code: Some(2),
            ..Default::default()
        };
        let tracks = vec![PathBuf::from("/t/tracker_42.gpx")];
        let err = correlator(Some("+02:00"), None)
            .correlate(&mut runner, &photos(), &tracks)
            .expect_err("must fail");
        assert!(matches!(err, Error::ToolFailed { code: Some(2), .. }));
        assert_eq!(runner.calls.len(), 1);
    }
}
