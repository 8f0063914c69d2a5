use crate::error::Error;
use crate::photo::Photo;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Program plus leading arguments; per-call arguments are appended after them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    fn argv(&self, extra: Vec<OsString>) -> Vec<OsString> {
        self.args
            .iter()
            .map(OsString::from)
            .chain(extra)
            .collect()
    }
}

/// Synchronous execution of an external tool. A non-zero exit is an error.
pub trait ToolRunner {
    fn run(&mut self, program: &str, args: &[OsString]) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    /// Passes tool stdout through instead of discarding it.
    pub verbose: bool,
}

impl ToolRunner for ProcessRunner {
    fn run(&mut self, program: &str, args: &[OsString]) -> Result<(), Error> {
        debug!(program, ?args, "外部ツールを実行します");
        let stdout = if self.verbose {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        let status = Command::new(program)
            .args(args)
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| Error::ToolSpawn {
                tool: program.to_string(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::ToolFailed {
                tool: program.to_string(),
                code: status.code(),
            })
        }
    }
}

pub fn run_tool(
    runner: &mut dyn ToolRunner,
    command: &ToolCommand,
    extra: Vec<OsString>,
) -> Result<(), Error> {
    runner.run(&command.program, &command.argv(extra))
}

fn photo_args<'a>(photos: impl IntoIterator<Item = &'a Photo>) -> Vec<OsString> {
    photos
        .into_iter()
        .map(|photo| photo.path().as_os_str().to_os_string())
        .collect()
}

/// Applies EXIF orientation to every photo in one invocation.
pub fn rotate(
    runner: &mut dyn ToolRunner,
    command: &ToolCommand,
    photos: &[Photo],
) -> Result<(), Error> {
    if photos.is_empty() {
        return Ok(());
    }
    info!(count = photos.len(), "向きを補正します");
    run_tool(runner, command, photo_args(photos))
}

/// Removes embedded GPS from photos taken by block-listed camera models.
///
/// Returns how many photos were passed to the tool; the tool is not started
/// when none match.
pub fn strip_gps(
    runner: &mut dyn ToolRunner,
    command: &ToolCommand,
    blocked_models: &[String],
    photos: &[Photo],
) -> Result<usize, Error> {
    let targets: Vec<&Photo> = photos
        .iter()
        .filter(|photo| {
            photo
                .camera_model()
                .map(|model| blocked_models.iter().any(|b| b.trim() == model))
                .unwrap_or(false)
        })
        .collect();
    if targets.is_empty() {
        return Ok(0);
    }
    info!(count = targets.len(), "GPS情報を削除します");
    run_tool(runner, command, photo_args(targets.iter().copied()))?;
    Ok(targets.len())
}


#[cfg(test)]
mod tests {
    use super::fake::RecordingRunner;
    use super::*;
    use crate::metadata::{Metadata, KEY_MODEL};
    use crate::photo::testing::{photo, photo_with_metadata};

    fn with_model(path: &str, model: &str) -> Photo {
        let mut meta = Metadata::default();
        meta.insert(KEY_MODEL, model);
        photo_with_metadata(path, "2023:01:10 08:30:00", None, meta)
    }

    #[test]
    fn rotate_passes_all_photos_after_leading_args() {
        let mut runner = RecordingRunner::default();
        let command = ToolCommand {
            program: "rotate-by-orientation".to_string(),
            args: vec!["-a".to_string()],
        };
        let photos = vec![
            photo("/p/a.jpg", "2023:01:10 08:30:00", None),
            photo("/p/b.jpg", "2023:01:10 08:31:00", None),
        ];
        rotate(&mut runner, &command, &photos).expect("rotates");
        assert_eq!(
            runner.calls,
            vec![(
                "rotate-by-orientation".to_string(),
                vec!["-a".to_string(), "/p/a.jpg".to_string(), "/p/b.jpg".to_string()]
            )]
        );
    }

    #[test]
    fn strip_gps_only_targets_blocked_models() {
        let mut runner = RecordingRunner::default();
        let photos = vec![with_model("/p/a.jpg", "BadCam"), with_model("/p/b.jpg", "X-T5")];
        let stripped = strip_gps(
            &mut runner,
            &ToolCommand::new("strip-gps"),
            &["BadCam".to_string()],
            &photos,
        )
        .expect("strips");
        assert_eq!(stripped, 1);
        assert_eq!(runner.calls[0].1, vec!["/p/a.jpg".to_string()]);
    }

    #[test]
    fn strip_gps_is_skipped_without_matches() {
        let mut runner = RecordingRunner::default();
        let photos = vec![with_model("/p/b.jpg", "X-T5")];
        let stripped = strip_gps(
            &mut runner,
            &ToolCommand::new("strip-gps"),
            &["BadCam".to_string()],
            &photos,
        )
        .expect("no-op");
        assert_eq!(stripped, 0);
        assert!(runner.calls.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_fatal() {
        let mut runner = ProcessRunner::default();
        let err = runner
            .run("false", &[])
            .expect_err("`false` exits with 1");
        assert!(matches!(err, Error::ToolFailed { code: Some(1), .. }));
    }
}
