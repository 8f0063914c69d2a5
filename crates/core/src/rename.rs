use crate::error::Error;
use crate::photo::Photo;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

static DATED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}_\d{6}-").expect("valid dated name regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub renamed: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameCandidate {
    pub index: usize,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Lowercased file name, prefixed with `YYYYMMDD_HHMMSS-` unless already dated.
pub fn target_name(photo: &Photo) -> String {
    let lowered = photo.file_name().to_lowercase();
    if DATED_NAME.is_match(&lowered) {
        return lowered;
    }
    format!("{}-{}", photo.timestamp().format("%Y%m%d_%H%M%S"), lowered)
}

/// Renames one photo in place. Returns `false` without touching the disk when
/// the name is already final. An existing file other than the photo itself is
/// never overwritten.
pub fn rename_with_date(photo: &mut Photo) -> Result<bool> {
    let name = target_name(photo);
    if name == photo.file_name() {
        return Ok(false);
    }
    let target = photo.path().with_file_name(&name);
    if lands_on_other_file(photo, &name, &target) {
        return Err(Error::RenameCollision { target }.into());
    }
    fs::rename(photo.path(), &target).with_context(|| {
        format!(
            "リネームに失敗しました: {} -> {}",
            photo.path().display(),
            target.display()
        )
    })?;
    debug!(from = %photo.path().display(), to = %target.display(), "リネーム");
    photo.relocate(target);
    Ok(true)
}

/// Computes every rename up front and rejects the batch on any name clash.
///
/// Two photos may not end up with the same path, and a rename may not land on
/// an existing file other than the photo itself (a case-only change).
pub fn plan_renames(photos: &[Photo]) -> Result<Vec<RenameCandidate>, Error> {
    let mut final_paths = HashSet::<PathBuf>::new();
    let mut candidates = Vec::new();

    for (index, photo) in photos.iter().enumerate() {
        let name = target_name(photo);
        let target = photo.path().with_file_name(&name);
        if !final_paths.insert(target.clone()) {
            return Err(Error::RenameCollision { target });
        }
        if name == photo.file_name() {
            continue;
        }
        if lands_on_other_file(photo, &name, &target) {
            return Err(Error::RenameCollision { target });
        }
        candidates.push(RenameCandidate {
            index,
            from: photo.path().to_path_buf(),
            to: target,
        });
    }

    Ok(candidates)
}

fn lands_on_other_file(photo: &Photo, name: &str, target: &Path) -> bool {
    let case_only = name.eq_ignore_ascii_case(&photo.file_name());
    !case_only && target.exists()
}

pub fn apply_renames(photos: &mut [Photo]) -> Result<RenameStats> {
    let candidates = plan_renames(photos)?;
    let mut stats = RenameStats {
        renamed: 0,
        unchanged: photos.len() - candidates.len(),
    };
    for candidate in candidates {
        if rename_with_date(&mut photos[candidate.index])? {
            stats.renamed += 1;
        }
    }
    info!(renamed = stats.renamed, unchanged = stats.unchanged, "リネーム完了");
    Ok(stats)
}
