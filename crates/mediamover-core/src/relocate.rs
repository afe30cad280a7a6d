use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grouping::Groups;
use crate::media::MediaRecord;
use crate::progress::{Event, EventCallback, Stage};

/// Failure to place one file.
#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("cannot check whether {} exists: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot delete redundant {} (already at {}): {source}", from.display(), to.display())]
    DeleteRedundant {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How a record left the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Renamed into place
    Moved,
    /// Copied across filesystems, then the source removed
    Copied,
    /// Target name already taken, source deleted
    DeletedAsRedundant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocateSummary {
    pub relocated: u64,
    pub redundant_deleted: u64,
    pub failed: u64,
}

/// File name for a record inside its partition: `<stem>-<HHMMSS>[.<ext>]`.
pub fn target_name(source: &Path, created_at: NaiveDateTime) -> OsString {
    let mut name = source.file_stem().map(OsString::from).unwrap_or_default();
    name.push("-");
    name.push(created_at.format("%H%M%S").to_string());
    if let Some(ext) = source.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Move every grouped record under `destination`.
///
/// Groups are visited in key order and records in walk order, so on a name
/// collision the earlier record keeps its place and the later source is
/// deleted. Failures are logged and counted; nothing here is fatal.
pub fn relocate(destination: &Path, groups: &Groups, events: &EventCallback<'_>) -> RelocateSummary {
    let total: u64 = groups.values().map(|g| g.len() as u64).sum();
    let mut summary = RelocateSummary::default();
    let mut done = 0u64;

    for (key, records) in groups {
        let dir = destination.join(key.to_path());
        if let Err(source) = fs::create_dir_all(&dir) {
            let err = RelocateError::CreateDir { path: dir, source };
            log::error!("[relocate] {}: skipping {} files of {}", err, records.len(), key);
            summary.failed += records.len() as u64;
            done += records.len() as u64;
            events(Event::Progress {
                stage: Stage::Relocate,
                current: done,
                total: Some(total),
            });
            continue;
        }

        for record in records {
            let target = dir.join(target_name(&record.source, record.created_at));
            match place(record, &target) {
                Ok(Placement::DeletedAsRedundant) => {
                    log::info!(
                        "[relocate] {} already exists, deleted {}",
                        concise(&target, destination).display(),
                        record.source.display()
                    );
                    summary.redundant_deleted += 1;
                }
                Ok(placement) => {
                    log::debug!(
                        "[relocate] {:?} {} -> {}",
                        placement,
                        record.source.display(),
                        concise(&target, destination).display()
                    );
                    summary.relocated += 1;
                }
                Err(err) => {
                    log::error!("[relocate] {}", err);
                    summary.failed += 1;
                }
            }
            done += 1;
            events(Event::Progress {
                stage: Stage::Relocate,
                current: done,
                total: Some(total),
            });
        }
    }

    summary
}

fn place(record: &MediaRecord, target: &Path) -> Result<Placement, RelocateError> {
    let source = &record.source;
    let taken = target.try_exists().map_err(|e| RelocateError::Inspect {
        path: target.to_path_buf(),
        source: e,
    })?;
    // never overwrite; the source goes only when the target is known to exist
    if taken {
        return fs::remove_file(source)
            .map(|()| Placement::DeletedAsRedundant)
            .map_err(|e| RelocateError::DeleteRedundant {
                from: source.clone(),
                to: target.to_path_buf(),
                source: e,
            });
    }

    let moved = match fs::rename(source, target) {
        Ok(()) => Ok(Placement::Moved),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_then_remove(source, target).map(|()| Placement::Copied)
        }
        Err(e) => Err(e),
    };
    moved.map_err(|e| RelocateError::Move {
        from: source.clone(),
        to: target.to_path_buf(),
        source: e,
    })
}

fn copy_then_remove(source: &Path, target: &Path) -> io::Result<()> {
    let meta = fs::metadata(source)?;
    fs::copy(source, target)?;
    let mtime = FileTime::from_last_modification_time(&meta);
    if let Err(e) = filetime::set_file_mtime(target, mtime) {
        log::warn!("[relocate] cannot keep mtime on {}: {}", target.display(), e);
    }
    if let Err(e) = fs::remove_file(source) {
        // leave the source alone and undo the copy so the file exists once
        if let Err(undo) = fs::remove_file(target) {
            log::error!(
                "[relocate] {} is now also at {}, cannot remove the copy: {}",
                source.display(),
                target.display(),
                undo
            );
        }
        return Err(e);
    }
    Ok(())
}

fn concise<'a>(path: &'a Path, base: &Path) -> &'a Path {
    path.strip_prefix(base).unwrap_or(path)
}
