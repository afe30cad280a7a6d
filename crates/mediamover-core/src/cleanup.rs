use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::progress::{Event, EventCallback};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSummary {
    pub removed: u64,
    pub failed: u64,
}

/// Remove every empty directory below `root`, deepest first, so a directory
/// whose only children were empty directories goes too. `root` itself stays,
/// and `skip` (the destination, when nested in `root`) is left untouched.
pub fn remove_empty_dirs(root: &Path, skip: Option<&Path>, events: &EventCallback<'_>) -> CleanupSummary {
    let mut summary = CleanupSummary::default();

    let dirs = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("[cleanup] {}", err);
                None
            }
        })
        // contents come before their directory, so `filter_entry` cannot prune here
        .filter(|entry| {
            entry.file_type().is_dir() && !skip.is_some_and(|s| entry.path().starts_with(s))
        });

    for dir in dirs {
        let path = dir.path();
        match is_empty(path) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => {
                log::error!("[cleanup] cannot read {}: {}", path.display(), err);
                summary.failed += 1;
                continue;
            }
        }
        match fs::remove_dir(path) {
            Ok(()) => {
                log::debug!("[cleanup] removed {}", path.display());
                summary.removed += 1;
                events(Event::DirectoryRemoved(path));
            }
            Err(err) => {
                log::error!("[cleanup] cannot remove {}: {}", path.display(), err);
                summary.failed += 1;
            }
        }
    }

    summary
}

fn is_empty(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}
