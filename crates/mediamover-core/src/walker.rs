use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::progress::{Event, EventCallback, Stage};
use crate::sniff::{self, Sniffed};

/// A classified file handed on for extraction.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub sniffed: Sniffed,
    /// Position among classified files in walk order
    pub seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Directory never descended into (the destination, when nested in the source)
    pub skip: Option<PathBuf>,
    /// Classify by extension when the bytes match no known signature
    pub extension_fallback: bool,
    /// Emit a progress event every this many files; 0 disables
    pub progress_interval: u64,
}

/// Counters gathered while walking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    /// Regular files encountered
    pub files_seen: u64,
    /// Files recognized as image or video
    pub classified: u64,
    /// Files of any other type, skipped
    pub unrecognized: u64,
    /// Files whose content could not be probed
    pub unreadable: u64,
    /// Directories or entries that could not be read; their subtrees are skipped
    pub read_errors: u64,
}

/// Walk `root` depth-first, siblings in file name order, and hand every image
/// or video to `submit`.
///
/// Traversal happens on the calling thread; `submit` decides whether the work
/// runs inline or on a pool. Unreadable directories are logged and skipped.
pub fn walk<F>(root: &Path, options: &WalkOptions, events: &EventCallback<'_>, mut submit: F) -> WalkStats
where
    F: FnMut(Candidate),
{
    let mut stats = WalkStats::default();
    let skip = options.skip.as_deref();

    let entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && skip.is_some_and(|s| e.path() == s)));

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                stats.read_errors += 1;
                match err.path() {
                    Some(path) => log::error!("[walk] skipping {}: {}", path.display(), err),
                    None => log::error!("[walk] {}", err),
                }
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        stats.files_seen += 1;
        if options.progress_interval > 0 && stats.files_seen % options.progress_interval == 0 {
            events(Event::Progress {
                stage: Stage::Collect,
                current: stats.files_seen,
                total: None,
            });
        }

        match sniff::probe(entry.path(), options.extension_fallback) {
            Ok(Some(sniffed)) => {
                let seq = stats.classified;
                stats.classified += 1;
                submit(Candidate {
                    path: entry.into_path(),
                    sniffed,
                    seq,
                });
            }
            Ok(None) => {
                stats.unrecognized += 1;
                log::trace!("[walk] not media: {}", entry.path().display());
            }
            Err(err) => {
                stats.unreadable += 1;
                log::error!("[walk] cannot probe {}: {}", entry.path().display(), err);
            }
        }
    }

    stats
}
