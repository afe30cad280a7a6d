pub mod cleanup;
pub mod dedup;
pub mod grouping;
pub mod key;
pub mod media;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod relocate;
pub mod report;
pub mod sniff;
pub mod walker;

#[cfg(test)]
mod testutil;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cleanup::CleanupSummary;
use crate::dedup::HashStrategy;
use crate::pipeline::{CollectStats, Collector};
use crate::relocate::RelocateSummary;
use crate::report::Report;
use crate::walker::{WalkOptions, WalkStats};

pub use crate::progress::{silent, Event, EventCallback, Stage};

fn default_workers() -> usize {
    1
}

fn default_progress_interval() -> u64 {
    1000
}

/// Everything a run needs. Loadable from a JSON file; every field but the two
/// directories has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOptions {
    #[serde(default)]
    pub source: PathBuf,
    #[serde(default)]
    pub destination: PathBuf,
    /// Collect threads; 0 or 1 processes files inline in walk order
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub hash: HashStrategy,
    /// Files between two collect progress events; 0 disables them
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    #[serde(default)]
    pub extension_fallback: bool,
    #[serde(default)]
    pub keep_empty_dirs: bool,
}

impl ProcessOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            workers: default_workers(),
            hash: HashStrategy::default(),
            progress_interval: default_progress_interval(),
            extension_fallback: false,
            keep_empty_dirs: false,
        }
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("cannot read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

/// Counters for every terminal state a file can reach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub walk: WalkStats,
    pub collect: CollectStats,
    pub report: Report,
    pub relocate: RelocateSummary,
    pub cleanup: CleanupSummary,
}

/// Conditions checked before any file is touched.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("source directory {} does not exist", .0.display())]
    MissingSource(PathBuf),

    #[error("source {} is not a directory", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("source and destination are the same directory: {}", .0.display())]
    SameDirectory(PathBuf),

    #[error("cannot create destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot resolve {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolved directories for one run.
struct Roots {
    source: PathBuf,
    destination: PathBuf,
}

fn prepare(options: &ProcessOptions) -> Result<Roots, PreconditionError> {
    let source = &options.source;
    match fs::metadata(source) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(PreconditionError::SourceNotDirectory(source.clone())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PreconditionError::MissingSource(source.clone()))
        }
        Err(e) => {
            return Err(PreconditionError::Resolve {
                path: source.clone(),
                source: e,
            })
        }
    }

    fs::create_dir_all(&options.destination).map_err(|e| PreconditionError::Destination {
        path: options.destination.clone(),
        source: e,
    })?;

    let resolve = |path: &Path| {
        fs::canonicalize(path).map_err(|e| PreconditionError::Resolve {
            path: path.to_path_buf(),
            source: e,
        })
    };
    let roots = Roots {
        source: resolve(source)?,
        destination: resolve(&options.destination)?,
    };
    if roots.source == roots.destination {
        return Err(PreconditionError::SameDirectory(roots.source));
    }
    Ok(roots)
}

/// Run the whole pipeline: collect, report, relocate, clean up.
///
/// Only precondition failures abort the run. Per-file problems are logged and
/// show up as counters in the result.
pub fn process(options: &ProcessOptions, events: &EventCallback<'_>) -> anyhow::Result<ProcessResult> {
    let roots = prepare(options)?;
    log::info!(
        "[process] {} -> {} ({} workers)",
        roots.source.display(),
        roots.destination.display(),
        options.workers.max(1)
    );

    let walk_options = WalkOptions {
        skip: roots
            .destination
            .starts_with(&roots.source)
            .then(|| roots.destination.clone()),
        extension_fallback: options.extension_fallback,
        progress_interval: options.progress_interval,
    };

    // Stage 1: collect
    let collector = Collector::new(options.hash);
    let walk = progress::timed(Stage::Collect, None, events, || {
        pipeline::collect(&roots.source, &walk_options, options.workers, &collector, events)
    })?;
    let (groups, collect) = collector.finish();
    log::info!(
        "[process] {} files seen, {} admitted, {} duplicates, {} failed",
        walk.files_seen,
        collect.admitted,
        collect.duplicates_rejected,
        collect.extraction_failed
    );

    let report = Report::from_groups(&groups);
    events(Event::Report(&report));

    // Stage 2: relocate
    let total = Some(report.files);
    let relocate = progress::timed(Stage::Relocate, total, events, || {
        relocate::relocate(&roots.destination, &groups, events)
    });

    // Stage 3: cleanup
    let cleanup = if options.keep_empty_dirs {
        CleanupSummary::default()
    } else {
        progress::timed(Stage::Cleanup, None, events, || {
            cleanup::remove_empty_dirs(&roots.source, walk_options.skip.as_deref(), events)
        })
    };

    Ok(ProcessResult {
        walk,
        collect,
        report,
        relocate,
        cleanup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    use crate::testutil::{self, DATE_TIME, MODEL};

    fn pixel_jpeg() -> Vec<u8> {
        testutil::jpeg_with_exif(&[&[(MODEL, "Pixel"), (DATE_TIME, "2024:01:02 10:00:00")]])
    }

    #[test]
    fn test_process_end_to_end() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let source = src.path();
        fs::create_dir_all(source.join("old")).unwrap();
        fs::create_dir_all(source.join("videos/2019")).unwrap();
        fs::write(source.join("img1.jpg"), pixel_jpeg()).unwrap();
        fs::write(source.join("old/img1_copy.jpg"), pixel_jpeg()).unwrap();
        fs::write(source.join("videos/2019/clip.mp4"), testutil::mp4(None, None)).unwrap();
        fs::write(source.join("notes.txt"), b"not media").unwrap();

        let stages = Mutex::new(Vec::new());
        let sink = |event: Event<'_>| match event {
            Event::StageStarted { stage, .. } => stages.lock().unwrap().push(stage),
            Event::Report(report) => assert_eq!(report.files, 2),
            _ => {}
        };
        let result = process(&ProcessOptions::new(source, dst.path()), &sink).unwrap();

        let dest = dst.path();
        assert!(dest.join("image/Pixel/20240102/img1-100000.jpg").exists());
        assert!(dest.join("video/19700101/clip-000000.mp4").exists());
        assert!(!dest.join("image/Pixel/20240102/img1_copy-100000.jpg").exists());

        // the rejected duplicate stays where it was
        assert!(source.join("old/img1_copy.jpg").exists());
        assert!(!source.join("img1.jpg").exists());
        assert!(!source.join("videos").exists());
        assert!(source.join("notes.txt").exists());

        assert_eq!(result.walk.files_seen, 4);
        assert_eq!(result.walk.classified, 3);
        assert_eq!(result.collect.admitted, 2);
        assert_eq!(result.collect.duplicates_rejected, 1);
        assert_eq!(result.relocate.relocated, 2);
        assert_eq!(result.cleanup.removed, 2);
        assert_eq!(
            *stages.lock().unwrap(),
            vec![Stage::Collect, Stage::Relocate, Stage::Cleanup]
        );
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = tempdir().unwrap();
        let options = ProcessOptions::new(dir.path().join("nope"), dir.path().join("out"));
        let err = process(&options, &silent).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::MissingSource(_))
        ));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_source_file_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.jpg");
        fs::write(&file, b"x").unwrap();
        let err = process(&ProcessOptions::new(&file, dir.path().join("out")), &silent).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::SourceNotDirectory(_))
        ));
    }

    #[test]
    fn test_same_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let err = process(&ProcessOptions::new(dir.path(), dir.path().join(".")), &silent).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::SameDirectory(_))
        ));
    }

    #[test]
    fn test_nested_destination_is_not_rescanned() {
        let dir = tempdir().unwrap();
        let source = dir.path();
        fs::write(source.join("img1.jpg"), pixel_jpeg()).unwrap();
        let dest = source.join("sorted");

        let first = process(&ProcessOptions::new(source, &dest), &silent).unwrap();
        assert_eq!(first.relocate.relocated, 1);

        let second = process(&ProcessOptions::new(source, &dest), &silent).unwrap();
        assert_eq!(second.walk.files_seen, 0);
        assert!(dest.join("image/Pixel/20240102/img1-100000.jpg").exists());
    }

    #[test]
    fn test_nested_destination_survives_cleanup() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("sorted");
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let result = process(&ProcessOptions::new(dir.path(), &dest), &silent).unwrap();
        assert_eq!(result.cleanup.removed, 1);
        assert!(dest.exists());
    }

    fn listing(root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = walkdir::WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_pooled_run_matches_sequential() {
        let mut runs = Vec::new();
        for workers in [1, 4, 4, 4] {
            let src = tempdir().unwrap();
            let dst = tempdir().unwrap();
            fs::create_dir(src.path().join("z-backup")).unwrap();
            for i in 0..8 {
                let date = format!("2024:01:0{} 12:34:56", i + 1);
                let jpeg = testutil::jpeg_with_exif(&[&[(MODEL, "Pixel"), (DATE_TIME, date.as_str())]]);
                fs::write(src.path().join(format!("p{}.jpg", i)), &jpeg).unwrap();
                // same bytes, later in walk order, under another name
                fs::write(src.path().join("z-backup").join(format!("{}.jpeg", 7 - i)), &jpeg).unwrap();
            }
            let mut options = ProcessOptions::new(src.path(), dst.path());
            options.workers = workers;
            let result = process(&options, &silent).unwrap();
            runs.push((result, listing(dst.path()), listing(src.path())));
        }

        let (first, placed, left) = &runs[0];
        assert_eq!(first.relocate.relocated, 8);
        assert_eq!(first.collect.duplicates_rejected, 8);
        assert!(placed.contains(&PathBuf::from("image/Pixel/20240108/p7-123456.jpg")));
        assert_eq!(left.len(), 8);
        assert!(left.iter().all(|p| p.starts_with("z-backup")));
        for run in &runs[1..] {
            assert_eq!(run, &runs[0]);
        }
    }

    #[test]
    fn test_options_from_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mediamover.json");
        fs::write(
            &path,
            r#"{"source":"/in","destination":"/out","workers":4,"hash":{"mode":"prefix","bytes":4096}}"#,
        )
        .unwrap();

        let options = ProcessOptions::from_json_file(&path).unwrap();
        assert_eq!(options.source, PathBuf::from("/in"));
        assert_eq!(options.workers, 4);
        assert_eq!(options.hash, HashStrategy::Prefix { bytes: 4096 });
        assert_eq!(options.progress_interval, 1000);
        assert!(!options.keep_empty_dirs);

        fs::write(&path, "{ not json").unwrap();
        assert!(ProcessOptions::from_json_file(&path).is_err());
    }
}
