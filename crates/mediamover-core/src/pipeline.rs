use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dedup::{hash_file, DedupIndex, HashStrategy};
use crate::grouping::{GroupingStore, Groups};
use crate::key::build_key;
use crate::media::MediaRecord;
use crate::metadata::{self, ExtractionError};
use crate::progress::EventCallback;
use crate::walker::{walk, Candidate, WalkOptions, WalkStats};

/// Why one file dropped out of the collect phase.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Extract(#[from] ExtractionError),

    #[error("cannot read file for hashing: {0}")]
    Read(#[source] io::Error),
}

/// Where a candidate ended up after collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    ExtractionFailed,
    DuplicateRejected,
    Admitted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectStats {
    pub extraction_failed: u64,
    pub duplicates_rejected: u64,
    pub admitted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    extraction_failed: AtomicU64,
    duplicates_rejected: AtomicU64,
    admitted: AtomicU64,
}

/// Per-run state of the collect phase: the duplicate filter, the grouping
/// store and outcome counters. Shared by reference with every worker.
#[derive(Debug)]
pub struct Collector {
    hash: HashStrategy,
    dedup: DedupIndex,
    groups: GroupingStore,
    counters: Counters,
}

impl Collector {
    pub fn new(hash: HashStrategy) -> Self {
        Self {
            hash,
            dedup: DedupIndex::new(),
            groups: GroupingStore::new(),
            counters: Counters::default(),
        }
    }

    /// Extract, hash, filter and group one file.
    ///
    /// Failures are logged and counted here; they never reach the walk. With
    /// a pool, `Admitted` is provisional: an earlier file in walk order with
    /// the same content may still turn up and take its place in `finish`.
    pub fn process(&self, candidate: Candidate) -> FileOutcome {
        let outcome = match self.admit(&candidate) {
            Ok(Some(record)) => {
                self.groups.insert(build_key(&record), record);
                FileOutcome::Admitted
            }
            Ok(None) => FileOutcome::DuplicateRejected,
            Err(err) => {
                log::error!("[collect] error file path: {}: {}", candidate.path.display(), err);
                FileOutcome::ExtractionFailed
            }
        };

        let counter = match outcome {
            FileOutcome::ExtractionFailed => &self.counters.extraction_failed,
            FileOutcome::DuplicateRejected => &self.counters.duplicates_rejected,
            FileOutcome::Admitted => &self.counters.admitted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    fn admit(&self, candidate: &Candidate) -> Result<Option<MediaRecord>, CollectError> {
        let meta = metadata::extract(&candidate.path, &candidate.sniffed)?;
        let size = fs::metadata(&candidate.path).map_err(CollectError::Read)?.len();
        let hash = hash_file(&candidate.path, self.hash).map_err(CollectError::Read)?;

        if !self.dedup.try_admit(hash, candidate.seq) {
            log::debug!("[collect] duplicate content {}: {}", hash, candidate.path.display());
            return Ok(None);
        }
        Ok(Some(MediaRecord {
            source: candidate.path.clone(),
            kind: candidate.sniffed.kind,
            model: meta.model,
            created_at: meta.created_at,
            size,
            hash,
            seq: candidate.seq,
        }))
    }

    /// Counts so far. With a pool these settle only in `finish`.
    pub fn stats(&self) -> CollectStats {
        CollectStats {
            extraction_failed: self.counters.extraction_failed.load(Ordering::Relaxed),
            duplicates_rejected: self.counters.duplicates_rejected.load(Ordering::Relaxed),
            admitted: self.counters.admitted.load(Ordering::Relaxed),
        }
    }

    /// End the collect phase; no record can be added afterwards.
    ///
    /// Records displaced by an earlier file with the same content are dropped
    /// here and counted as duplicates, so every content hash keeps exactly
    /// the first file in walk order whatever the worker count.
    pub fn finish(self) -> (Groups, CollectStats) {
        let mut stats = self.stats();
        let dedup = self.dedup;
        let mut groups = self.groups.snapshot();

        let mut displaced = 0u64;
        groups.retain(|_, records| {
            records.retain(|record| {
                let first = dedup.holds(&record.hash, record.seq);
                if !first {
                    log::debug!(
                        "[collect] duplicate content {}: {} (an earlier file holds it)",
                        record.hash,
                        record.source.display()
                    );
                    displaced += 1;
                }
                first
            });
            !records.is_empty()
        });

        stats.admitted -= displaced;
        stats.duplicates_rejected += displaced;
        (groups, stats)
    }
}

/// Walk `root` and run every candidate through `collector`.
///
/// With `workers <= 1` each file is processed inline, in walk order. Otherwise
/// the walk stays on this thread and files are spawned onto a pool of
/// `workers` threads; this returns once all of them are done.
pub fn collect(
    root: &Path,
    options: &WalkOptions,
    workers: usize,
    collector: &Collector,
    events: &EventCallback<'_>,
) -> anyhow::Result<WalkStats> {
    if workers <= 1 {
        return Ok(walk(root, options, events, |candidate| {
            collector.process(candidate);
        }));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("collect-{}", i))
        .build()?;
    let stats = pool.in_place_scope(|scope| {
        walk(root, options, events, |candidate| {
            scope.spawn(move |_| {
                collector.process(candidate);
            });
        })
    });
    Ok(stats)
}
