use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Read size for streaming a file through the hasher.
const HASH_CHUNK: usize = 64 * 1024;

/// SHA-256 digest of a file's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

/// How much of each file feeds the hash.
///
/// `Prefix` is faster on large videos but treats any two files sharing their
/// first `bytes` as duplicates, which happens with same-camera recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum HashStrategy {
    #[default]
    Full,
    Prefix { bytes: u64 },
}

/// Stream a file through SHA-256. Each call owns its buffer, so this is safe
/// to run from any number of workers.
pub fn hash_file(path: &Path, strategy: HashStrategy) -> io::Result<ContentHash> {
    let file = File::open(path)?;
    match strategy {
        HashStrategy::Full => hash_reader(file),
        HashStrategy::Prefix { bytes } => hash_reader(file.take(bytes)),
    }
}

/// Hash an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    ContentHash(Sha256::digest(data).into())
}

fn hash_reader<R: Read>(mut reader: R) -> io::Result<ContentHash> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(ContentHash(hasher.finalize().into()))
}

/// Content hashes seen during one run, each with the earliest walk
/// position it was offered at.
#[derive(Debug, Default)]
pub struct DedupIndex {
    first: Mutex<HashMap<ContentHash, u64>>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer the file at walk position `seq` with content `hash`.
    ///
    /// Returns false when a file earlier in walk order already holds `hash`;
    /// that file always wins. Returns true when `seq` is now the holder, which
    /// takes the place of a later holder offered first by another worker.
    /// Check and update happen under one lock.
    pub fn try_admit(&self, hash: ContentHash, seq: u64) -> bool {
        let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        match first.entry(hash) {
            Entry::Vacant(slot) => {
                slot.insert(seq);
                true
            }
            Entry::Occupied(mut slot) if seq < *slot.get() => {
                slot.insert(seq);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Whether `seq` is the earliest file offered with `hash`.
    pub fn holds(&self, hash: &ContentHash, seq: u64) -> bool {
        self.first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            == Some(&seq)
    }
}
