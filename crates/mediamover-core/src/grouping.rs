use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::key::PartitionKey;
use crate::media::MediaRecord;

/// Accepted records by partition key, ready for relocation.
pub type Groups = BTreeMap<PartitionKey, Vec<MediaRecord>>;

/// Append-only collection of accepted records, shared by the collect workers.
#[derive(Debug, Default)]
pub struct GroupingStore {
    groups: Mutex<HashMap<PartitionKey, Vec<MediaRecord>>>,
}

impl GroupingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: PartitionKey, record: MediaRecord) {
        self.groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push(record);
    }

    /// Close the store and hand its contents over.
    ///
    /// Keys come out sorted and each group is ordered by walk sequence, so
    /// collision naming does not depend on which worker finished first.
    pub fn snapshot(self) -> Groups {
        let groups = self.groups.into_inner().unwrap_or_else(PoisonError::into_inner);
        groups
            .into_iter()
            .map(|(key, mut records)| {
                records.sort_by_key(|r| r.seq);
                (key, records)
            })
            .collect()
    }
}
