use std::fs;

use serde::{Deserialize, Serialize};

use crate::grouping::Groups;

/// Totals over the accepted set, taken between collect and relocate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub files: u64,
    pub bytes: u64,
}

impl Report {
    /// Count records and re-read their sizes from disk. A file that cannot be
    /// stat'ed contributes the size recorded when it was collected.
    pub fn from_groups(groups: &Groups) -> Self {
        let mut report = Report::default();
        for record in groups.values().flatten() {
            report.files += 1;
            report.bytes += match fs::metadata(&record.source) {
                Ok(meta) => meta.len(),
                Err(err) => {
                    log::warn!("[report] cannot stat {}: {}", record.source.display(), err);
                    record.size
                }
            };
        }
        report
    }

    /// Size in decimal megabytes.
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    use crate::key::build_key;
    use crate::media::{epoch_zero, MediaKind};
    use crate::testutil;

    #[test]
    fn test_report_restats_and_falls_back() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("a.jpg");
        fs::write(&present, vec![0u8; 1500]).unwrap();

        let mut on_disk = testutil::record(&present, MediaKind::Image, "", epoch_zero(), 0);
        on_disk.size = 10;
        let mut missing = testutil::record(dir.path().join("gone.jpg"), MediaKind::Image, "", epoch_zero(), 1);
        missing.size = 2_500_000;

        let mut groups: Groups = BTreeMap::new();
        for record in [on_disk, missing] {
            groups.entry(build_key(&record)).or_default().push(record);
        }

        let report = Report::from_groups(&groups);
        assert_eq!(report.files, 2);
        assert_eq!(report.bytes, 1500 + 2_500_000);
        assert_eq!(format!("{:.2}", report.megabytes()), "2.50");
    }

    #[test]
    fn test_empty_report() {
        let report = Report::from_groups(&Groups::new());
        assert_eq!(report, Report::default());
        assert_eq!(report.megabytes(), 0.0);
    }
}
