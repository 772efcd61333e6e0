//! Snapshot catalog
//!
//! Materializes the store's snapshot listing once and resolves 1-indexed
//! ordinal selections against it. The catalog is a plain value handed back
//! to the caller, so "list" and "act" share no hidden state.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::store::Snapshot;

/// A materialized, 1-indexed snapshot listing
#[derive(Debug, Clone)]
pub struct SnapshotCatalog {
    snapshots: Vec<Snapshot>,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "#")]
    ordinal: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Paths")]
    paths: String,
}

impl SnapshotCatalog {
    /// Build a catalog from a store listing
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self { snapshots }
    }

    /// Number of snapshots in the catalog
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Resolve a 1-indexed ordinal to its snapshot.
    ///
    /// Returns `None` for any ordinal outside `[1, len]`; the catalog is
    /// unchanged either way.
    pub fn select(&self, ordinal: usize) -> Option<&Snapshot> {
        if ordinal == 0 {
            return None;
        }
        self.snapshots.get(ordinal - 1)
    }

    /// Render the catalog as an operator-facing table
    pub fn render(&self) -> String {
        let rows: Vec<SnapshotRow> = self
            .snapshots
            .iter()
            .enumerate()
            .map(|(i, s)| SnapshotRow {
                ordinal: i + 1,
                id: s.id.clone(),
                time: s.time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                hostname: s.hostname.clone(),
                tags: s.tags_display(),
                paths: s.paths_display(),
            })
            .collect();

        Table::new(rows).with(Style::sharp()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn snapshot(id: &str) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            time: Utc.with_ymd_and_hms(2026, 5, 14, 3, 0, 12).unwrap(),
            hostname: "web1".to_string(),
            tags: vec!["weekly".to_string()],
            paths: vec![PathBuf::from("/")],
        }
    }

    #[test]
    fn test_select_is_one_indexed() {
        let catalog = SnapshotCatalog::new(vec![snapshot("aaa"), snapshot("bbb")]);

        assert_eq!(catalog.select(1).map(|s| s.id.as_str()), Some("aaa"));
        assert_eq!(catalog.select(2).map(|s| s.id.as_str()), Some("bbb"));
    }

    #[test]
    fn test_select_rejects_out_of_range() {
        let catalog = SnapshotCatalog::new(vec![snapshot("aaa"), snapshot("bbb")]);

        assert!(catalog.select(0).is_none());
        assert!(catalog.select(3).is_none());
        assert!(catalog.select(usize::MAX).is_none());
        // The catalog itself is untouched by a failed selection
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_render_contains_ordinals_and_ids() {
        let catalog = SnapshotCatalog::new(vec![snapshot("c3f2a1d4")]);
        let table = catalog.render();

        assert!(table.contains("c3f2a1d4"));
        assert!(table.contains("web1"));
        assert!(table.contains("weekly"));
    }
}
