//! Snapshot metadata model
//!
//! Deserialized from the store's JSON snapshot listing. Snapshots are
//! immutable and referenced by their short identifier everywhere else.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of one snapshot in the repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Short, human-referenced identifier
    #[serde(rename = "short_id")]
    pub id: String,

    /// Creation timestamp
    pub time: DateTime<Utc>,

    /// Host the snapshot was taken on
    pub hostname: String,

    /// Tag set applied at backup time
    #[serde(default)]
    pub tags: Vec<String>,

    /// Root paths covered by the snapshot
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

impl Snapshot {
    /// Tags joined for display, or "-" when untagged
    pub fn tags_display(&self) -> String {
        if self.tags.is_empty() {
            "-".to_string()
        } else {
            self.tags.join(",")
        }
    }

    /// Paths joined for display
    pub fn paths_display(&self) -> String {
        self.paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}
