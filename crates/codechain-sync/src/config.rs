use serde::{Deserialize, Serialize};

/// Tuning for upload and clone transfers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum file transfers in flight at once.
    pub max_concurrency: usize,
    /// Length of the random staging directory name.
    pub staging_name_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            staging_name_len: 10,
        }
    }
}
