use codechain_archive::ArchiveOptions;
use codechain_sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// SDK-level configuration: transfer tuning and clone archive format.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub sync: SyncConfig,
    pub archive: ArchiveOptions,
}
