use std::path::{Path, PathBuf};

use anyhow::Context;
use codechain_ledger::LedgerConfig;
use codechain_sdk::SdkConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "codechain.toml";
pub const DEFAULT_DATA_DIR: &str = ".codechain";

/// Settings read from `codechain.toml`. Command-line flags win over the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    /// Named identity used when `--account` is not given.
    pub account: Option<String>,
    pub sdk: SdkConfig,
    pub ledger: LedgerConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            account: None,
            sdk: SdkConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load from an explicit file, which must exist, or from
    /// `<data_dir>/codechain.toml` when present.
    pub fn load(explicit: Option<&Path>, data_dir: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let implicit = data_dir.unwrap_or(Path::new(DEFAULT_DATA_DIR)).join(CONFIG_FILE);
                if !implicit.exists() {
                    return Ok(Self::default());
                }
                implicit
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn with_overrides(mut self, data_dir: Option<PathBuf>, account: Option<String>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        if account.is_some() {
            self.account = account;
        }
        self
    }
}
