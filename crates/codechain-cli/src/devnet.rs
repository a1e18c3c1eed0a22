use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use codechain_ledger::InMemoryLedger;
use codechain_sdk::{AccountId, Session};
use codechain_store::InMemoryContentStore;

use crate::config::CliConfig;

const STORE_SNAPSHOT: &str = "store.bin";
const LEDGER_SNAPSHOT: &str = "ledger.json";

/// Local devnet: an in-memory content store and ledger persisted as
/// snapshots in the data directory between invocations.
pub struct Devnet {
    data_dir: PathBuf,
    store: Arc<InMemoryContentStore>,
    ledger: Arc<InMemoryLedger>,
}

impl Devnet {
    pub fn open(config: &CliConfig) -> anyhow::Result<Self> {
        let data_dir = config.data_dir.clone();
        let store = InMemoryContentStore::load_snapshot(&data_dir.join(STORE_SNAPSHOT))
            .with_context(|| format!("loading content store from {}", data_dir.display()))?;
        let ledger = InMemoryLedger::load_snapshot(&data_dir.join(LEDGER_SNAPSHOT), config.ledger.clone())
            .with_context(|| format!("loading ledger from {}", data_dir.display()))?;
        Ok(Self {
            data_dir,
            store: Arc::new(store),
            ledger: Arc::new(ledger),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// A session acting as the configured account, if any.
    pub fn session(&self, config: &CliConfig) -> Session {
        let session = Session::new(self.store.clone(), self.ledger.clone(), config.sdk.clone());
        match &config.account {
            Some(name) => session.with_account(AccountId::derive(name)),
            None => session,
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.store
            .save_snapshot(&self.data_dir.join(STORE_SNAPSHOT))
            .context("saving content store")?;
        self.ledger
            .save_snapshot(&self.data_dir.join(LEDGER_SNAPSHOT))
            .context("saving ledger")?;
        tracing::debug!(data_dir = %self.data_dir.display(), "devnet state saved");
        Ok(())
    }
}
