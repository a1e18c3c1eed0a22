//! Ledger client for CodeChain.
//!
//! The ledger is the single source of truth for version-control metadata.
//! This crate models it purely as an interface:
//! - [`LedgerCall`] / [`Transaction`] records describing every mutation
//! - [`LedgerClient`]: submit, await finality, and read-only queries
//! - [`InMemoryLedger`]: a local devnet enforcing the contract rules, used
//!   by tests and by the CLI
//!
//! A submitted transaction has no effect until its finality is observed;
//! rejected calls come back as a typed [`RevertReason`].

pub mod config;
pub mod error;
pub mod memory;
pub mod records;
pub mod traits;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult, RevertReason};
pub use memory::InMemoryLedger;
pub use records::{LedgerCall, Transaction, TxHash, TxOutput, TxReceipt, TxStatus};
pub use traits::LedgerClient;
