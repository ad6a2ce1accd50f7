//! NAVI Account Library
//!
//! Account client for the NAVI lending protocol: coin aggregation,
//! transaction building and submission, and health-factor queries.

pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod protocol;
pub mod transaction;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{Address, JsonRpcLedger, LedgerClient};
pub use protocol::{AssetRef, ProtocolConfig};
pub use transaction::{TransactionBuilder, TransactionDraft};
pub use wallet::{AccountManager, MnemonicSigner, TransactionSigner};
