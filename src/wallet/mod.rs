//! Account identity and account-level operations
//!
//! ```text
//! MnemonicSigner ─┐
//!                 ├─→ AccountManager ─→ TransactionBuilder ─→ submit
//! BalanceReader ──┘          │
//!                            └─→ HealthEvaluator / PortfolioReader
//! ```
//!
//! The seed phrase is read from an environment variable at startup and
//! never written to configuration or logs.

pub mod account;
pub mod balance;
pub mod signer;

pub use account::AccountManager;
pub use balance::{format_units, parse_units, BalanceReader};
pub use signer::{MnemonicSigner, TransactionSigner};
