//! Error types for the account client

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the account client
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid type tag: {0}")]
    InvalidTypeTag(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Precondition errors, raised before any operation is appended
    #[error("Insufficient balance of {coin_type}: {available} available, {required} required")]
    InsufficientBalance {
        coin_type: String,
        available: u128,
        required: u128,
    },

    #[error("Arity mismatch: {left} items paired with {right} items")]
    ArityMismatch { left: usize, right: usize },

    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    // Ledger errors
    #[error("Ledger lookup failed: {0}")]
    Lookup(String),

    #[error("Transaction build failed: {0}")]
    TransactionBuild(String),

    #[error("Transaction rejected: {0}")]
    SubmissionFailure(String),

    #[error("Simulation failed: {0}")]
    Simulation(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    ///
    /// Nothing in this crate retries; callers decide.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Lookup(_) | Error::Simulation(_))
    }

    /// Check if this error was raised locally before anything reached the ledger
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. }
                | Error::ArityMismatch { .. }
                | Error::UnknownPool(_)
                | Error::InvalidAmount(_)
                | Error::InvalidAddress(_)
                | Error::InvalidTypeTag(_)
        )
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Lookup(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from BCS errors
impl From<bcs::Error> for Error {
    fn from(e: bcs::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
