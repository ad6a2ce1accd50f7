//! Transaction construction and submission
//!
//! - `draft`: the in-memory command sequence
//! - `aggregator`: coin merge/split planning
//! - `builder`: one draft per account action
//! - `submit`: sign and dispatch

pub mod aggregator;
pub mod builder;
pub mod draft;
pub mod submit;

pub use builder::TransactionBuilder;
pub use draft::{Argument, Command, Input, MoveCall, ObjectInput, TransactionDraft};
pub use submit::submit;
