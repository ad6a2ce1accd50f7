//! Command-line presentation layer

pub mod commands;
