//! Subcommand implementations.
//!
//! Every command returns whether it changed any document, so the caller knows
//! to write the file back.

pub mod branch;
pub mod docs;

pub type CommandResult = Result<bool, Box<dyn std::error::Error>>;
