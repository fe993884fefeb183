//! CLI layer for tailwatch.
//!
//! Provides the command-line interface using clap, with commands for the
//! capture watchdogs, live tracking, ignore lists and offline analysis.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{execute, execute_with};
pub use output::OutputFormat;
pub use parser::{Cli, Commands, IgnoreCommands};
