//! Command-line front end for the rynxs event log.
//!
//! Every subcommand is a thin wrapper around the pure/storage crates
//! (`rynxs-store-file`, `rynxs-reducer`, `rynxs-checkpoint`, `rynxs-verify`):
//! the CLI itself owns no business logic, only argument parsing, output
//! formatting, and exit-code mapping: `0` success, `1` verification/logic
//! failure, `2` I/O or not-found.

#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod output;

pub use cli::{Cli, Commands};
