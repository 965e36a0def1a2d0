//! Tooling & Integration Layer
//!
//! The command-line front end over the planning and upload pipeline.

pub mod cli;

pub use cli::{Cli, CliContext, CommandOutput, Commands};
