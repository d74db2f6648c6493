//! Time tracker CLI library.
//!
//! This crate provides the CLI interface for the time tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{ClientAction, Cli, Commands, ExportFormat, ProjectAction, StartArgs, TaskAction};
pub use config::Config;
