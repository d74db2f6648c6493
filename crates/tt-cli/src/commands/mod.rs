//! CLI subcommand implementations.

pub mod auth;
pub mod client;
pub mod export;
pub mod interactive;
pub mod project;
pub mod report;
pub mod start;
pub mod status;
pub mod stop;
pub mod task;
pub mod util;
