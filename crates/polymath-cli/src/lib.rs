//! Library half of the `polymath` binary: configuration and subcommands

pub mod commands;
pub mod config;

pub use commands::{App, ChatCommand, Command};
pub use config::Config;
